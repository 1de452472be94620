use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "forte", version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the action/direction label of every frame in a layer directory.
    Labels(LabelsArgs),
    /// Composite a single output frame as a PNG.
    Frame(FrameArgs),
    /// Export an animated GIF.
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct LabelsArgs {
    /// Directory of frame images.
    #[arg(long)]
    dir: PathBuf,

    /// Act configuration JSON.
    #[arg(long)]
    config: PathBuf,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output frame index (0-based).
    #[arg(long)]
    frame: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output GIF path.
    #[arg(long)]
    out: PathBuf,

    /// Override encoder worker count.
    #[arg(long)]
    workers: Option<usize>,

    /// Override quality (1 best, 30 fastest).
    #[arg(long)]
    quality: Option<u8>,

    /// Share the first frame's palette across all frames.
    #[arg(long, default_value_t = false)]
    global_palette: bool,

    /// Dithering mode, e.g. `floyd-steinberg` or `atkinson-serpentine`.
    #[arg(long)]
    dither: Option<forte::DitherMode>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Labels(args) => cmd_labels(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn project_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new("."))
}

fn cmd_labels(args: LabelsArgs) -> anyhow::Result<()> {
    let layer = forte::load_layer_dir(&args.dir)
        .with_context(|| format!("load layer '{}'", args.dir.display()))?;
    let config = forte::load_config(&args.config)
        .with_context(|| format!("load config '{}'", args.config.display()))?;
    let resolution = forte::resolve_count(layer.frames.len(), &config);

    println!(
        "policy: {} ({} of {} frames labeled)",
        resolution.policy,
        resolution.mapped(),
        resolution.labels.len()
    );
    for (i, label) in resolution.labels.iter().enumerate() {
        let action = label.action.as_deref().unwrap_or("-");
        let direction = label
            .direction
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{i:>5}  {action:<16}  {direction}");
    }
    Ok(())
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let project = forte::Project::load(&args.in_path)
        .with_context(|| format!("load project '{}'", args.in_path.display()))?;
    let base = project_dir(&args.in_path);
    let layers = project.load_layers(base)?;

    let frame = forte::Exporter::new(project.settings.clone())
        .with_base_dir(base)
        .render_frame(&layers, &project.filter, args.frame)?;

    create_parent(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.to_straight_rgba(),
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let mut project = forte::Project::load(&args.in_path)
        .with_context(|| format!("load project '{}'", args.in_path.display()))?;
    if let Some(w) = args.workers {
        project.settings.workers = w;
    }
    if let Some(q) = args.quality {
        project.settings.quality = q;
    }
    if args.global_palette {
        project.settings.global_palette = true;
    }
    if let Some(d) = args.dither {
        project.settings.dither = d;
    }
    project.settings.clamp();

    let base = project_dir(&args.in_path);
    let layers = project.load_layers(base)?;
    let job = forte::Exporter::new(project.settings.clone())
        .with_base_dir(base)
        .start(layers, project.filter.clone())?;

    let mut gif = None;
    for event in job.events() {
        match event {
            forte::ExportEvent::Preparing(_) => eprintln!("preparing"),
            forte::ExportEvent::Rendering(p) => eprintln!("rendering {:>3.0}%", p * 100.0),
            forte::ExportEvent::Encoding(p) => eprintln!("encoding  {:>3.0}%", p * 100.0),
            forte::ExportEvent::Completed(bytes) => gif = Some(bytes),
            forte::ExportEvent::Error(err) => anyhow::bail!("export failed: {err}"),
            forte::ExportEvent::Aborted => anyhow::bail!("export aborted"),
        }
    }
    let gif = gif.context("export ended without output")?;

    create_parent(&args.out)?;
    std::fs::write(&args.out, &gif)
        .with_context(|| format!("write gif '{}'", args.out.display()))?;
    eprintln!(
        "wrote {} ({:.2} KiB)",
        args.out.display(),
        gif.len() as f64 / 1024.0
    );
    Ok(())
}

fn create_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}
