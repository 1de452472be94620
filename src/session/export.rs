//! Export session: frame selection, parallel compositing, and GIF encoding on a background
//! thread, reported as a stream of [`ExportEvent`]s.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use bytes::Bytes;
use rayon::prelude::*;

use crate::encode::dispatch::{AbortHandle, EncodeEvent, GifEncoder, unshare_error};
use crate::encode::gif::GifFrameEncoder;
use crate::encode::pool::FrameEncoder;
use crate::foundation::error::{ForteError, ForteResult};
use crate::frames::filter::{FilterPredicate, valid_indices};
use crate::frames::resolve::resolve;
use crate::render::composite::FrameRGBA;
use crate::render::compose::{Compositor, LayerDraw};
use crate::resource::model::Layer;
use crate::session::settings::ExportSettings;

/// Frames composited between two progress reports and cancellation checks.
pub const RENDER_BATCH_SIZE: usize = 5;

/// Phase events of one export. `Completed`, `Error` and `Aborted` are terminal.
#[derive(Clone, Debug)]
pub enum ExportEvent {
    /// Selecting frames and loading decorations.
    Preparing(f64),
    /// Share of output frames composited.
    Rendering(f64),
    /// Share of frames encoded.
    Encoding(f64),
    /// The finished GIF.
    Completed(Bytes),
    /// The export failed; nothing was produced.
    Error(Arc<ForteError>),
    /// The caller aborted.
    Aborted,
}

impl ExportEvent {
    /// Whether no further events follow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Error(_) | Self::Aborted)
    }
}

/// Frames one layer contributes to the export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerSelection {
    /// Index into the exported layer list.
    pub layer: usize,
    /// Matching frame indices, in order.
    pub valid: Vec<usize>,
}

/// Which frame every layer shows in every output frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportPlan {
    /// Layers with at least one matching frame, bottom to top.
    pub layers: Vec<LayerSelection>,
    /// Output frame count: the longest selection.
    pub frame_count: usize,
}

impl ExportPlan {
    /// `(layer, frame)` pairs drawn in output frame `i`, bottom to top. Shorter selections wrap.
    pub fn sources(&self, i: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.layers
            .iter()
            .map(move |sel| (sel.layer, sel.valid[i % sel.valid.len()]))
    }
}

/// Resolve labels and filter every visible layer.
///
/// Fails with [`ForteError::EmptySelection`] when no visible layer has a matching frame.
#[tracing::instrument(skip_all, fields(layers = layers.len(), predicate = %predicate))]
pub fn plan_export(layers: &[Layer], predicate: &FilterPredicate) -> ForteResult<ExportPlan> {
    let mut selections = Vec::new();
    for (i, layer) in layers.iter().enumerate() {
        if !layer.visible || layer.frames.is_empty() {
            continue;
        }
        let labels = resolve(&layer.frames, &layer.config);
        let valid = valid_indices(&labels, predicate);
        tracing::debug!(
            layer = %layer.name,
            "{} of {} frames match",
            valid.len(),
            labels.len()
        );
        if !valid.is_empty() {
            selections.push(LayerSelection { layer: i, valid });
        }
    }

    let frame_count = selections.iter().map(|s| s.valid.len()).max().unwrap_or(0);
    if frame_count == 0 {
        return Err(ForteError::empty_selection(predicate.to_string()));
    }
    Ok(ExportPlan {
        layers: selections,
        frame_count,
    })
}

/// Composite output frame `i` of `plan`.
pub fn render_planned_frame(
    compositor: &Compositor,
    layers: &[Layer],
    plan: &ExportPlan,
    i: usize,
) -> ForteResult<FrameRGBA> {
    let draws: Vec<LayerDraw<'_>> = plan
        .sources(i)
        .filter_map(|(l, f)| {
            let layer = layers.get(l)?;
            Some(LayerDraw {
                frame: layer.frames.get(f)?,
                x: layer.x,
                y: layer.y,
            })
        })
        .collect();
    compositor.compose(&draws)
}

/// Starts exports for one set of settings.
#[derive(Clone)]
pub struct Exporter {
    settings: ExportSettings,
    base_dir: PathBuf,
    threads: Option<usize>,
    encoder: Arc<dyn FrameEncoder>,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("settings", &self.settings)
            .field("base_dir", &self.base_dir)
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}

impl Exporter {
    /// Exporter writing GIF89a; relative asset paths resolve against the working directory.
    pub fn new(settings: ExportSettings) -> Self {
        Self {
            settings,
            base_dir: PathBuf::from("."),
            threads: None,
            encoder: Arc::new(GifFrameEncoder),
        }
    }

    /// Resolve background images and fonts against `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Override the compositing thread count. `None` uses rayon defaults.
    pub fn with_render_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Replace the per-frame encoder.
    pub fn with_frame_encoder(mut self, encoder: Arc<dyn FrameEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Settings in use.
    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Composite a single output frame synchronously.
    pub fn render_frame(
        &self,
        layers: &[Layer],
        predicate: &FilterPredicate,
        index: usize,
    ) -> ForteResult<FrameRGBA> {
        let plan = plan_export(layers, predicate)?;
        if index >= plan.frame_count {
            return Err(ForteError::validation(format!(
                "frame {index} is out of range (export has {} frames)",
                plan.frame_count
            )));
        }
        let compositor = self.settings.compositor(&self.base_dir)?;
        render_planned_frame(&compositor, layers, &plan, index)
    }

    /// Start an export on a background thread.
    ///
    /// Settings are validated before the thread starts; everything else is reported through the
    /// job's events.
    pub fn start(&self, layers: Vec<Layer>, predicate: FilterPredicate) -> ForteResult<ExportJob> {
        self.settings.validate()?;
        if let Some(0) = self.threads {
            return Err(ForteError::validation("render threads must be >= 1 when set"));
        }

        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let encode_abort = Arc::new(Mutex::new(None::<AbortHandle>));
        let run = ExportRun {
            exporter: self.clone(),
            layers,
            predicate,
            events: tx,
            cancel: Arc::clone(&cancel),
            encode_abort: Arc::clone(&encode_abort),
        };
        let thread = std::thread::Builder::new()
            .name("forte-export".to_string())
            .spawn(move || run.run())
            .map_err(|e| ForteError::encode(format!("spawn export thread: {e}")))?;

        Ok(ExportJob {
            events: rx,
            cancel,
            encode_abort,
            thread: Some(thread),
        })
    }
}

/// A running export.
#[derive(Debug)]
pub struct ExportJob {
    events: Receiver<ExportEvent>,
    cancel: Arc<AtomicBool>,
    encode_abort: Arc<Mutex<Option<AbortHandle>>>,
    thread: Option<JoinHandle<()>>,
}

impl ExportJob {
    /// Blocking iterator over events; ends after the terminal event.
    pub fn events(&self) -> mpsc::Iter<'_, ExportEvent> {
        self.events.iter()
    }

    /// Next event, or `None` once the export has ended.
    pub fn recv(&self) -> Option<ExportEvent> {
        self.events.recv().ok()
    }

    /// Stop compositing at the next batch boundary and abort the encoder.
    pub fn abort(&self) {
        self.cancel.store(true, Ordering::Relaxed);
        let slot = self
            .encode_abort
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = slot.as_ref() {
            handle.abort();
        }
    }

    /// Drain events and return the GIF or the failure.
    pub fn wait(mut self) -> ForteResult<Bytes> {
        let mut outcome = Err(ForteError::encode("export ended without a result"));
        for event in self.events.iter() {
            match event {
                ExportEvent::Completed(bytes) => outcome = Ok(bytes),
                ExportEvent::Error(err) => outcome = Err(unshare_error(err)),
                ExportEvent::Aborted => outcome = Err(ForteError::Aborted),
                _ => continue,
            }
            break;
        }
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
        outcome
    }
}

struct ExportRun {
    exporter: Exporter,
    layers: Vec<Layer>,
    predicate: FilterPredicate,
    events: Sender<ExportEvent>,
    cancel: Arc<AtomicBool>,
    encode_abort: Arc<Mutex<Option<AbortHandle>>>,
}

impl ExportRun {
    fn run(self) {
        let terminal = match self.export() {
            Ok(bytes) => ExportEvent::Completed(bytes),
            Err(ForteError::Aborted) => ExportEvent::Aborted,
            Err(err) => {
                tracing::warn!(error = %err, "export failed");
                ExportEvent::Error(Arc::new(err))
            }
        };
        let _ = self.events.send(terminal);
    }

    fn emit(&self, event: ExportEvent) {
        let _ = self.events.send(event);
    }

    fn check_cancel(&self) -> ForteResult<()> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(ForteError::Aborted);
        }
        Ok(())
    }

    fn export(&self) -> ForteResult<Bytes> {
        self.emit(ExportEvent::Preparing(0.0));
        let plan = plan_export(&self.layers, &self.predicate)?;
        let settings = &self.exporter.settings;
        let compositor = settings.compositor(&self.exporter.base_dir)?;
        self.check_cancel()?;

        let frames = self.render_all(&compositor, &plan)?;
        self.check_cancel()?;

        let mut encoder =
            GifEncoder::with_encoder(settings.encode_options(), Arc::clone(&self.exporter.encoder));
        for f in frames {
            encoder.add_frame(f)?;
        }
        let job = encoder.render()?;
        {
            let mut slot = self
                .encode_abort
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *slot = Some(job.abort_handle());
        }
        if self.cancel.load(Ordering::Relaxed) {
            job.abort();
        }

        for event in job.events() {
            match event {
                EncodeEvent::Started => self.emit(ExportEvent::Encoding(0.0)),
                EncodeEvent::Progress(p) => self.emit(ExportEvent::Encoding(p)),
                EncodeEvent::Finished(bytes) => {
                    tracing::info!("export finished: {:.2} KiB", bytes.len() as f64 / 1024.0);
                    return Ok(bytes);
                }
                EncodeEvent::Error(err) => return Err(unshare_error(err)),
                EncodeEvent::Aborted => return Err(ForteError::Aborted),
            }
        }
        Err(ForteError::encode("encoder ended without a result"))
    }

    fn render_all(&self, compositor: &Compositor, plan: &ExportPlan) -> ForteResult<Vec<Bytes>> {
        let pool = build_thread_pool(self.exporter.threads)?;
        let total = plan.frame_count;
        let mut out = Vec::with_capacity(total);
        let indices: Vec<usize> = (0..total).collect();

        for batch in indices.chunks(RENDER_BATCH_SIZE) {
            self.check_cancel()?;
            let rendered = pool.install(|| {
                batch
                    .par_iter()
                    .map(|&i| {
                        render_planned_frame(compositor, &self.layers, plan, i)
                            .map(|f| Bytes::from(f.to_straight_rgba()))
                    })
                    .collect::<Vec<_>>()
            });
            for r in rendered {
                out.push(r?);
            }
            self.emit(ExportEvent::Rendering(out.len() as f64 / total as f64));
        }
        tracing::debug!(frames = total, "composited export frames");
        Ok(out)
    }
}

fn build_thread_pool(threads: Option<usize>) -> ForteResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| ForteError::validation(format!("failed to build rayon thread pool: {e}")))
}

/// Import `project`'s layers from `project_dir` and start its export.
pub fn export_project(
    project: &crate::session::settings::Project,
    project_dir: &Path,
) -> ForteResult<ExportJob> {
    let layers = project.load_layers(project_dir)?;
    Exporter::new(project.settings.clone())
        .with_base_dir(project_dir)
        .start(layers, project.filter.clone())
}

#[cfg(test)]
#[path = "../../tests/unit/session/export.rs"]
mod tests;
