//! Export settings and project files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::encode::task::{DEFAULT_PAGE_SIZE, DitherMode, EncodeOptions, RepeatCount};
use crate::foundation::core::Canvas;
use crate::foundation::error::{ForteError, ForteResult};
use crate::frames::filter::FilterPredicate;
use crate::render::background::{BackgroundSpec, BaseStyle};
use crate::render::compose::Compositor;
use crate::render::watermark::{PreparedWatermark, WatermarkSpec};
use crate::resource::import::{load_config, load_layer_dir};
use crate::resource::model::Layer;

/// Caller-facing export configuration. Every field has a default, so partial files work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Output size.
    pub canvas: Canvas,
    /// Upper bound on concurrent encoder workers.
    pub workers: usize,
    /// NeuQuant sample factor, clamped to `1..=30`.
    pub quality: u8,
    /// Dithering mode, e.g. `"floyd-steinberg-serpentine"`.
    pub dither: DitherMode,
    /// Share the first frame's palette across all frames.
    pub global_palette: bool,
    /// Loop behaviour.
    pub repeat: RepeatCount,
    /// Background under the layers.
    pub background: BackgroundSpec,
    /// Background opacity over black, clamped to `0..=1`.
    pub background_opacity: f32,
    /// Draw the 20px grid.
    pub show_grid: bool,
    /// Draw the centered glow.
    pub show_glow: bool,
    /// Optional text watermark.
    pub watermark: Option<WatermarkSpec>,
    /// Delay between output frames.
    pub frame_delay_ms: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            canvas: Canvas::default(),
            workers: 10,
            quality: 5,
            dither: DitherMode::none(),
            global_palette: false,
            repeat: RepeatCount::Forever,
            background: BackgroundSpec::None,
            background_opacity: 0.3,
            show_grid: true,
            show_glow: true,
            watermark: None,
            frame_delay_ms: 100,
        }
    }
}

impl ExportSettings {
    /// Parse settings from JSON.
    pub fn from_json_str(s: &str) -> ForteResult<Self> {
        let mut settings: Self =
            serde_json::from_str(s).map_err(|e| ForteError::serde(e.to_string()))?;
        settings.clamp();
        Ok(settings)
    }

    /// Clamp quality and background opacity into range.
    pub fn clamp(&mut self) {
        self.quality = self.quality.clamp(1, 30);
        if self.background_opacity.is_finite() {
            self.background_opacity = self.background_opacity.clamp(0.0, 1.0);
        }
    }

    /// Reject values no export can run with.
    pub fn validate(&self) -> ForteResult<()> {
        self.canvas.validate()?;
        if self.workers == 0 {
            return Err(ForteError::validation("workers must be >= 1"));
        }
        if self.frame_delay_ms == 0 {
            return Err(ForteError::validation("frame_delay_ms must be > 0"));
        }
        if !self.background_opacity.is_finite() {
            return Err(ForteError::validation("background_opacity must be finite"));
        }
        if let Some(w) = &self.watermark {
            w.validate()?;
        }
        Ok(())
    }

    /// Encoder options for this export, with quality clamped.
    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            canvas: self.canvas,
            workers: self.workers,
            quality: self.quality.clamp(1, 30),
            dither: self.dither,
            global_palette: self.global_palette,
            repeat: self.repeat,
            frame_delay_ms: self.frame_delay_ms,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Base-surface style.
    pub fn base_style(&self) -> BaseStyle {
        BaseStyle {
            background_opacity: self.background_opacity,
            show_grid: self.show_grid,
            show_glow: self.show_glow,
        }
    }

    /// Load the background and rasterize the watermark. Relative paths resolve against
    /// `base_dir`.
    #[tracing::instrument(skip(self))]
    pub fn compositor(&self, base_dir: &Path) -> ForteResult<Compositor> {
        self.validate()?;
        let background = self.background.load(base_dir)?;
        let watermark = match &self.watermark {
            Some(spec) => {
                let font = spec.load_font(base_dir)?;
                Some(PreparedWatermark::rasterize(self.canvas, spec, &font)?)
            }
            None => None,
        };
        Compositor::new(self.canvas, &background, self.base_style(), watermark)
    }
}

/// One layer entry of a project file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectLayer {
    /// Display name; defaults to the directory name.
    #[serde(default)]
    pub name: Option<String>,
    /// Directory of frame images.
    pub dir: PathBuf,
    /// Act configuration file.
    #[serde(default)]
    pub config: Option<PathBuf>,
    /// Canvas x of the layer origin.
    #[serde(default)]
    pub x: i32,
    /// Canvas y of the layer origin.
    #[serde(default)]
    pub y: i32,
    /// Whether the layer is exported.
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

/// Everything needed to export without an editor: settings, filter and layers.
///
/// The canvas size lives in `settings.canvas`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    /// Export settings.
    pub settings: ExportSettings,
    /// Frames to keep.
    pub filter: FilterPredicate,
    /// Layers bottom to top.
    pub layers: Vec<ProjectLayer>,
}

impl Project {
    /// Parse a project from JSON.
    pub fn from_json_str(s: &str) -> ForteResult<Self> {
        let mut project: Self =
            serde_json::from_str(s).map_err(|e| ForteError::serde(e.to_string()))?;
        project.settings.clamp();
        Ok(project)
    }

    /// Read a project file.
    pub fn load(path: impl AsRef<Path>) -> ForteResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ForteError::io(path, e))?;
        Self::from_json_str(&text)
    }

    /// Import every layer. Relative paths resolve against `base_dir`.
    pub fn load_layers(&self, base_dir: &Path) -> ForteResult<Vec<Layer>> {
        self.layers
            .iter()
            .map(|entry| {
                let mut layer = load_layer_dir(base_dir.join(&entry.dir))?;
                if let Some(config) = &entry.config {
                    layer.config = load_config(base_dir.join(config))?;
                }
                if let Some(name) = &entry.name {
                    layer.name = name.clone();
                }
                layer.x = entry.x;
                layer.y = entry.y;
                layer.visible = entry.visible;
                Ok(layer)
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/settings.rs"]
mod tests;
