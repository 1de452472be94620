//! Forte turns sprite-sheet resources into animated GIF previews.
//!
//! The pipeline runs leaf-first:
//!
//! - Import [`Layer`]s and their action layouts ([`Configuration`])
//! - [`resolve`] an `(action, direction)` label for every frame
//! - Select frames with a [`FilterPredicate`] (live preview via [`Cycler`], export via
//!   [`plan_export`])
//! - Composite output frames with a [`Compositor`]
//! - Encode them on a worker pool with [`GifEncoder`], or run the whole export through an
//!   [`Exporter`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Parallel GIF encoding.
pub mod encode;
/// Shared primitives.
pub mod foundation;
/// Frame labeling and selection.
pub mod frames;
/// Compositing.
pub mod render;
/// Resource model and import.
pub mod resource;
/// Export sessions.
pub mod session;

pub use crate::foundation::color::Color;
pub use crate::foundation::core::{Affine, Canvas, Point, Rgba8Premul, Vec2};
pub use crate::foundation::error::{ForteError, ForteResult};

pub use crate::encode::dispatch::{
    AbortHandle, EncodeEvent, EncodeJob, GifEncoder, JobState, encode,
};
pub use crate::encode::task::{DitherKernel, DitherMode, EncodeOptions, RepeatCount};
pub use crate::frames::filter::{
    Cycler, FilterPredicate, first_valid, matches, next_valid, valid_indices,
};
pub use crate::frames::resolve::{FrameLabel, ResolvePolicy, Resolution, resolve, resolve_count};
pub use crate::render::background::{Background, BackgroundPreset, BackgroundSpec, BaseStyle};
pub use crate::render::compose::{Compositor, LayerDraw};
pub use crate::render::composite::FrameRGBA;
pub use crate::render::watermark::{
    PreparedWatermark, WatermarkLayout, WatermarkPosition, WatermarkSpec,
};
pub use crate::resource::import::{load_config, load_layer_dir};
pub use crate::resource::model::{
    ActDir, ActOutput, ActType, ActionRun, Configuration, Layer, RasterFrame, find_layer_at,
};
pub use crate::session::export::{
    ExportEvent, ExportJob, ExportPlan, Exporter, LayerSelection, plan_export,
};
pub use crate::session::settings::{ExportSettings, Project, ProjectLayer};
