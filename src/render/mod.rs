//! CPU compositing of output frames.
//!
//! Every output frame is painted bottom to top: black, background, grid, glow, layer frames,
//! watermark. Everything below the layers is identical across frames and painted once.

/// Backgrounds, presets and the decorated base surface.
pub mod background;
/// Per-frame compositor.
pub mod compose;
/// Premultiplied RGBA8 surfaces and source-over blending.
pub mod composite;
pub(crate) mod text;
/// Watermark layout and rasterization.
pub mod watermark;
