//! Sprite resources: raster frames, action layouts and layers.

/// Directory import.
pub mod import;
/// Frames, action runs, configurations and layers.
pub mod model;
