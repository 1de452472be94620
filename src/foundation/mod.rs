//! Shared primitives: geometry, colors, errors.

/// Colors as written in settings files.
pub mod color;
/// Canvas size, premultiplied pixels and re-exported `kurbo` geometry.
pub mod core;
/// Crate error type.
pub mod error;
pub(crate) mod math;
