//! Parallel GIF encoding.
//!
//! A job splits composited frames into [`task::EncodeTask`]s, runs them on a bounded pool of
//! worker threads, and concatenates the per-frame [`page::EncodedPage`]s in frame order.

/// Frame-ordered concatenation of encoded pages.
pub mod assemble;
/// Job state machine and task dispatch.
pub mod dispatch;
/// GIF89a frame writer.
pub mod gif;
/// Paged output buffers.
pub mod page;
/// Worker threads.
pub mod pool;
/// Palette quantization and dithering.
pub mod quant;
/// Job options and per-frame tasks.
pub mod task;
