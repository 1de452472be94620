//! Encoder inputs: job options and the per-frame task handed to a worker.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::foundation::core::Canvas;
use crate::foundation::error::{ForteError, ForteResult};

/// Default bytes per output page.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Error-diffusion kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DitherKernel {
    /// Map each pixel to its nearest palette entry.
    #[default]
    None,
    /// Floyd-Steinberg.
    FloydSteinberg,
    /// Three-neighbour approximation of Floyd-Steinberg.
    FalseFloydSteinberg,
    /// Stucki.
    Stucki,
    /// Atkinson.
    Atkinson,
}

impl DitherKernel {
    fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FloydSteinberg => "floyd-steinberg",
            Self::FalseFloydSteinberg => "false-floyd-steinberg",
            Self::Stucki => "stucki",
            Self::Atkinson => "atkinson",
        }
    }

    /// `(weight, dx, dy)` taps for a left-to-right scan.
    pub fn taps(self) -> &'static [(f32, i32, i32)] {
        match self {
            Self::None => &[],
            Self::FloydSteinberg => &[
                (7.0 / 16.0, 1, 0),
                (3.0 / 16.0, -1, 1),
                (5.0 / 16.0, 0, 1),
                (1.0 / 16.0, 1, 1),
            ],
            Self::FalseFloydSteinberg => &[(3.0 / 8.0, 1, 0), (3.0 / 8.0, 0, 1), (2.0 / 8.0, 1, 1)],
            Self::Stucki => &[
                (8.0 / 42.0, 1, 0),
                (4.0 / 42.0, 2, 0),
                (2.0 / 42.0, -2, 1),
                (4.0 / 42.0, -1, 1),
                (8.0 / 42.0, 0, 1),
                (4.0 / 42.0, 1, 1),
                (2.0 / 42.0, 2, 1),
                (1.0 / 42.0, -2, 2),
                (2.0 / 42.0, -1, 2),
                (4.0 / 42.0, 0, 2),
                (2.0 / 42.0, 1, 2),
                (1.0 / 42.0, 2, 2),
            ],
            Self::Atkinson => &[
                (1.0 / 8.0, 1, 0),
                (1.0 / 8.0, 2, 0),
                (1.0 / 8.0, -1, 1),
                (1.0 / 8.0, 0, 1),
                (1.0 / 8.0, 1, 1),
                (1.0 / 8.0, 0, 2),
            ],
        }
    }
}

/// Dithering applied while mapping pixels to the palette.
///
/// Written as `none`, `floyd-steinberg`, `false-floyd-steinberg`, `stucki` or `atkinson`, with an
/// optional `-serpentine` suffix for alternating scan direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DitherMode {
    /// Diffusion kernel.
    pub kernel: DitherKernel,
    /// Alternate scan direction per row.
    pub serpentine: bool,
}

impl DitherMode {
    /// No dithering.
    pub fn none() -> Self {
        Self::default()
    }

    /// `kernel` with a left-to-right scan.
    pub fn new(kernel: DitherKernel) -> Self {
        Self {
            kernel,
            serpentine: false,
        }
    }

    /// Same kernel, serpentine scan.
    pub fn serpentine(self) -> Self {
        Self {
            serpentine: true,
            ..self
        }
    }
}

impl fmt::Display for DitherMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kernel.name())?;
        if self.serpentine && self.kernel != DitherKernel::None {
            f.write_str("-serpentine")?;
        }
        Ok(())
    }
}

impl FromStr for DitherMode {
    type Err = ForteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let (base, serpentine) = match s.strip_suffix("-serpentine") {
            Some(b) => (b, true),
            None => (s.as_str(), false),
        };
        let kernel = match base {
            "none" | "false" => DitherKernel::None,
            "floyd-steinberg" => DitherKernel::FloydSteinberg,
            "false-floyd-steinberg" => DitherKernel::FalseFloydSteinberg,
            "stucki" => DitherKernel::Stucki,
            "atkinson" => DitherKernel::Atkinson,
            other => {
                return Err(ForteError::validation(format!(
                    "unknown dither mode \"{other}\""
                )));
            }
        };
        Ok(Self { kernel, serpentine })
    }
}

impl TryFrom<String> for DitherMode {
    type Error = ForteError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DitherMode> for String {
    fn from(d: DitherMode) -> Self {
        d.to_string()
    }
}

/// Loop behaviour of the animation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatCount {
    /// Loop forever.
    #[default]
    Forever,
    /// Play once; no loop extension is written.
    Once,
    /// Play this many extra times.
    Times(u16),
}

impl RepeatCount {
    /// Loop count for the NETSCAPE2.0 extension, or `None` when it is omitted.
    pub fn netscape_loops(self) -> Option<u16> {
        match self {
            Self::Forever => Some(0),
            Self::Once => None,
            Self::Times(n) => Some(n),
        }
    }
}

/// Options for one encoder job.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeOptions {
    /// Output size.
    pub canvas: Canvas,
    /// Upper bound on concurrent workers.
    pub workers: usize,
    /// NeuQuant sample factor: 1 is best, 30 is fastest.
    pub quality: u8,
    /// Dithering.
    pub dither: DitherMode,
    /// Share one palette, computed from the first frame, across all frames.
    pub global_palette: bool,
    /// Loop behaviour.
    pub repeat: RepeatCount,
    /// Per-frame delay.
    pub frame_delay_ms: u32,
    /// Bytes per output page.
    pub page_size: usize,
}

impl EncodeOptions {
    /// Defaults for `canvas`: 2 workers, quality 10, no dithering, per-frame palettes, looping
    /// forever, 500ms per frame.
    pub fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            workers: 2,
            quality: 10,
            dither: DitherMode::none(),
            global_palette: false,
            repeat: RepeatCount::Forever,
            frame_delay_ms: 500,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Reject zero workers, out-of-range quality, zero page size and invalid canvases.
    pub fn validate(&self) -> ForteResult<()> {
        self.canvas.validate()?;
        if self.workers == 0 {
            return Err(ForteError::validation("encoder workers must be >= 1"));
        }
        if !(1..=30).contains(&self.quality) {
            return Err(ForteError::validation("encoder quality must be in 1..=30"));
        }
        if self.page_size == 0 {
            return Err(ForteError::validation("encoder page_size must be > 0"));
        }
        Ok(())
    }

    /// Frame delay in GIF centiseconds.
    pub fn delay_centis(&self) -> u16 {
        let cs = (u64::from(self.frame_delay_ms) + 5) / 10;
        cs.min(u64::from(u16::MAX)) as u16
    }
}

/// One frame's worth of encoder work.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodeTask {
    /// Frame position in the output.
    pub index: u32,
    /// Whether this frame closes the stream.
    pub is_last: bool,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// NeuQuant sample factor.
    pub quality: u8,
    /// Dithering.
    pub dither: DitherMode,
    /// Whether frames share one palette.
    pub use_global_palette: bool,
    /// Shared palette (`256 * 3` RGB bytes), set by the dispatcher before dispatch.
    pub global_palette: Option<Bytes>,
    /// Loop behaviour, written by frame 0.
    pub repeat: RepeatCount,
    /// Delay in centiseconds.
    pub delay_centis: u16,
    /// Bytes per output page.
    pub page_size: usize,
    /// Straight-alpha RGBA8 pixels.
    pub pixels: Bytes,
}

impl EncodeTask {
    /// Build the task list for `frames` (straight RGBA8 buffers) in output order.
    pub fn plan(frames: Vec<Bytes>, opts: &EncodeOptions) -> ForteResult<Vec<EncodeTask>> {
        opts.validate()?;
        let expected = opts.canvas.rgba_len();
        let n = frames.len();
        let mut out = Vec::with_capacity(n);
        for (i, pixels) in frames.into_iter().enumerate() {
            if pixels.len() != expected {
                return Err(ForteError::validation(format!(
                    "frame {i} has {} bytes, expected {expected}",
                    pixels.len()
                )));
            }
            let index = u32::try_from(i)
                .map_err(|_| ForteError::validation("too many frames for one encoder job"))?;
            out.push(EncodeTask {
                index,
                is_last: i + 1 == n,
                width: opts.canvas.width,
                height: opts.canvas.height,
                quality: opts.quality,
                dither: opts.dither,
                use_global_palette: opts.global_palette,
                global_palette: None,
                repeat: opts.repeat,
                delay_centis: opts.delay_centis(),
                page_size: opts.page_size,
                pixels,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/task.rs"]
mod tests;
