//! Palette quantization and index mapping with optional error diffusion.

use std::collections::HashMap;

use bytes::Bytes;
use color_quant::NeuQuant;

use crate::encode::task::DitherMode;
use crate::foundation::error::{ForteError, ForteResult};

/// Palette entries in every table written.
pub const PALETTE_COLORS: usize = 256;

/// Maps RGB colors onto a 256-entry palette.
pub enum ColorMapper {
    /// Palette trained on the frame itself.
    Network(Box<NeuQuant>),
    /// Externally supplied palette, searched exhaustively with a per-color cache.
    Fixed {
        /// Palette entries.
        palette: Vec<[u8; 3]>,
        /// Memoized lookups keyed by packed RGB.
        cache: HashMap<u32, u8>,
    },
}

impl ColorMapper {
    /// Build a palette for opaque RGBA `pixels`.
    ///
    /// Frames with at most 256 distinct colors get an exact palette; otherwise NeuQuant is
    /// trained with sample factor `quality`, lowered for small frames so every learning cycle
    /// sees at least one sample.
    pub fn for_frame(pixels: &[u8], quality: u8) -> Self {
        if let Some(palette) = exact_palette(pixels) {
            return Self::Fixed {
                palette,
                cache: HashMap::new(),
            };
        }
        let pixel_count = pixels.len() / 4;
        let max_fac = (pixel_count / 100).clamp(1, 30) as i32;
        let samplefac = i32::from(quality.clamp(1, 30)).min(max_fac);
        Self::Network(Box::new(NeuQuant::new(samplefac, PALETTE_COLORS, pixels)))
    }

    /// Use a supplied `256 * 3` RGB palette.
    pub fn fixed(palette: &[u8]) -> ForteResult<Self> {
        if palette.len() != PALETTE_COLORS * 3 {
            return Err(ForteError::encode(format!(
                "palette must hold {} bytes, got {}",
                PALETTE_COLORS * 3,
                palette.len()
            )));
        }
        Ok(Self::Fixed {
            palette: palette.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect(),
            cache: HashMap::new(),
        })
    }

    /// The palette as `256 * 3` RGB bytes.
    pub fn palette_bytes(&self) -> Bytes {
        match self {
            Self::Network(nq) => {
                let mut rgb = nq.color_map_rgb();
                rgb.resize(PALETTE_COLORS * 3, 0);
                Bytes::from(rgb)
            }
            Self::Fixed { palette, .. } => Bytes::from(palette.concat()),
        }
    }

    /// Palette index closest to `rgb`.
    pub fn index_of(&mut self, rgb: [u8; 3]) -> u8 {
        match self {
            Self::Network(nq) => nq.index_of(&[rgb[0], rgb[1], rgb[2], 255]) as u8,
            Self::Fixed { palette, cache } => {
                let key = (u32::from(rgb[0]) << 16) | (u32::from(rgb[1]) << 8) | u32::from(rgb[2]);
                *cache
                    .entry(key)
                    .or_insert_with(|| nearest(palette, rgb))
            }
        }
    }

    fn entry(&self, idx: u8) -> [u8; 3] {
        match self {
            Self::Network(nq) => {
                let i = usize::from(idx);
                let map = nq.color_map_rgb();
                map.get(i * 3..i * 3 + 3)
                    .map(|c| [c[0], c[1], c[2]])
                    .unwrap_or([0, 0, 0])
            }
            Self::Fixed { palette, .. } => palette.get(usize::from(idx)).copied().unwrap_or([0, 0, 0]),
        }
    }
}

fn exact_palette(pixels: &[u8]) -> Option<Vec<[u8; 3]>> {
    let mut seen = std::collections::HashSet::new();
    let mut palette = Vec::new();
    for p in pixels.chunks_exact(4) {
        let c = [p[0], p[1], p[2]];
        if seen.insert(c) {
            if palette.len() == PALETTE_COLORS {
                return None;
            }
            palette.push(c);
        }
    }
    palette.resize(PALETTE_COLORS, [0, 0, 0]);
    Some(palette)
}

fn nearest(palette: &[[u8; 3]], rgb: [u8; 3]) -> u8 {
    let mut best = 0usize;
    let mut best_d = u32::MAX;
    for (i, c) in palette.iter().enumerate() {
        let d: u32 = (0..3)
            .map(|k| {
                let diff = i32::from(c[k]) - i32::from(rgb[k]);
                (diff * diff) as u32
            })
            .sum();
        if d < best_d {
            best_d = d;
            best = i;
            if d == 0 {
                break;
            }
        }
    }
    best as u8
}

/// Copy `pixels` with alpha forced opaque, as the quantizer expects.
pub fn opaque_rgba(pixels: &[u8]) -> Vec<u8> {
    let mut out = pixels.to_vec();
    for px in out.chunks_exact_mut(4) {
        px[3] = 255;
    }
    out
}

/// Map RGBA `pixels` to palette indices, diffusing quantization error per `dither`.
pub fn map_indices(
    pixels: &[u8],
    width: u32,
    height: u32,
    mapper: &mut ColorMapper,
    dither: DitherMode,
) -> Vec<u8> {
    let taps = dither.kernel.taps();
    if taps.is_empty() {
        return pixels
            .chunks_exact(4)
            .map(|p| mapper.index_of([p[0], p[1], p[2]]))
            .collect();
    }

    let (w, h) = (width as i64, height as i64);
    let palette: Vec<[u8; 3]> = (0..=255u8).map(|i| mapper.entry(i)).collect();
    let mut work: Vec<[f32; 3]> = pixels
        .chunks_exact(4)
        .map(|p| [f32::from(p[0]), f32::from(p[1]), f32::from(p[2])])
        .collect();
    let mut out = vec![0u8; work.len()];

    for y in 0..h {
        let reverse = dither.serpentine && y % 2 == 1;
        for step in 0..w {
            let x = if reverse { w - 1 - step } else { step };
            let i = (y * w + x) as usize;
            let c = work[i].map(|v| v.round().clamp(0.0, 255.0) as u8);
            let idx = mapper.index_of(c);
            out[i] = idx;

            let p = palette[usize::from(idx)];
            let err = [
                work[i][0] - f32::from(p[0]),
                work[i][1] - f32::from(p[1]),
                work[i][2] - f32::from(p[2]),
            ];
            for &(weight, dx, dy) in taps {
                let nx = if reverse { x - i64::from(dx) } else { x + i64::from(dx) };
                let ny = y + i64::from(dy);
                if nx < 0 || nx >= w || ny >= h {
                    continue;
                }
                let n = (ny * w + nx) as usize;
                for k in 0..3 {
                    work[n][k] += err[k] * weight;
                }
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/encode/quant.rs"]
mod tests;
