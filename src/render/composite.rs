//! Premultiplied RGBA8 surfaces and source-over blending.

use crate::foundation::core::{Canvas, Rgba8Premul};
use crate::foundation::error::{ForteError, ForteResult};
use crate::foundation::math::{mul_div255_u8, unit_to_u8};
use crate::resource::model::RasterFrame;

/// Premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// One composited output frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// Transparent frame covering `canvas`.
    pub fn transparent(canvas: Canvas) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            data: vec![0; canvas.rgba_len()],
        }
    }

    /// Frame filled with `color`.
    pub fn filled(canvas: Canvas, color: Rgba8Premul) -> Self {
        let mut f = Self::transparent(canvas);
        f.fill(color);
        f
    }

    /// Overwrite every pixel with `color`.
    pub fn fill(&mut self, color: Rgba8Premul) {
        let px = color.to_array();
        for d in self.data.chunks_exact_mut(4) {
            d.copy_from_slice(&px);
        }
    }

    /// Premultiplied pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<PremulRgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let p = self.data.get(idx..idx + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }

    /// Blend `src` over the pixel at `(x, y)`; out-of-bounds writes are dropped.
    pub fn blend_pixel(&mut self, x: u32, y: u32, src: PremulRgba8, opacity: f32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let d = &mut self.data[idx..idx + 4];
        let out = over([d[0], d[1], d[2], d[3]], src, opacity);
        d.copy_from_slice(&out);
    }

    /// Straight-alpha copy of the pixel data.
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        unpremultiply_rgba8_in_place(&mut out);
        out
    }
}

/// Source-over of premultiplied `src` onto `dst`, with `src` scaled by `opacity`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = u16::from(unit_to_u8(opacity));
    let sa = mul_div255_u8(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = sa.saturating_add(mul_div255_u8(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255_u8(u16::from(src[i]), op);
        let dc = mul_div255_u8(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

/// [`over`] across two equal-length premultiplied buffers.
pub fn over_in_place(dst: &mut [u8], src: &[u8], opacity: f32) -> ForteResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ForteError::validation(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], opacity);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// Draw a straight-alpha raster at `(x, y)` unscaled, clipped to `dst`.
pub fn blit_straight(dst: &mut FrameRGBA, src: &RasterFrame, x: i64, y: i64) {
    let (dw, dh) = (i64::from(dst.width), i64::from(dst.height));
    let (sw, sh) = (i64::from(src.width), i64::from(src.height));

    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + sw).min(dw);
    let y1 = (y + sh).min(dh);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    for dy in y0..y1 {
        let sy = (dy - y) as usize;
        let src_row = sy * (src.width as usize) * 4;
        let dst_row = (dy as usize) * (dst.width as usize) * 4;
        for dx in x0..x1 {
            let sx = (dx - x) as usize;
            let si = src_row + sx * 4;
            // short buffers leave the uncovered tail untouched
            let Some(s) = src.pixels.get(si..si + 4) else {
                continue;
            };
            if s[3] == 0 {
                continue;
            }
            let p = Rgba8Premul::from_straight_rgba(s[0], s[1], s[2], s[3]).to_array();
            let di = dst_row + (dx as usize) * 4;
            let d = &mut dst.data[di..di + 4];
            let out = over([d[0], d[1], d[2], d[3]], p, 1.0);
            d.copy_from_slice(&out);
        }
    }
}

/// Premultiply straight RGBA8 bytes in place.
pub fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let p = Rgba8Premul::from_straight_rgba(px[0], px[1], px[2], px[3]);
        px.copy_from_slice(&p.to_array());
    }
}

/// Undo premultiplication in place.
pub fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
