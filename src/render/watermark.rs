//! Text watermark: placement, one-time rasterization, and per-frame blending.

use kurbo::{Affine, Point};
use serde::{Deserialize, Serialize};

use crate::foundation::color::Color;
use crate::foundation::core::Canvas;
use crate::foundation::error::{ForteError, ForteResult};
use crate::render::composite::{FrameRGBA, over_in_place};
use crate::render::text::{TextBrushRgba8, TextLayoutEngine};

const PADDING: f64 = 20.0;
const MAX_TILE_STAMPS: usize = 100_000;

/// Anchor of a single watermark.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WatermarkPosition {
    /// Top-left corner, left-aligned.
    TopLeft,
    /// Top-right corner, right-aligned.
    TopRight,
    /// Bottom-left corner, left-aligned.
    BottomLeft,
    /// Bottom-right corner, right-aligned.
    #[default]
    BottomRight,
    /// Canvas center, centered.
    Center,
}

/// Horizontal alignment of text relative to its anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HAlign {
    /// Text starts at the anchor.
    Left,
    /// Text is centered on the anchor.
    Center,
    /// Text ends at the anchor.
    Right,
}

/// Single stamp or a tiled grid.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkLayout {
    /// One stamp at an anchor.
    Single(WatermarkPosition),
    /// A rotated grid of stamps `gap` pixels apart.
    Tiled {
        /// Grid pitch in pixels.
        gap: f64,
    },
}

impl Default for WatermarkLayout {
    fn default() -> Self {
        Self::Single(WatermarkPosition::default())
    }
}

/// Watermark settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkSpec {
    /// Text to stamp.
    pub text: String,
    /// Single or tiled.
    pub layout: WatermarkLayout,
    /// Font size in pixels.
    pub font_size: f32,
    /// Text color.
    pub color: Color,
    /// Blend opacity in `0..=1`.
    pub opacity: f32,
    /// Clockwise rotation in degrees.
    pub rotation_deg: f64,
    /// Font file; a system sans-serif is used when absent.
    pub font_path: Option<std::path::PathBuf>,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: "SF Forte".to_owned(),
            layout: WatermarkLayout::default(),
            font_size: 16.0,
            color: Color::white(),
            opacity: 0.35,
            rotation_deg: 45.0,
            font_path: None,
        }
    }
}

impl WatermarkSpec {
    /// Reject empty text, non-positive font size and non-positive tile gap.
    pub fn validate(&self) -> ForteResult<()> {
        if self.text.trim().is_empty() {
            return Err(ForteError::validation("watermark text must be non-empty"));
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return Err(ForteError::validation(
                "watermark font_size must be finite and > 0",
            ));
        }
        if !self.rotation_deg.is_finite() {
            return Err(ForteError::validation("watermark rotation must be finite"));
        }
        if let WatermarkLayout::Tiled { gap } = self.layout
            && (!gap.is_finite() || gap < 1.0)
        {
            return Err(ForteError::validation("watermark tile gap must be >= 1"));
        }
        Ok(())
    }

    /// Read the configured font, or find a system one.
    pub fn load_font(&self, base_dir: &std::path::Path) -> ForteResult<Vec<u8>> {
        match &self.font_path {
            Some(p) => {
                let path = base_dir.join(p);
                std::fs::read(&path).map_err(|e| ForteError::io(&path, e))
            }
            None => crate::render::text::find_system_font().ok_or_else(|| {
                ForteError::validation("no watermark font configured and no system font found")
            }),
        }
    }
}

/// Anchor point and alignment of a single watermark.
pub fn single_anchor(canvas: Canvas, font_size: f32, position: WatermarkPosition) -> (Point, HAlign) {
    let w = f64::from(canvas.width);
    let h = f64::from(canvas.height);
    let half = f64::from(font_size) / 2.0;
    match position {
        WatermarkPosition::TopLeft => (Point::new(PADDING, PADDING + half), HAlign::Left),
        WatermarkPosition::TopRight => (Point::new(w - PADDING, PADDING + half), HAlign::Right),
        WatermarkPosition::BottomLeft => (Point::new(PADDING, h - PADDING - half), HAlign::Left),
        WatermarkPosition::BottomRight => {
            (Point::new(w - PADDING, h - PADDING - half), HAlign::Right)
        }
        WatermarkPosition::Center => (Point::new(w / 2.0, h / 2.0), HAlign::Center),
    }
}

/// Transforms from text-layout space to canvas space, one per stamp.
///
/// The text box is vertically centered on each stamp origin.
pub fn stamp_transforms(
    canvas: Canvas,
    spec: &WatermarkSpec,
    text_width: f64,
    text_height: f64,
) -> ForteResult<Vec<Affine>> {
    let rotate = Affine::rotate(spec.rotation_deg.to_radians());
    let center_box = Affine::translate((0.0, -text_height / 2.0));

    match spec.layout {
        WatermarkLayout::Single(position) => {
            let (anchor, align) = single_anchor(canvas, spec.font_size, position);
            let dx = match align {
                HAlign::Left => 0.0,
                HAlign::Center => -text_width / 2.0,
                HAlign::Right => -text_width,
            };
            Ok(vec![
                Affine::translate(anchor.to_vec2())
                    * rotate
                    * Affine::translate((dx, -text_height / 2.0)),
            ])
        }
        WatermarkLayout::Tiled { gap } => {
            let w = f64::from(canvas.width);
            let h = f64::from(canvas.height);
            let cols = (w / gap).ceil() as i64;
            let rows = (h / gap).ceil() as i64;
            let count = ((2 * cols + 1) as usize).saturating_mul((2 * rows + 1) as usize);
            if count > MAX_TILE_STAMPS {
                return Err(ForteError::validation(format!(
                    "watermark tile gap {gap} yields {count} stamps"
                )));
            }

            let grid = Affine::translate((w / 2.0, h / 2.0)) * rotate;
            let mut out = Vec::with_capacity(count);
            for row in -rows..=rows {
                for col in -cols..=cols {
                    let origin = (col as f64 * gap, row as f64 * gap);
                    out.push(grid * Affine::translate(origin) * center_box);
                }
            }
            Ok(out)
        }
    }
}

/// A watermark rasterized once for a canvas, blended onto each output frame.
#[derive(Clone, Debug)]
pub struct PreparedWatermark {
    overlay: FrameRGBA,
    opacity: f32,
}

impl PreparedWatermark {
    /// Shape `spec.text` with `font_bytes` and rasterize every stamp onto a transparent overlay.
    #[tracing::instrument(skip_all, fields(text = %spec.text))]
    pub fn rasterize(canvas: Canvas, spec: &WatermarkSpec, font_bytes: &[u8]) -> ForteResult<Self> {
        spec.validate()?;
        canvas.validate()?;

        let [r, g, b, a] = spec.color.to_rgba8();
        let brush = TextBrushRgba8 { r, g, b, a };
        let mut engine = TextLayoutEngine::new();
        let layout = engine.layout_plain(&spec.text, font_bytes, spec.font_size, brush)?;
        let transforms = stamp_transforms(
            canvas,
            spec,
            f64::from(layout.width()),
            f64::from(layout.height()),
        )?;

        let width_u16 = u16::try_from(canvas.width)
            .map_err(|_| ForteError::validation("canvas width exceeds u16"))?;
        let height_u16 = u16::try_from(canvas.height)
            .map_err(|_| ForteError::validation("canvas height exceeds u16"))?;

        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font_bytes.to_vec()),
            0,
        );
        let mut ctx = vello_cpu::RenderContext::new(width_u16, height_u16);
        for t in &transforms {
            ctx.set_transform(affine_to_cpu(*t));
            for line in layout.lines() {
                for item in line.items() {
                    let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                        continue;
                    };
                    let brush = run.style().brush;
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                        brush.r, brush.g, brush.b, brush.a,
                    ));
                    let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                        id: g.id,
                        x: g.x,
                        y: g.y,
                    });
                    ctx.glyph_run(&font)
                        .font_size(run.run().font_size())
                        .fill_glyphs(glyphs);
                }
            }
        }
        ctx.flush();

        let mut pixmap = vello_cpu::Pixmap::new(width_u16, height_u16);
        ctx.render_to_pixmap(&mut pixmap);

        tracing::debug!(stamps = transforms.len(), "rasterized watermark overlay");
        Ok(Self {
            overlay: FrameRGBA {
                width: canvas.width,
                height: canvas.height,
                data: pixmap.data_as_u8_slice().to_vec(),
            },
            opacity: spec.opacity.clamp(0.0, 1.0),
        })
    }

    /// Premultiplied overlay before opacity.
    pub fn overlay(&self) -> &FrameRGBA {
        &self.overlay
    }

    /// Blend the overlay onto `frame`.
    pub fn apply(&self, frame: &mut FrameRGBA) -> ForteResult<()> {
        over_in_place(&mut frame.data, &self.overlay.data, self.opacity)
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

#[cfg(test)]
#[path = "../../tests/unit/render/watermark.rs"]
mod tests;
