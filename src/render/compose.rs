//! Per-frame compositing: base surface, layer frames, watermark.

use crate::foundation::core::Canvas;
use crate::foundation::error::ForteResult;
use crate::render::background::{Background, BaseStyle, paint_base};
use crate::render::composite::{FrameRGBA, blit_straight};
use crate::render::watermark::PreparedWatermark;
use crate::resource::model::RasterFrame;

/// One layer's current sub-frame and the layer origin on the canvas.
#[derive(Clone, Copy, Debug)]
pub struct LayerDraw<'a> {
    /// Frame to draw.
    pub frame: &'a RasterFrame,
    /// Layer origin x.
    pub x: i32,
    /// Layer origin y.
    pub y: i32,
}

/// Paints output frames for one canvas and one set of decorations.
///
/// The base surface and the watermark overlay are prepared once; [`Compositor::compose`] only
/// copies the base, blits layers and blends the overlay.
#[derive(Clone, Debug)]
pub struct Compositor {
    canvas: Canvas,
    base: FrameRGBA,
    watermark: Option<PreparedWatermark>,
}

impl Compositor {
    /// Prepare the base surface for `background` and `style`.
    pub fn new(
        canvas: Canvas,
        background: &Background,
        style: BaseStyle,
        watermark: Option<PreparedWatermark>,
    ) -> ForteResult<Self> {
        canvas.validate()?;
        Ok(Self {
            canvas,
            base: paint_base(canvas, background, style),
            watermark,
        })
    }

    /// Output canvas.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Composite one frame: base, then `layers` in list order, then the watermark.
    pub fn compose(&self, layers: &[LayerDraw<'_>]) -> ForteResult<FrameRGBA> {
        let mut out = self.base.clone();
        for l in layers {
            let x = i64::from(l.x) + i64::from(l.frame.offset_x);
            let y = i64::from(l.y) + i64::from(l.frame.offset_y);
            blit_straight(&mut out, l.frame, x, y);
        }
        if let Some(wm) = &self.watermark {
            wm.apply(&mut out)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compose.rs"]
mod tests;
