//! Background fills and the grid / glow decorations drawn beneath the layers.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::foundation::color::Color;
use crate::foundation::core::Canvas;
use crate::foundation::error::{ForteError, ForteResult};
use crate::render::composite::{FrameRGBA, premultiply_rgba8_in_place};
use crate::resource::model::RasterFrame;

const GRID_PITCH: u32 = 20;
const GRID_ALPHA: f64 = 0.1;
const GLOW_MAX_RADIUS: f64 = 300.0;
const GLOW_ALPHA: f64 = 0.05;

/// Named gradient backgrounds of the editor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundPreset {
    /// Purple to blue.
    Special,
    /// Green to teal.
    Slow,
    /// Amber to orange.
    Equipment,
    /// Zinc greys.
    NoComment,
    /// Pink to rose.
    #[serde(rename = "time0")]
    Time0,
    /// Cyan to blue.
    #[serde(rename = "time1")]
    Time1,
    /// Amber to yellow.
    #[serde(rename = "equip1")]
    Equip1,
    /// Emerald to green.
    Single,
}

impl BackgroundPreset {
    /// Every preset.
    pub const ALL: [BackgroundPreset; 8] = [
        Self::Special,
        Self::Slow,
        Self::Equipment,
        Self::NoComment,
        Self::Time0,
        Self::Time1,
        Self::Equip1,
        Self::Single,
    ];

    /// Name as used in settings files.
    pub fn name(self) -> &'static str {
        match self {
            Self::Special => "special",
            Self::Slow => "slow",
            Self::Equipment => "equipment",
            Self::NoComment => "no-comment",
            Self::Time0 => "time0",
            Self::Time1 => "time1",
            Self::Equip1 => "equip1",
            Self::Single => "single",
        }
    }

    /// Look a preset up by name.
    pub fn from_name(name: &str) -> ForteResult<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| ForteError::validation(format!("unknown background preset \"{name}\"")))
    }

    /// Gradient stops `(from, to)`.
    pub fn stops(self) -> (Color, Color) {
        let (f, t) = match self {
            Self::Special => ((168, 85, 247), (59, 130, 246)),
            Self::Slow => ((34, 197, 94), (20, 184, 166)),
            Self::Equipment => ((217, 119, 6), (234, 88, 12)),
            Self::NoComment => ((113, 113, 122), (82, 82, 91)),
            Self::Time0 => ((236, 72, 153), (225, 29, 72)),
            Self::Time1 => ((6, 182, 212), (59, 130, 246)),
            Self::Equip1 => ((217, 119, 6), (234, 179, 8)),
            Self::Single => ((16, 185, 129), (34, 197, 94)),
        };
        (
            Color::rgba8(f.0, f.1, f.2, 0.5),
            Color::rgba8(t.0, t.1, t.2, 0.8),
        )
    }
}

/// Background as written in settings files. Image paths are relative to the settings file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundSpec {
    /// Black only.
    #[default]
    None,
    /// Flat color.
    Solid(Color),
    /// Diagonal gradient from the top-left to the bottom-right corner.
    Gradient {
        /// Top-left color.
        from: Color,
        /// Bottom-right color.
        to: Color,
    },
    /// Named gradient.
    Preset(BackgroundPreset),
    /// Image stretched over the canvas.
    Image(PathBuf),
}

impl BackgroundSpec {
    /// Decode image backgrounds, resolving relative paths against `base_dir`.
    pub fn load(&self, base_dir: &Path) -> ForteResult<Background> {
        Ok(match self {
            Self::None => Background::None,
            Self::Solid(c) => Background::Solid(*c),
            Self::Gradient { from, to } => Background::Gradient {
                from: *from,
                to: *to,
            },
            Self::Preset(p) => Background::Preset(*p),
            Self::Image(path) => {
                let path = base_dir.join(path);
                let bytes = std::fs::read(&path).map_err(|e| ForteError::io(&path, e))?;
                let img = image::load_from_memory(&bytes)
                    .map_err(|e| ForteError::validation(format!("background image: {e}")))?
                    .to_rgba8();
                let (w, h) = img.dimensions();
                Background::Image(RasterFrame::new(w, h, 0, 0, img.into_raw())?)
            }
        })
    }
}

/// Background ready to paint.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Background {
    /// Black only.
    #[default]
    None,
    /// Flat color.
    Solid(Color),
    /// Diagonal gradient.
    Gradient {
        /// Top-left color.
        from: Color,
        /// Bottom-right color.
        to: Color,
    },
    /// Named gradient.
    Preset(BackgroundPreset),
    /// Decoded image stretched over the canvas.
    Image(RasterFrame),
}

/// Decorations and opacity applied when painting the base surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaseStyle {
    /// Opacity of the background fill over black.
    pub background_opacity: f32,
    /// Draw the 20px grid.
    pub show_grid: bool,
    /// Draw the centered glow.
    pub show_glow: bool,
}

/// Paint black, the background, the grid and the glow.
///
/// The result is identical for every output frame, so callers paint it once and clone it.
pub fn paint_base(canvas: Canvas, background: &Background, style: BaseStyle) -> FrameRGBA {
    let mut frame = FrameRGBA::filled(canvas, Color::rgba(0.0, 0.0, 0.0, 1.0).to_rgba8_premul());
    let opacity = style.background_opacity.clamp(0.0, 1.0);

    match background {
        Background::None => {}
        Background::Solid(c) => {
            let src = c.to_rgba8_premul().to_array();
            for y in 0..canvas.height {
                for x in 0..canvas.width {
                    frame.blend_pixel(x, y, src, opacity);
                }
            }
        }
        Background::Gradient { from, to } => paint_linear(&mut frame, *from, *to, opacity),
        Background::Preset(p) => {
            let (from, to) = p.stops();
            paint_linear(&mut frame, from, to, opacity);
        }
        Background::Image(img) => paint_image(&mut frame, img, opacity),
    }

    if style.show_grid {
        paint_grid(&mut frame);
    }
    if style.show_glow {
        paint_glow(&mut frame);
    }
    frame
}

fn lerp_color(a: Color, b: Color, t: f64) -> Color {
    Color::rgba(
        a.r + (b.r - a.r) * t,
        a.g + (b.g - a.g) * t,
        a.b + (b.b - a.b) * t,
        a.a + (b.a - a.a) * t,
    )
}

fn paint_linear(frame: &mut FrameRGBA, from: Color, to: Color, opacity: f32) {
    let w = f64::from(frame.width);
    let h = f64::from(frame.height);
    let denom = w * w + h * h;
    for y in 0..frame.height {
        for x in 0..frame.width {
            let px = f64::from(x) + 0.5;
            let py = f64::from(y) + 0.5;
            let t = ((px * w + py * h) / denom).clamp(0.0, 1.0);
            let c = lerp_color(from, to, t).to_rgba8_premul().to_array();
            frame.blend_pixel(x, y, c, opacity);
        }
    }
}

fn paint_image(frame: &mut FrameRGBA, img: &RasterFrame, opacity: f32) {
    let Some(src) = image::RgbaImage::from_raw(img.width, img.height, img.pixels.to_vec()) else {
        return;
    };
    let scaled = image::imageops::resize(
        &src,
        frame.width,
        frame.height,
        image::imageops::FilterType::Triangle,
    );
    let mut data = scaled.into_raw();
    premultiply_rgba8_in_place(&mut data);
    for y in 0..frame.height {
        for x in 0..frame.width {
            let i = ((y as usize) * (frame.width as usize) + (x as usize)) * 4;
            frame.blend_pixel(x, y, [data[i], data[i + 1], data[i + 2], data[i + 3]], opacity);
        }
    }
}

fn paint_grid(frame: &mut FrameRGBA) {
    let line = Color::rgba8(0x44, 0x44, 0x44, 1.0).to_rgba8_premul().to_array();
    let alpha = GRID_ALPHA as f32;
    for y in 0..frame.height {
        for x in 0..frame.width {
            if x % GRID_PITCH == 0 || y % GRID_PITCH == 0 {
                frame.blend_pixel(x, y, line, alpha);
            }
        }
    }
}

fn paint_glow(frame: &mut FrameRGBA) {
    let cx = f64::from(frame.width) / 2.0;
    let cy = f64::from(frame.height) / 2.0;
    let radius = glow_radius(frame.width, frame.height);
    if radius <= 0.0 {
        return;
    }
    for y in 0..frame.height {
        for x in 0..frame.width {
            let dx = f64::from(x) + 0.5 - cx;
            let dy = f64::from(y) + 0.5 - cy;
            let d = (dx * dx + dy * dy).sqrt();
            if d >= radius {
                continue;
            }
            let a = GLOW_ALPHA * (1.0 - d / radius);
            let c = Color::rgba8(8, 145, 178, a).to_rgba8_premul().to_array();
            frame.blend_pixel(x, y, c, 1.0);
        }
    }
}

/// Radius of the centered glow.
pub fn glow_radius(width: u32, height: u32) -> f64 {
    GLOW_MAX_RADIUS.min(f64::from(width.min(height)) / 2.0)
}

#[cfg(test)]
#[path = "../../tests/unit/render/background.rs"]
mod tests;
