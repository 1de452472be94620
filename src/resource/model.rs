//! Sprite resources: raster frames, the run-length action configuration, and positioned layers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{ForteError, ForteResult};

/// One decoded sprite frame.
///
/// Pixels are straight-alpha RGBA8 rows (`width * height * 4` bytes), shared so compositing and
/// filtering reference the same buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterFrame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Horizontal placement offset relative to the layer origin.
    pub offset_x: i32,
    /// Vertical placement offset relative to the layer origin.
    pub offset_y: i32,
    /// Straight-alpha RGBA8 pixels.
    pub pixels: Arc<[u8]>,
}

impl RasterFrame {
    /// Build a frame, checking the pixel buffer length.
    pub fn new(
        width: u32,
        height: u32,
        offset_x: i32,
        offset_y: i32,
        pixels: impl Into<Arc<[u8]>>,
    ) -> ForteResult<Self> {
        let pixels = pixels.into();
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| ForteError::validation("raster frame size overflow"))?;
        if pixels.len() != expected {
            return Err(ForteError::validation(format!(
                "raster frame expects {expected} bytes for {width}x{height}, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            offset_x,
            offset_y,
            pixels,
        })
    }

    /// A frame filled with one straight-alpha color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let n = (width as usize) * (height as usize);
        let mut px = Vec::with_capacity(n * 4);
        for _ in 0..n {
            px.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            offset_x: 0,
            offset_y: 0,
            pixels: px.into(),
        }
    }

    /// Same pixels at a different placement offset.
    pub fn with_offset(mut self, offset_x: i32, offset_y: i32) -> Self {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
        self
    }

    /// Straight RGBA of the pixel at `(x, y)`, if inside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let p = self.pixels.get(idx..idx + 4)?;
        Some([p[0], p[1], p[2], p[3]])
    }
}

/// One run of an action configuration.
///
/// Runs are nested loops: for each of `direction_count` directions, `frame_count` frames are
/// emitted and then `skip_count` frames of the original indexing space are passed over. `start`
/// is the original index of the first direction's first frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRun {
    /// Original index of the first frame.
    #[serde(rename = "Start")]
    pub start: u32,
    /// Emitted frames per direction.
    #[serde(rename = "Frame")]
    pub frame_count: u32,
    /// Skipped frames following each direction's emitted frames.
    #[serde(rename = "Skip")]
    pub skip_count: u32,
    /// Action label attached to every emitted frame.
    #[serde(rename = "Output")]
    pub label: String,
    /// Number of directions.
    #[serde(rename = "Dir")]
    pub direction_count: u32,
}

impl ActionRun {
    /// Shorthand constructor.
    pub fn new(
        start: u32,
        frame_count: u32,
        skip_count: u32,
        label: impl Into<String>,
        direction_count: u32,
    ) -> Self {
        Self {
            start,
            frame_count,
            skip_count,
            label: label.into(),
            direction_count,
        }
    }

    /// Frames this run emits over all directions, `None` on overflow.
    pub fn emitted(&self) -> Option<u64> {
        u64::from(self.frame_count).checked_mul(u64::from(self.direction_count))
    }

    /// Original index of `(direction, frame_offset)`, `None` on overflow.
    pub fn original_index(&self, direction: u32, frame_offset: u32) -> Option<u64> {
        let stride = u64::from(self.frame_count).checked_add(u64::from(self.skip_count))?;
        u64::from(direction)
            .checked_mul(stride)?
            .checked_add(u64::from(self.start))?
            .checked_add(u64::from(frame_offset))
    }
}

/// Kind of sprite resource an action configuration targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum ActType {
    /// Unknown kind.
    #[default]
    None,
    /// Player body.
    Player,
    /// Monster.
    Monster,
    /// Spell or hit effect.
    Effect,
    /// Weapon overlay.
    Weapon,
    /// Hair overlay.
    Hair,
    /// Wing overlay.
    Wing,
    /// Shield overlay.
    Shield,
    /// Non-player character.
    Npc,
}

impl TryFrom<i32> for ActType {
    type Error = String;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        Ok(match v {
            -1 => Self::None,
            0 => Self::Player,
            1 => Self::Monster,
            2 => Self::Effect,
            3 => Self::Weapon,
            4 => Self::Hair,
            5 => Self::Wing,
            6 => Self::Shield,
            7 => Self::Npc,
            other => return Err(format!("unknown resource type {other}")),
        })
    }
}

impl From<ActType> for i32 {
    fn from(v: ActType) -> Self {
        match v {
            ActType::None => -1,
            ActType::Player => 0,
            ActType::Monster => 1,
            ActType::Effect => 2,
            ActType::Weapon => 3,
            ActType::Hair => 4,
            ActType::Wing => 5,
            ActType::Shield => 6,
            ActType::Npc => 7,
        }
    }
}

/// Ordered action runs describing how a frame array partitions into actions and directions.
///
/// Deserializes from the act configuration format `{ "Type": 0, "Actions": [...] }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// Resource kind.
    #[serde(rename = "Type", default)]
    pub kind: ActType,
    /// Runs in label order.
    #[serde(rename = "Actions", default)]
    pub runs: Vec<ActionRun>,
}

impl Configuration {
    /// Configuration with the given runs and an unknown resource kind.
    pub fn new(runs: Vec<ActionRun>) -> Self {
        Self {
            kind: ActType::None,
            runs,
        }
    }

    /// Whether the configuration has no runs.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Σ frame_count × direction_count, `None` on overflow.
    pub fn emitted_frame_count(&self) -> Option<u64> {
        self.runs
            .iter()
            .try_fold(0u64, |acc, r| acc.checked_add(r.emitted()?))
    }

    /// Highest original index any run references, plus one. `Some(0)` for an empty layout.
    pub fn raw_span(&self) -> Option<u64> {
        let mut span = 0u64;
        for r in &self.runs {
            if r.frame_count == 0 || r.direction_count == 0 {
                continue;
            }
            let last = r.original_index(r.direction_count - 1, r.frame_count - 1)?;
            span = span.max(last.checked_add(1)?);
        }
        Some(span)
    }

    /// Parse from act configuration JSON text.
    pub fn from_json_str(s: &str) -> ForteResult<Self> {
        serde_json::from_str(s).map_err(|e| ForteError::serde(e.to_string()))
    }
}

/// Canonical action labels shipped with the stock act configurations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActOutput {
    /// Unknown.
    None,
    /// Standing.
    Idle,
    /// Walking.
    Walk,
    /// Running.
    Run,
    /// Ready to attack.
    AttackReady,
    /// Physical attack.
    AttackPhysic,
    /// Mining.
    Mine,
    /// Magic attack.
    AttackMagic,
    /// Gathering.
    Gather,
    /// Being hit.
    Hurt,
    /// Dying.
    Die,
    /// Effect animation.
    Effect,
    /// Showcase animation.
    Showcase,
}

impl ActOutput {
    /// All labels in declaration order.
    pub const ALL: [ActOutput; 13] = [
        Self::None,
        Self::Idle,
        Self::Walk,
        Self::Run,
        Self::AttackReady,
        Self::AttackPhysic,
        Self::Mine,
        Self::AttackMagic,
        Self::Gather,
        Self::Hurt,
        Self::Die,
        Self::Effect,
        Self::Showcase,
    ];

    /// Label string as it appears in act configuration `Output` fields.
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "未知",
            Self::Idle => "待机",
            Self::Walk => "行走",
            Self::Run => "跑步",
            Self::AttackReady => "预备攻击",
            Self::AttackPhysic => "物理攻击",
            Self::Mine => "采矿",
            Self::AttackMagic => "魔法攻击",
            Self::Gather => "采集",
            Self::Hurt => "被攻击",
            Self::Die => "死亡",
            Self::Effect => "特效",
            Self::Showcase => "展示",
        }
    }

    /// Reverse of [`ActOutput::label`].
    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.label() == s)
    }
}

/// The eight facing directions, numbered clockwise from up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ActDir {
    /// Up.
    Up = 0,
    /// Up-right.
    UpRight = 1,
    /// Right.
    Right = 2,
    /// Down-right.
    DownRight = 3,
    /// Down.
    Down = 4,
    /// Down-left.
    DownLeft = 5,
    /// Left.
    Left = 6,
    /// Up-left.
    UpLeft = 7,
}

impl ActDir {
    /// Direction for a numeric index.
    pub fn from_index(i: u32) -> Option<Self> {
        Some(match i {
            0 => Self::Up,
            1 => Self::UpRight,
            2 => Self::Right,
            3 => Self::DownRight,
            4 => Self::Down,
            5 => Self::DownLeft,
            6 => Self::Left,
            7 => Self::UpLeft,
            _ => return None,
        })
    }

    /// Numeric index.
    pub fn index(self) -> u32 {
        self as u32
    }
}

/// An imported resource positioned on the canvas. List position is z-order.
#[derive(Clone, Debug)]
pub struct Layer {
    /// Display name.
    pub name: String,
    /// Frames in playback order.
    pub frames: Arc<[RasterFrame]>,
    /// Action layout of `frames`.
    pub config: Configuration,
    /// Canvas x of the layer origin.
    pub x: i32,
    /// Canvas y of the layer origin.
    pub y: i32,
    /// Hidden layers are neither previewed nor exported.
    pub visible: bool,
}

impl Layer {
    /// Visible layer at the origin with an empty configuration.
    pub fn new(name: impl Into<String>, frames: Vec<RasterFrame>) -> Self {
        Self {
            name: name.into(),
            frames: frames.into(),
            config: Configuration::default(),
            x: 0,
            y: 0,
            visible: true,
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: Configuration) -> Self {
        self.config = config;
        self
    }

    /// Move the layer origin.
    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    /// Bounding size, taken from the first frame.
    pub fn size(&self) -> (u32, u32) {
        self.frames
            .first()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0))
    }

    /// Whether canvas point `(x, y)` hits an opaque pixel of the first frame.
    pub fn hit_test(&self, x: i32, y: i32) -> bool {
        let Some(first) = self.frames.first() else {
            return false;
        };
        let left = i64::from(self.x) + i64::from(first.offset_x);
        let top = i64::from(self.y) + i64::from(first.offset_y);
        let lx = i64::from(x) - left;
        let ly = i64::from(y) - top;
        if lx < 0 || ly < 0 || lx >= i64::from(first.width) || ly >= i64::from(first.height) {
            return false;
        }
        first
            .pixel(lx as u32, ly as u32)
            .is_some_and(|p| p[3] > 0)
    }
}

/// Index of the top-most visible layer hit at `(x, y)`.
pub fn find_layer_at(x: i32, y: i32, layers: &[Layer]) -> Option<usize> {
    layers
        .iter()
        .enumerate()
        .rev()
        .find(|(_, l)| l.visible && l.hit_test(x, y))
        .map(|(i, _)| i)
}

#[cfg(test)]
#[path = "../../tests/unit/resource/model.rs"]
mod tests;
