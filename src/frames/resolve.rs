//! Frame label resolution: replaying an action configuration over a frame array.

use crate::resource::model::{Configuration, RasterFrame};

/// Layouts larger than this are treated as malformed rather than walked.
const MAX_LAYOUT_FRAMES: u64 = 1 << 24;

/// The `(action, direction)` label of one frame. Unlabeled frames carry `None` in both fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameLabel {
    /// Action name from the run's `Output`.
    pub action: Option<String>,
    /// Direction index within the run.
    pub direction: Option<u32>,
}

impl FrameLabel {
    /// Unlabeled.
    pub fn none() -> Self {
        Self::default()
    }

    /// Labeled with `action` and `direction`.
    pub fn new(action: impl Into<String>, direction: u32) -> Self {
        Self {
            action: Some(action.into()),
            direction: Some(direction),
        }
    }

    /// Whether both fields are set.
    pub fn is_labeled(&self) -> bool {
        self.action.is_some() && self.direction.is_some()
    }
}

/// Which resolution strategy produced a label table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvePolicy {
    /// Frame count equals the emitted count; labels are assigned in run order.
    Direct,
    /// Counts disagree; labels are assigned by rank among the included original indices.
    Positional,
}

impl std::fmt::Display for ResolvePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Positional => f.write_str("positional"),
        }
    }
}

/// Labels plus the policy that produced them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// One label per frame.
    pub labels: Vec<FrameLabel>,
    /// Strategy used.
    pub policy: ResolvePolicy,
}

impl Resolution {
    /// Number of labeled frames.
    pub fn mapped(&self) -> usize {
        self.labels.iter().filter(|l| l.is_labeled()).count()
    }
}

/// Label every frame of `frames` from `config`.
///
/// Never fails: malformed or overflowing layouts leave frames unlabeled.
pub fn resolve(frames: &[RasterFrame], config: &Configuration) -> Vec<FrameLabel> {
    resolve_count(frames.len(), config).labels
}

/// [`resolve`] over a frame count, reporting the policy used.
pub fn resolve_count(frame_count: usize, config: &Configuration) -> Resolution {
    let emitted = config.emitted_frame_count();
    let resolution = match emitted {
        Some(n) if n == frame_count as u64 => Resolution {
            labels: resolve_direct(frame_count, config),
            policy: ResolvePolicy::Direct,
        },
        _ => Resolution {
            labels: resolve_positional(frame_count, config),
            policy: ResolvePolicy::Positional,
        },
    };

    if resolution.policy == ResolvePolicy::Positional && !config.is_empty() {
        tracing::warn!(
            frames = frame_count,
            expected = ?emitted,
            "frame count does not match configuration, using positional mapping"
        );
    }
    tracing::debug!(
        policy = %resolution.policy,
        "mapped {} of {} frames",
        resolution.mapped(),
        frame_count
    );
    resolution
}

fn resolve_direct(frame_count: usize, config: &Configuration) -> Vec<FrameLabel> {
    let mut labels = vec![FrameLabel::none(); frame_count];
    let mut slots = labels.iter_mut();
    for run in &config.runs {
        for direction in 0..run.direction_count {
            for _ in 0..run.frame_count {
                match slots.next() {
                    Some(slot) => *slot = FrameLabel::new(run.label.clone(), direction),
                    None => return labels,
                }
            }
        }
    }
    labels
}

fn resolve_positional(frame_count: usize, config: &Configuration) -> Vec<FrameLabel> {
    let mut labels = vec![FrameLabel::none(); frame_count];
    let Some(walk) = walk_original_indices(config) else {
        tracing::warn!("configuration layout overflows, leaving frames unlabeled");
        return labels;
    };

    let mut included: Vec<u64> = walk.iter().map(|(idx, _, _)| *idx).collect();
    included.sort_unstable();

    for (original, run_idx, direction) in walk {
        let rank = included.partition_point(|&v| v < original);
        if rank < frame_count {
            labels[rank] = FrameLabel::new(config.runs[run_idx].label.clone(), direction);
        }
    }
    labels
}

/// `(original_index, run_index, direction)` for every emitted frame in run order.
fn walk_original_indices(config: &Configuration) -> Option<Vec<(u64, usize, u32)>> {
    let total = config.emitted_frame_count()?;
    if total > MAX_LAYOUT_FRAMES {
        return None;
    }
    let mut out = Vec::with_capacity(total as usize);
    for (run_idx, run) in config.runs.iter().enumerate() {
        for direction in 0..run.direction_count {
            for offset in 0..run.frame_count {
                out.push((run.original_index(direction, offset)?, run_idx, direction));
            }
        }
    }
    Some(out)
}

#[cfg(test)]
#[path = "../../tests/unit/frames/resolve.rs"]
mod tests;
