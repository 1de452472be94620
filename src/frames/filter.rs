//! Label predicates, wraparound navigation, and preview playback state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::frames::resolve::FrameLabel;

/// Selected actions and directions. An empty set matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterPredicate {
    /// Action names to keep.
    pub actions: BTreeSet<String>,
    /// Direction indices to keep.
    pub directions: BTreeSet<u32>,
}

impl FilterPredicate {
    /// Predicate matching everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Predicate over the given actions and directions.
    pub fn new<A, S>(actions: A, directions: impl IntoIterator<Item = u32>) -> Self
    where
        A: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            directions: directions.into_iter().collect(),
        }
    }

    /// Whether both sets are empty.
    pub fn is_match_all(&self) -> bool {
        self.actions.is_empty() && self.directions.is_empty()
    }
}

impl std::fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn set<T: std::fmt::Display>(items: impl Iterator<Item = T>) -> String {
            let v: Vec<String> = items.map(|i| i.to_string()).collect();
            if v.is_empty() {
                "*".to_owned()
            } else {
                v.join(", ")
            }
        }
        write!(
            f,
            "actions [{}] directions [{}]",
            set(self.actions.iter()),
            set(self.directions.iter())
        )
    }
}

/// Whether `label` passes `predicate`.
///
/// Unlabeled frames only pass the match-all predicate.
pub fn matches(label: &FrameLabel, predicate: &FilterPredicate) -> bool {
    let action_ok = predicate.actions.is_empty()
        || label
            .action
            .as_ref()
            .is_some_and(|a| predicate.actions.contains(a));
    let direction_ok = predicate.directions.is_empty()
        || label
            .direction
            .is_some_and(|d| predicate.directions.contains(&d));
    action_ok && direction_ok
}

/// First matching index, or 0 when nothing matches.
pub fn first_valid(labels: &[FrameLabel], predicate: &FilterPredicate) -> usize {
    labels
        .iter()
        .position(|l| matches(l, predicate))
        .unwrap_or(0)
}

/// Next matching index after `current`, wrapping around.
///
/// Probes at most `labels.len()` positions; returns `current` when nothing else matches.
pub fn next_valid(current: usize, labels: &[FrameLabel], predicate: &FilterPredicate) -> usize {
    let len = labels.len();
    if len == 0 {
        return 0;
    }
    for step in 1..=len {
        let idx = (current % len + step) % len;
        if matches(&labels[idx], predicate) {
            return idx;
        }
    }
    current
}

/// Every matching index, in order.
pub fn valid_indices(labels: &[FrameLabel], predicate: &FilterPredicate) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter(|(_, l)| matches(l, predicate))
        .map(|(i, _)| i)
        .collect()
}

/// Playback position of one layer in the preview loop.
#[derive(Clone, Debug)]
pub struct Cycler {
    labels: Vec<FrameLabel>,
    predicate: FilterPredicate,
    current: usize,
    last_advance_ms: Option<u64>,
}

impl Cycler {
    /// Start at the first matching frame.
    pub fn new(labels: Vec<FrameLabel>, predicate: FilterPredicate) -> Self {
        let current = first_valid(&labels, &predicate);
        Self {
            labels,
            predicate,
            current,
            last_advance_ms: None,
        }
    }

    /// Frame index currently shown.
    pub fn current(&self) -> usize {
        self.current
    }

    /// Active predicate.
    pub fn predicate(&self) -> &FilterPredicate {
        &self.predicate
    }

    /// Whether any frame matches the active predicate.
    pub fn has_valid(&self) -> bool {
        self.labels.iter().any(|l| matches(l, &self.predicate))
    }

    /// Advance when `frame_delay_ms` has elapsed since the last advance and return the index to
    /// show. The first tick only starts the clock.
    pub fn tick(&mut self, now_ms: u64, frame_delay_ms: u64) -> usize {
        if self.labels.len() <= 1 {
            return self.current;
        }
        match self.last_advance_ms {
            None => self.last_advance_ms = Some(now_ms),
            Some(last) if now_ms.saturating_sub(last) >= frame_delay_ms => {
                self.current = next_valid(self.current, &self.labels, &self.predicate);
                self.last_advance_ms = Some(now_ms);
            }
            Some(_) => {}
        }
        self.current
    }

    /// Swap the predicate and restart at its first matching frame.
    pub fn set_predicate(&mut self, predicate: FilterPredicate) {
        self.predicate = predicate;
        self.current = first_valid(&self.labels, &self.predicate);
    }

    /// Replace the labels, e.g. after the configuration changed.
    pub fn set_labels(&mut self, labels: Vec<FrameLabel>) {
        self.labels = labels;
        self.current = first_valid(&self.labels, &self.predicate);
    }

    /// Rewind to the first matching frame and stop the clock.
    pub fn stop(&mut self) {
        self.current = first_valid(&self.labels, &self.predicate);
        self.last_advance_ms = None;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/frames/filter.rs"]
mod tests;
