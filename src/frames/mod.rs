//! Frame labeling and selection.

/// Label predicates and preview cycling.
pub mod filter;
/// Action/direction labels from a run-length layout.
pub mod resolve;
