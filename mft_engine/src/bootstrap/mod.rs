//! Bootstrap inference engines (C5): adaptive subsample ratios, the
//! m-out-of-n percentile bootstrap, selection-aware meta-strategy
//! bootstrap, and the losing-streak upper bound.

pub mod adaptive_ratio;
pub mod meta_selection;
pub mod meta_streak;
pub mod mn_bootstrap;
