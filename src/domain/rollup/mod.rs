//! Rollup module - incremental daily attention counters.

mod aggregate;
mod summary;

pub use aggregate::{AttentionRollup, RollupDelta, RollupKey};
pub use summary::{AttentionSummary, RollupQuery};
