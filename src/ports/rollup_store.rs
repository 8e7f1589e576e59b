//! RollupStore port - incremental attention counters.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::rollup::{AttentionRollup, RollupDelta, RollupKey, RollupQuery};

#[async_trait]
pub trait RollupStore: Send + Sync {
    /// Applies `delta` to the row for `key`, creating it if absent, and
    /// returns the updated row. Concurrent calls for one key must not lose
    /// increments.
    async fn record(&self, key: &RollupKey, delta: RollupDelta)
        -> Result<AttentionRollup, DomainError>;

    async fn query(&self, query: &RollupQuery) -> Result<Vec<AttentionRollup>, DomainError>;
}
