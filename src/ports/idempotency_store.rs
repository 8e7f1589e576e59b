//! IdempotencyStore port - caller-keyed response cache.
//!
//! A publisher retrying a request with the same idempotency key must get the
//! exact bytes it got the first time, and nothing else may happen.
//!
//! ## Lifecycle of a key
//!
//! ```text
//! absent ──reserve──▶ in flight ──commit──▶ committed ──ttl──▶ expired
//!                        │                                       │
//!                        └──release / lease lapses──▶ absent ◀───┘
//! ```
//!
//! `reserve` must be a single conditional write. Implementations never read
//! and then write.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::foundation::{DomainError, Timestamp};

/// A response body and status captured for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status_code: u16,
    pub body: String,
}

impl CachedResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }
}

/// Result of trying to claim a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// The caller owns the key and must `commit` or `release` it.
    Reserved,
    /// The key was already answered; return this verbatim.
    Replay(CachedResponse),
    /// Another request holds a live lease on the key.
    InFlight,
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Claims `key` for `lease`.
    ///
    /// An expired committed entry or a lapsed lease is taken over as if the
    /// key were absent.
    async fn reserve(&self, key: &str, lease: Duration) -> Result<Reservation, DomainError>;

    /// Stores the response for a reserved key, valid for `ttl`.
    async fn commit(
        &self,
        key: &str,
        response: &CachedResponse,
        ttl: Duration,
    ) -> Result<(), DomainError>;

    /// Drops an uncommitted reservation so the caller can retry.
    async fn release(&self, key: &str) -> Result<(), DomainError>;

    /// Deletes entries whose expiry is before `now`. Returns the count removed.
    async fn purge_expired(&self, now: Timestamp) -> Result<u64, DomainError>;
}
