//! IdempotencyGuard - wraps request processing in a key reservation.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::PublisherId;
use crate::domain::ingest::IngestError;
use crate::ports::{CachedResponse, IdempotencyStore, Reservation};

/// A caller-chosen key namespaced by publisher, so two publishers never
/// collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// # Errors
    ///
    /// - `MissingIdempotencyKey` when `raw` is absent or blank
    pub fn scoped(publisher_id: &PublisherId, raw: Option<&str>) -> Result<Self, IngestError> {
        let raw = raw
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(IngestError::MissingIdempotencyKey)?;
        Ok(Self(format!("{}:{}", publisher_id, raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What the caller should do after claiming a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Process the request, then `complete` or `abandon` the key.
    Proceed,
    /// Return this response verbatim and do nothing else.
    Replay(CachedResponse),
}

pub struct IdempotencyGuard {
    store: Arc<dyn IdempotencyStore>,
    ttl: Duration,
    lease: Duration,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn IdempotencyStore>, ttl: Duration, lease: Duration) -> Self {
        Self { store, ttl, lease }
    }

    /// # Errors
    ///
    /// - `IdempotencyKeyInUse` while another request holds the key
    pub async fn begin(&self, key: &IdempotencyKey) -> Result<GuardDecision, IngestError> {
        match self.store.reserve(key.as_str(), self.lease).await? {
            Reservation::Reserved => Ok(GuardDecision::Proceed),
            Reservation::Replay(cached) => {
                tracing::debug!(key = %key.as_str(), "Replaying cached response");
                Ok(GuardDecision::Replay(cached))
            }
            Reservation::InFlight => Err(IngestError::IdempotencyKeyInUse),
        }
    }

    /// Stores the response for replay. A failure here is logged only: the
    /// response has been produced and the lease will lapse on its own.
    pub async fn complete(&self, key: &IdempotencyKey, response: &CachedResponse) {
        if let Err(e) = self.store.commit(key.as_str(), response, self.ttl).await {
            tracing::error!(key = %key.as_str(), error = %e, "Failed to cache idempotent response");
        }
    }

    /// Frees the key so the caller can retry.
    pub async fn abandon(&self, key: &IdempotencyKey) {
        if let Err(e) = self.store.release(key.as_str()).await {
            tracing::warn!(key = %key.as_str(), error = %e, "Failed to release idempotency key");
        }
    }
}
