//! In-memory idempotency store for tests and single-process runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{CachedResponse, IdempotencyStore, Reservation};

#[derive(Debug, Clone)]
struct Entry {
    response: Option<CachedResponse>,
    expires_at: Timestamp,
}

impl Entry {
    fn is_live(&self, now: Timestamp) -> bool {
        self.expires_at > now
    }
}

/// Keys live in one map behind a write lock, so reservation is a single
/// critical section.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdempotencyStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held, live or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn deadline(now: Timestamp, ttl: Duration) -> Timestamp {
    now.plus_secs(ttl.as_secs().max(1) as i64)
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn reserve(&self, key: &str, lease: Duration) -> Result<Reservation, DomainError> {
        let now = Timestamp::now();
        let mut entries = self.entries.write().await;

        if let Some(entry) = entries.get(key).filter(|e| e.is_live(now)) {
            return Ok(match &entry.response {
                Some(cached) => Reservation::Replay(cached.clone()),
                None => Reservation::InFlight,
            });
        }

        entries.insert(
            key.to_string(),
            Entry {
                response: None,
                expires_at: deadline(now, lease),
            },
        );
        Ok(Reservation::Reserved)
    }

    async fn commit(
        &self,
        key: &str,
        response: &CachedResponse,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                response: Some(response.clone()),
                expires_at: deadline(Timestamp::now(), ttl),
            },
        );
        Ok(())
    }

    async fn release(&self, key: &str) -> Result<(), DomainError> {
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.response.is_none()) {
            entries.remove(key);
        }
        Ok(())
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, DomainError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok((before - entries.len()) as u64)
    }
}
