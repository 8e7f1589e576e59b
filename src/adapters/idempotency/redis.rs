//! Redis-backed idempotency store for multi-server deployments.
//!
//! A reservation is `SET key <marker> NX PX lease`; the committed response
//! replaces the marker with `SET key <json> EX ttl`. Expiry is native, so
//! nothing is ever purged by hand.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{CachedResponse, IdempotencyStore, Reservation};

const IN_FLIGHT: &str = "__inflight__";

/// Deletes the key only while it still holds the in-flight marker.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

fn cache_error(context: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::CacheError, format!("{}: {}", context, err))
}

#[derive(Clone)]
pub struct RedisIdempotencyStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisIdempotencyStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            prefix: "idempotency".to_string(),
        }
    }

    /// Namespaces keys, e.g. per environment.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn reserve(&self, key: &str, lease: Duration) -> Result<Reservation, DomainError> {
        let redis_key = self.redis_key(key);
        let mut conn = self.conn.clone();
        let lease_ms = lease.as_millis().max(1) as u64;

        // The entry can expire between SET NX and GET; one retry covers it.
        for _ in 0..2 {
            let claimed: Option<String> = redis::cmd("SET")
                .arg(&redis_key)
                .arg(IN_FLIGHT)
                .arg("NX")
                .arg("PX")
                .arg(lease_ms)
                .query_async(&mut conn)
                .await
                .map_err(|e: redis::RedisError| cache_error("Failed to reserve key", e))?;

            if claimed.is_some() {
                return Ok(Reservation::Reserved);
            }

            let existing: Option<String> = conn
                .get(&redis_key)
                .await
                .map_err(|e: redis::RedisError| cache_error("Failed to read key", e))?;

            match existing.as_deref() {
                Some(IN_FLIGHT) => return Ok(Reservation::InFlight),
                Some(raw) => {
                    let cached: CachedResponse = serde_json::from_str(raw)
                        .map_err(|e| cache_error("Corrupt cached response", e))?;
                    return Ok(Reservation::Replay(cached));
                }
                None => continue,
            }
        }

        Ok(Reservation::InFlight)
    }

    async fn commit(
        &self,
        key: &str,
        response: &CachedResponse,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        let encoded = serde_json::to_string(response)
            .map_err(|e| cache_error("Failed to encode response", e))?;
        let mut conn = self.conn.clone();

        redis::cmd("SET")
            .arg(self.redis_key(key))
            .arg(encoded)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e: redis::RedisError| cache_error("Failed to commit key", e))
    }

    async fn release(&self, key: &str) -> Result<(), DomainError> {
        let mut conn = self.conn.clone();

        redis::Script::new(RELEASE_SCRIPT)
            .key(self.redis_key(key))
            .arg(IN_FLIGHT)
            .invoke_async::<_, i64>(&mut conn)
            .await
            .map_err(|e: redis::RedisError| cache_error("Failed to release key", e))?;

        Ok(())
    }

    async fn purge_expired(&self, _now: Timestamp) -> Result<u64, DomainError> {
        Ok(0)
    }
}
