//! PostgreSQL implementation of IdempotencyStore.
//!
//! One row per key. `expires_at` is the lease deadline while the row has no
//! response and the cache deadline once it does. Reservation is a single
//! `INSERT ... ON CONFLICT DO UPDATE ... WHERE expires_at <= now`, so a live
//! row can never be claimed twice.

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use sqlx::PgPool;
use std::time::Duration;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{CachedResponse, IdempotencyStore, Reservation};

pub struct PostgresIdempotencyStore {
    pool: PgPool,
}

impl PostgresIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct KeyRow {
    status_code: Option<i16>,
    response_body: Option<String>,
}

fn deadline(now: Timestamp, ttl: Duration) -> Timestamp {
    let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(1));
    Timestamp::from_datetime(*now.as_datetime() + ttl)
}

#[async_trait]
impl IdempotencyStore for PostgresIdempotencyStore {
    async fn reserve(&self, key: &str, lease: Duration) -> Result<Reservation, DomainError> {
        let now = Timestamp::now();

        let claimed: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO idempotency_keys (key, status_code, response_body, expires_at, created_at)
            VALUES ($1, NULL, NULL, $2, $3)
            ON CONFLICT (key) DO UPDATE SET
                status_code = NULL,
                response_body = NULL,
                expires_at = EXCLUDED.expires_at,
                created_at = EXCLUDED.created_at
            WHERE idempotency_keys.expires_at <= EXCLUDED.created_at
            RETURNING key
            "#,
        )
        .bind(key)
        .bind(deadline(now, lease).as_datetime())
        .bind(now.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to reserve idempotency key", e))?;

        if claimed.is_some() {
            return Ok(Reservation::Reserved);
        }

        let row: Option<KeyRow> = sqlx::query_as(
            "SELECT status_code, response_body FROM idempotency_keys WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to read idempotency key", e))?;

        Ok(match row {
            Some(KeyRow {
                status_code: Some(status),
                response_body: Some(body),
            }) => Reservation::Replay(CachedResponse::new(status as u16, body)),
            // Purged between the two statements; the caller retries.
            _ => Reservation::InFlight,
        })
    }

    async fn commit(
        &self,
        key: &str,
        response: &CachedResponse,
        ttl: Duration,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE idempotency_keys
            SET status_code = $2, response_body = $3, expires_at = $4
            WHERE key = $1
            "#,
        )
        .bind(key)
        .bind(response.status_code as i16)
        .bind(&response.body)
        .bind(deadline(Timestamp::now(), ttl).as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to commit idempotency key", e))?;

        Ok(())
    }

    async fn release(&self, key: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM idempotency_keys WHERE key = $1 AND status_code IS NULL")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to release idempotency key", e))?;

        Ok(())
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM idempotency_keys WHERE expires_at < $1")
            .bind(now.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to purge idempotency keys", e))?;

        Ok(result.rows_affected())
    }
}
