//! Ingestion pipeline configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::http::IngestSettings;

/// Which store backs the idempotency guard.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyBackend {
    #[default]
    Postgres,
    Redis,
    /// Single-process only; lost on restart.
    Memory,
}

/// Ingestion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub idempotency_backend: IdempotencyBackend,

    /// How long a committed response is replayed
    #[serde(default = "default_idempotency_ttl")]
    pub idempotency_ttl_secs: u64,

    /// How long an uncommitted reservation blocks retries
    #[serde(default = "default_reservation_lease")]
    pub reservation_lease_secs: u64,

    /// Accepted clock skew for signed requests, either direction
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: i64,

    /// Interval between sweeps of expired idempotency entries
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Upper bound for `limit` on receipt listings
    #[serde(default = "default_max_list_limit")]
    pub max_list_limit: u32,
}

impl IngestConfig {
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    /// Request-path settings handed to the HTTP adapter.
    pub fn settings(&self) -> IngestSettings {
        IngestSettings {
            idempotency_ttl: Duration::from_secs(self.idempotency_ttl_secs),
            reservation_lease: Duration::from_secs(self.reservation_lease_secs),
            signature_tolerance_secs: self.signature_tolerance_secs,
            max_body_bytes: self.max_body_bytes,
            max_list_limit: self.max_list_limit,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.idempotency_ttl_secs == 0 {
            return Err(ValidationError::InvalidIngestSetting("idempotency_ttl_secs"));
        }
        if self.reservation_lease_secs == 0
            || self.reservation_lease_secs > self.idempotency_ttl_secs
        {
            return Err(ValidationError::InvalidIngestSetting("reservation_lease_secs"));
        }
        if self.signature_tolerance_secs <= 0 {
            return Err(ValidationError::InvalidIngestSetting("signature_tolerance_secs"));
        }
        if self.purge_interval_secs == 0 {
            return Err(ValidationError::InvalidIngestSetting("purge_interval_secs"));
        }
        if self.max_body_bytes < 1024 {
            return Err(ValidationError::InvalidIngestSetting("max_body_bytes"));
        }
        if self.max_list_limit == 0 || self.max_list_limit > 500 {
            return Err(ValidationError::InvalidIngestSetting("max_list_limit"));
        }
        Ok(())
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            idempotency_backend: IdempotencyBackend::default(),
            idempotency_ttl_secs: default_idempotency_ttl(),
            reservation_lease_secs: default_reservation_lease(),
            signature_tolerance_secs: default_signature_tolerance(),
            purge_interval_secs: default_purge_interval(),
            max_body_bytes: default_max_body_bytes(),
            max_list_limit: default_max_list_limit(),
        }
    }
}

fn default_idempotency_ttl() -> u64 {
    86_400
}

fn default_reservation_lease() -> u64 {
    60
}

fn default_signature_tolerance() -> i64 {
    300
}

fn default_purge_interval() -> u64 {
    3_600
}

fn default_max_body_bytes() -> usize {
    65_536
}

fn default_max_list_limit() -> u32 {
    500
}
