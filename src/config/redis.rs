//! Redis connection for the Redis idempotency backend

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,

    /// Connect timeout, seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Namespace for idempotency keys (`<prefix>:<key>`)
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl RedisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let scheme_ok = |url: &str| ["redis://", "rediss://"].iter().any(|s| url.starts_with(s));
        match &self.url {
            Some(url) if !scheme_ok(url) => Err(ValidationError::InvalidRedisUrl),
            _ if self.key_prefix.trim().is_empty() => {
                Err(ValidationError::MissingRequired("REDIS_KEY_PREFIX"))
            }
            _ => Ok(()),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_timeout() -> u64 {
    5
}

fn default_key_prefix() -> String {
    "idempotency".to_string()
}
