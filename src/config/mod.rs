//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `ATTENTION_INGEST` prefix
//! and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use attention_ingest::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod ingest;
mod redis;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use ingest::{IdempotencyBackend, IngestConfig};
pub use self::redis::RedisConfig;
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Bind address, environment, logging, timeouts, CORS
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL connection
    pub database: DatabaseConfig,

    /// Redis connection, for the Redis idempotency backend
    #[serde(default)]
    pub redis: RedisConfig,

    /// Idempotency, signature and listing settings
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads variables with the `ATTENTION_INGEST` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `ATTENTION_INGEST__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `ATTENTION_INGEST__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or a value
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ATTENTION_INGEST")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate every section, then the rules that span sections.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.ingest.validate()?;

        // A request still running when its lease lapses could be processed twice.
        if self.server.request_timeout_secs >= self.ingest.reservation_lease_secs {
            return Err(ValidationError::TimeoutNotBelowLease);
        }

        match self.ingest.idempotency_backend {
            IdempotencyBackend::Redis if self.redis.url.is_none() => {
                Err(ValidationError::RedisBackendWithoutUrl)
            }
            IdempotencyBackend::Memory if self.is_production() => {
                Err(ValidationError::MemoryBackendInProduction)
            }
            _ => Ok(()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "ATTENTION_INGEST__DATABASE__URL",
        "ATTENTION_INGEST__REDIS__URL",
        "ATTENTION_INGEST__SERVER__PORT",
        "ATTENTION_INGEST__SERVER__ENVIRONMENT",
        "ATTENTION_INGEST__INGEST__IDEMPOTENCY_BACKEND",
        "ATTENTION_INGEST__INGEST__RESERVATION_LEASE_SECS",
        "ATTENTION_INGEST__SERVER__REQUEST_TIMEOUT_SECS",
    ];

    fn set_minimal_env() {
        env::set_var(
            "ATTENTION_INGEST__DATABASE__URL",
            "postgresql://test@localhost/test",
        );
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn load_with(extra: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        set_minimal_env();
        for (key, value) in extra {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).unwrap();

        assert_eq!(config.database.url, "postgresql://test@localhost/test");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ingest.idempotency_backend, IdempotencyBackend::Postgres);
        assert!(config.redis.url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("ATTENTION_INGEST__SERVER__PORT", "3000"),
            ("ATTENTION_INGEST__INGEST__RESERVATION_LEASE_SECS", "15"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.ingest.reservation_lease_secs, 15);
    }

    #[test]
    fn test_timeout_must_stay_below_lease() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("ATTENTION_INGEST__SERVER__REQUEST_TIMEOUT_SECS", "60"),
            ("ATTENTION_INGEST__INGEST__RESERVATION_LEASE_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(config.validate(), Err(ValidationError::TimeoutNotBelowLease));

        let config = load_with(&[
            ("ATTENTION_INGEST__SERVER__REQUEST_TIMEOUT_SECS", "59"),
            ("ATTENTION_INGEST__INGEST__RESERVATION_LEASE_SECS", "60"),
        ])
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_backend_requires_url() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[("ATTENTION_INGEST__INGEST__IDEMPOTENCY_BACKEND", "redis")])
            .unwrap();
        assert_eq!(config.validate(), Err(ValidationError::RedisBackendWithoutUrl));
    }

    #[test]
    fn test_memory_backend_rejected_in_production() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("ATTENTION_INGEST__INGEST__IDEMPOTENCY_BACKEND", "memory"),
            ("ATTENTION_INGEST__SERVER__ENVIRONMENT", "production"),
        ])
        .unwrap();

        assert!(config.is_production());
        assert_eq!(
            config.validate(),
            Err(ValidationError::MemoryBackendInProduction)
        );
    }
}
