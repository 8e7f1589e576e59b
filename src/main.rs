//! attention-ingest server binary.

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use attention_ingest::adapters::http::{build_app, IngestAppState};
use attention_ingest::adapters::idempotency::{InMemoryIdempotencyStore, RedisIdempotencyStore};
use attention_ingest::adapters::postgres::{
    run_migrations, PostgresBillingLedger, PostgresCampaignDirectory, PostgresCredentialStore,
    PostgresIdempotencyStore, PostgresReceiptRepository, PostgresRollupStore,
};
use attention_ingest::config::{AppConfig, ConfigError, IdempotencyBackend, LogFormat};
use attention_ingest::domain::foundation::{DomainError, Timestamp};
use attention_ingest::ports::IdempotencyStore;

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Redis connection failed: {0}")]
    Redis(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    config.validate().map_err(ConfigError::from)?;

    init_tracing(&config);

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    if config.database.run_migrations {
        run_migrations(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let idempotency_store = idempotency_store(&config, &pool).await?;
    spawn_purge_task(idempotency_store.clone(), config.ingest.purge_interval());

    let state = IngestAppState {
        credential_store: Arc::new(PostgresCredentialStore::new(pool.clone())),
        idempotency_store,
        receipts: Arc::new(PostgresReceiptRepository::new(pool.clone())),
        campaigns: Arc::new(PostgresCampaignDirectory::new(pool.clone())),
        ledger: Arc::new(PostgresBillingLedger::new(pool.clone())),
        rollups: Arc::new(PostgresRollupStore::new(pool)),
        settings: config.ingest.settings(),
    };

    let app = build_app(
        state,
        config.server.request_timeout(),
        &config.server.cors_origins_list(),
    );

    let addr = config.server.socket_addr().map_err(ConfigError::from)?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        backend = ?config.ingest.idempotency_backend,
        "attention-ingest listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("attention-ingest stopped");
    Ok(())
}

/// `RUST_LOG` overrides `server.log_level`.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.server.log_format() {
        LogFormat::Json => builder.json().with_current_span(false).init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn idempotency_store(
    config: &AppConfig,
    pool: &sqlx::PgPool,
) -> Result<Arc<dyn IdempotencyStore>, StartupError> {
    match config.ingest.idempotency_backend {
        IdempotencyBackend::Postgres => Ok(Arc::new(PostgresIdempotencyStore::new(pool.clone()))),
        IdempotencyBackend::Memory => {
            tracing::warn!("Using in-memory idempotency store; replays do not survive restarts");
            Ok(Arc::new(InMemoryIdempotencyStore::new()))
        }
        IdempotencyBackend::Redis => {
            let url = config
                .redis
                .url
                .as_deref()
                .ok_or_else(|| StartupError::Redis("redis.url is not set".to_string()))?;
            let client =
                redis::Client::open(url).map_err(|e| StartupError::Redis(e.to_string()))?;
            let conn = tokio::time::timeout(
                config.redis.timeout(),
                client.get_multiplexed_async_connection(),
            )
            .await
            .map_err(|_| StartupError::Redis("timed out".to_string()))?
            .map_err(|e| StartupError::Redis(e.to_string()))?;

            Ok(Arc::new(
                RedisIdempotencyStore::new(conn).with_prefix(config.redis.key_prefix.clone()),
            ))
        }
    }
}

/// Sweeps expired idempotency entries until the process exits.
fn spawn_purge_task(store: Arc<dyn IdempotencyStore>, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match store.purge_expired(Timestamp::now()).await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Purged expired idempotency entries"),
                Err(e) => tracing::warn!(error = %e, "Idempotency purge failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
