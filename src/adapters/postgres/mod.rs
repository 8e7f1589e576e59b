//! PostgreSQL adapters.
//!
//! Schema lives in `migrations/`; `run_migrations` applies it at startup when
//! `database.run_migrations` is enabled.

mod billing_ledger;
mod campaign_directory;
mod credential_store;
mod idempotency_store;
mod receipt_repository;
mod rollup_store;

pub use billing_ledger::PostgresBillingLedger;
pub use campaign_directory::PostgresCampaignDirectory;
pub use credential_store::PostgresCredentialStore;
pub use idempotency_store::PostgresIdempotencyStore;
pub use receipt_repository::PostgresReceiptRepository;
pub use rollup_store::PostgresRollupStore;

use sqlx::PgPool;

use crate::domain::foundation::DomainError;

/// Applies pending schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::database("Failed to run migrations", e))
}
