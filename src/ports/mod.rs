//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Request Ports
//!
//! - `IdempotencyStore` - Replay cache keyed by caller-chosen keys
//! - `CredentialStore` - Publisher credential lookup and usage counters
//!
//! ## Persistence Ports
//!
//! - `ReceiptRepository` - Event receipts and impression correlation
//! - `CampaignDirectory` - Campaign billing terms
//! - `BillingLedger` - Wallets, ledger lines, settlement
//! - `RollupStore` - Daily attention counters

mod billing_ledger;
mod campaign_directory;
mod credential_store;
mod idempotency_store;
mod receipt_repository;
mod rollup_store;

pub use billing_ledger::BillingLedger;
pub use campaign_directory::CampaignDirectory;
pub use credential_store::CredentialStore;
pub use idempotency_store::{CachedResponse, IdempotencyStore, Reservation};
pub use receipt_repository::{InsertOutcome, ReceiptRepository};
pub use rollup_store::RollupStore;
