//! Ingestion handlers.
//!
//! ## Commands
//! - Authenticating the calling publisher
//! - Guarding a request with its idempotency key
//! - Ingesting an impression or conversion
//!
//! ## Queries
//! - Listing the caller's receipts
//! - Summarizing attention metrics over a window

mod authenticate_publisher;
mod get_attention_metrics;
mod idempotency_guard;
mod ingest_event;
mod list_receipts;

// Commands
pub use authenticate_publisher::{AuthenticatePublisherHandler, RequestCredentials};
pub use idempotency_guard::{GuardDecision, IdempotencyGuard, IdempotencyKey};
pub use ingest_event::{IngestEventCommand, IngestEventHandler, IngestEventResult};

// Queries
pub use get_attention_metrics::{
    GetAttentionMetricsHandler, GetAttentionMetricsQuery, GetAttentionMetricsResult,
    DEFAULT_WINDOW_DAYS,
};
pub use list_receipts::{ListReceiptsHandler, ListReceiptsQuery, DEFAULT_LIST_LIMIT};
