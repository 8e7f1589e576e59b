//! HTTP adapter for the ingestion API.
//!
//! - `POST /v1/events` - Ingest a pause impression or QR conversion
//! - `GET /v1/events` - List the caller's receipts
//! - `GET /v1/metrics/attention` - Window summary of A2AR, ASV and ACI
//! - `GET /health` - Liveness probe

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{IngestAppState, IngestSettings, IDEMPOTENCY_KEY, IDEMPOTENT_REPLAYED};
pub use routes::{ingest_router, publisher_routes};
