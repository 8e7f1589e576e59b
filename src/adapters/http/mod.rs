//! HTTP adapters - REST API implementations.

pub mod app;
pub mod ingest;
pub mod middleware;

pub use app::build_app;
pub use ingest::{ingest_router, IngestAppState, IngestSettings};
