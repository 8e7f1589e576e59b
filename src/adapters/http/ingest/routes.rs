//! Axum router configuration for the ingestion endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use super::handlers::{get_attention_metrics, health, ingest_event, list_receipts, IngestAppState};
use crate::adapters::http::middleware::publisher_auth_middleware;

/// Routes that require an authenticated publisher.
///
/// # Routes
/// - `POST /v1/events` - Ingest an impression or conversion
/// - `GET /v1/events` - List the caller's receipts
/// - `GET /v1/metrics/attention` - Attention metrics over a window
pub fn publisher_routes(state: IngestAppState) -> Router<IngestAppState> {
    Router::new()
        .route("/v1/events", post(ingest_event).get(list_receipts))
        .route("/v1/metrics/attention", get(get_attention_metrics))
        .route_layer(middleware::from_fn_with_state(
            state,
            publisher_auth_middleware,
        ))
}

/// The complete ingestion router, including the unauthenticated probe.
pub fn ingest_router(state: IngestAppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(publisher_routes(state.clone()))
        .with_state(state)
}
