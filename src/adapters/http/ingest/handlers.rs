//! HTTP handlers for the ingestion API.
//!
//! These handlers connect axum routes to the ingest command and query
//! handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Json, Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::adapters::http::middleware::RequirePublisher;
use crate::application::handlers::ingest::{
    AuthenticatePublisherHandler, GetAttentionMetricsHandler, GetAttentionMetricsQuery,
    GuardDecision, IdempotencyGuard, IdempotencyKey, IngestEventCommand, IngestEventHandler,
    ListReceiptsHandler, ListReceiptsQuery,
};
use crate::domain::foundation::Timestamp;
use crate::domain::ingest::{idempotency_key_hint, validate_event, IngestError};
use crate::domain::publisher::RequestSignatureVerifier;
use crate::ports::{
    BillingLedger, CachedResponse, CampaignDirectory, CredentialStore, IdempotencyStore,
    ReceiptRepository, RollupStore,
};

use super::dto::{
    AttentionMetricsParams, AttentionMetricsResponse, ErrorResponse, HealthResponse,
    ListReceiptsParams, ReceiptListResponse,
};

/// Header carrying the caller's idempotency key.
pub const IDEMPOTENCY_KEY: &str = "idempotency-key";
/// Set on responses served from the replay cache.
pub static IDEMPOTENT_REPLAYED: HeaderName = HeaderName::from_static("idempotent-replayed");

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Request-path tunables.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub idempotency_ttl: Duration,
    pub reservation_lease: Duration,
    pub signature_tolerance_secs: i64,
    pub max_body_bytes: usize,
    pub max_list_limit: u32,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            idempotency_ttl: Duration::from_secs(86_400),
            reservation_lease: Duration::from_secs(60),
            signature_tolerance_secs: 300,
            max_body_bytes: 65_536,
            max_list_limit: 500,
        }
    }
}

/// Shared state for the ingestion routes.
///
/// Cloned per request; every dependency is behind an `Arc`.
#[derive(Clone)]
pub struct IngestAppState {
    pub credential_store: Arc<dyn CredentialStore>,
    pub idempotency_store: Arc<dyn IdempotencyStore>,
    pub receipts: Arc<dyn ReceiptRepository>,
    pub campaigns: Arc<dyn CampaignDirectory>,
    pub ledger: Arc<dyn BillingLedger>,
    pub rollups: Arc<dyn RollupStore>,
    pub settings: IngestSettings,
}

impl IngestAppState {
    /// Create handlers on demand from the shared state.
    pub fn authenticate_handler(&self) -> AuthenticatePublisherHandler {
        AuthenticatePublisherHandler::new(
            self.credential_store.clone(),
            RequestSignatureVerifier::new(self.settings.signature_tolerance_secs),
        )
    }

    pub fn idempotency_guard(&self) -> IdempotencyGuard {
        IdempotencyGuard::new(
            self.idempotency_store.clone(),
            self.settings.idempotency_ttl,
            self.settings.reservation_lease,
        )
    }

    pub fn ingest_event_handler(&self) -> IngestEventHandler {
        IngestEventHandler::new(
            self.receipts.clone(),
            self.campaigns.clone(),
            self.ledger.clone(),
            self.rollups.clone(),
        )
    }

    pub fn list_receipts_handler(&self) -> ListReceiptsHandler {
        ListReceiptsHandler::new(self.receipts.clone(), self.settings.max_list_limit)
    }

    pub fn attention_metrics_handler(&self) -> GetAttentionMetricsHandler {
        GetAttentionMetricsHandler::new(self.rollups.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Mapping
// ════════════════════════════════════════════════════════════════════════════════

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        if let IngestError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Ingestion failed");
        }
        (self.status_code(), Json(ErrorResponse::from(&self))).into_response()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /v1/events - Ingest one impression or conversion.
///
/// Requests are validated before the key is reserved, so a rejected body
/// never holds it. A key seen before returns its cached status and body
/// byte-for-byte. Only successful responses are cached; any error frees the
/// key.
pub async fn ingest_event(
    State(state): State<IngestAppState>,
    RequirePublisher(publisher): RequirePublisher,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, IngestError> {
    let payload: serde_json::Value =
        serde_json::from_slice(&body).map_err(|e| IngestError::InvalidJson(e.to_string()))?;

    let raw_key = headers
        .get(IDEMPOTENCY_KEY)
        .and_then(|h| h.to_str().ok())
        .or_else(|| idempotency_key_hint(&payload));
    let key = IdempotencyKey::scoped(&publisher.publisher_id, raw_key)?;
    let event = validate_event(&payload)?;

    let guard = state.idempotency_guard();
    if let GuardDecision::Replay(cached) = guard.begin(&key).await? {
        return Ok(replayed(cached));
    }

    let handler = state.ingest_event_handler();
    let command = IngestEventCommand {
        publisher_id: publisher.publisher_id,
        event,
        received_at: Timestamp::now(),
    };

    // Past the guard the pipeline must finish even if the client or a
    // timeout drops this future.
    let pipeline = tokio::spawn(async move {
        let outcome = process_event(&handler, command).await;
        match &outcome {
            Ok(response) => guard.complete(&key, response).await,
            Err(_) => guard.abandon(&key).await,
        }
        outcome
    });

    let response = pipeline
        .await
        .map_err(|e| IngestError::Internal(format!("Ingestion task failed: {}", e)))??;
    Ok(json_body(StatusCode::OK, response.body))
}

async fn process_event(
    handler: &IngestEventHandler,
    command: IngestEventCommand,
) -> Result<CachedResponse, IngestError> {
    let result = handler.handle(command).await?;

    let body = serde_json::to_string(&result)
        .map_err(|e| IngestError::Internal(format!("Failed to encode response: {}", e)))?;
    Ok(CachedResponse::new(StatusCode::OK.as_u16(), body))
}

/// GET /v1/events - List the caller's receipts, newest first.
pub async fn list_receipts(
    State(state): State<IngestAppState>,
    RequirePublisher(publisher): RequirePublisher,
    params: Result<Query<ListReceiptsParams>, QueryRejection>,
) -> Result<Json<ReceiptListResponse>, IngestError> {
    let Query(params) = params.map_err(|e| IngestError::invalid_field("query", e.body_text()))?;

    let receipts = state
        .list_receipts_handler()
        .handle(ListReceiptsQuery {
            publisher_id: publisher.publisher_id,
            event_type: params.event_type,
            from: params.from,
            to: params.to,
            limit: params.limit,
        })
        .await?;

    Ok(Json(receipts.into()))
}

/// GET /v1/metrics/attention - A2AR, ASV and ACI over a date window.
pub async fn get_attention_metrics(
    State(state): State<IngestAppState>,
    RequirePublisher(publisher): RequirePublisher,
    params: Result<Query<AttentionMetricsParams>, QueryRejection>,
) -> Result<Json<AttentionMetricsResponse>, IngestError> {
    let Query(params) = params.map_err(|e| IngestError::invalid_field("query", e.body_text()))?;

    let metrics = state
        .attention_metrics_handler()
        .handle(GetAttentionMetricsQuery {
            publisher_id: publisher.publisher_id.clone(),
            from: params.from,
            to: params.to,
            program_id: params.program_id,
        })
        .await?;

    Ok(Json(AttentionMetricsResponse {
        publisher_id: publisher.publisher_id,
        metrics,
    }))
}

/// GET /health - Liveness probe; unauthenticated.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn json_body(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}

fn replayed(cached: CachedResponse) -> Response {
    let status = StatusCode::from_u16(cached.status_code).unwrap_or(StatusCode::OK);
    let mut response = json_body(status, cached.body);
    response
        .headers_mut()
        .insert(IDEMPOTENT_REPLAYED.clone(), HeaderValue::from_static("true"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_status_and_code() {
        let response = IngestError::PauseNotFound("opp-1".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = IngestError::IdempotencyKeyInUse.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = IngestError::Internal("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn replay_keeps_status_and_marks_header() {
        let response = replayed(CachedResponse::new(200, r#"{"status":"accepted"}"#));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[&IDEMPOTENT_REPLAYED], "true");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
    }

    #[test]
    fn default_settings_match_documented_defaults() {
        let settings = IngestSettings::default();
        assert_eq!(settings.idempotency_ttl, Duration::from_secs(86_400));
        assert_eq!(settings.reservation_lease, Duration::from_secs(60));
        assert_eq!(settings.signature_tolerance_secs, 300);
        assert_eq!(settings.max_list_limit, 500);
    }
}
