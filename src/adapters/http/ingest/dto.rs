//! HTTP DTOs for the ingestion API.
//!
//! The `POST /v1/events` body is validated as raw JSON by the domain
//! validator, so only the query strings and listing responses live here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::application::handlers::ingest::GetAttentionMetricsResult;
use crate::domain::foundation::{PublisherId, Timestamp};
use crate::domain::ingest::{EventReceipt, EventType, IngestError};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Query string for `GET /v1/events`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListReceiptsParams {
    pub event_type: Option<EventType>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: Option<u32>,
}

/// Query string for `GET /v1/metrics/attention`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttentionMetricsParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub program_id: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptListResponse {
    pub receipts: Vec<EventReceipt>,
    pub count: usize,
}

impl From<Vec<EventReceipt>> for ReceiptListResponse {
    fn from(receipts: Vec<EventReceipt>) -> Self {
        Self {
            count: receipts.len(),
            receipts,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AttentionMetricsResponse {
    pub publisher_id: PublisherId,
    #[serde(flatten)]
    pub metrics: GetAttentionMetricsResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error body: `{ "error": <code>, "required"?: [...], "message"?: "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&IngestError> for ErrorResponse {
    fn from(err: &IngestError) -> Self {
        let (required, message) = match err {
            IngestError::MissingRequiredFields(fields) => (Some(fields.clone()), None),
            // Internal detail stays in the logs.
            IngestError::Internal(_) => (
                None,
                Some("Processing failed; retry with the same idempotency key".to_string()),
            ),
            IngestError::InvalidJson(_)
            | IngestError::InvalidField { .. }
            | IngestError::PauseNotFound(_) => (None, Some(err.to_string())),
            _ => (None, None),
        };

        Self {
            error: err.error_code(),
            required,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_list_required() {
        let err = IngestError::MissingRequiredFields(vec!["ad".into(), "content".into()]);
        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(
            body,
            json!({ "error": "missing_required_fields", "required": ["ad", "content"] })
        );
    }

    #[test]
    fn internal_errors_hide_detail() {
        let err = IngestError::Internal("connection reset by peer".into());
        let body = ErrorResponse::from(&err);
        assert_eq!(body.error, "processing_failed");
        assert!(!body.message.unwrap().contains("connection reset"));
    }

    #[test]
    fn bare_codes_have_no_extras() {
        let body = serde_json::to_value(ErrorResponse::from(&IngestError::IdempotencyKeyInUse))
            .unwrap();
        assert_eq!(body, json!({ "error": "idempotency_key_in_use" }));
    }

    #[test]
    fn list_params_parse_from_query_string() {
        let params: ListReceiptsParams = parse_query(
            "event_type=qr_conversion&limit=10&from=2026-05-01T00:00:00Z",
        );
        assert_eq!(params.event_type, Some(EventType::QrConversion));
        assert_eq!(params.limit, Some(10));
        assert!(params.from.is_some());
        assert!(params.to.is_none());
    }

    fn parse_query(query: &str) -> ListReceiptsParams {
        let uri: axum::http::Uri = format!("/v1/events?{}", query).parse().unwrap();
        axum::extract::Query::<ListReceiptsParams>::try_from_uri(&uri)
            .unwrap()
            .0
    }
}
