//! Ingestion error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | MissingIdempotencyKey, InvalidJson, InvalidEventType, MissingRequiredFields, MissingOpportunityId, InvalidField | 400 |
//! | Authentication | 401 |
//! | PauseNotFound | 404 |
//! | IdempotencyKeyInUse | 409 |
//! | Internal | 500 |

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ValidationError};
use crate::domain::publisher::AuthError;

/// Errors surfaced by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("Idempotency key is required")]
    MissingIdempotencyKey,

    #[error("A request with this idempotency key is still being processed")]
    IdempotencyKeyInUse,

    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Missing or unknown event_type")]
    InvalidEventType,

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),

    #[error("session.opportunity_id is required")]
    MissingOpportunityId,

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidField { field: String, reason: String },

    #[error(transparent)]
    Authentication(#[from] AuthError),

    #[error("No pause impression found for opportunity '{0}'")]
    PauseNotFound(String),

    #[error("Processing failed: {0}")]
    Internal(String),
}

impl IngestError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        IngestError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable code placed in the `error` field of the response.
    pub fn error_code(&self) -> &'static str {
        match self {
            IngestError::MissingIdempotencyKey => "missing_idempotency_key",
            IngestError::IdempotencyKeyInUse => "idempotency_key_in_use",
            IngestError::InvalidJson(_) => "invalid_json",
            IngestError::InvalidEventType => "invalid_event_type",
            IngestError::MissingRequiredFields(_) => "missing_required_fields",
            IngestError::MissingOpportunityId => "missing_opportunity_id",
            IngestError::InvalidField { .. } => "invalid_field_format",
            IngestError::Authentication(auth) => auth.error_code(),
            IngestError::PauseNotFound(_) => "pause_not_found",
            IngestError::Internal(_) => "processing_failed",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IngestError::MissingIdempotencyKey
            | IngestError::InvalidJson(_)
            | IngestError::InvalidEventType
            | IngestError::MissingRequiredFields(_)
            | IngestError::MissingOpportunityId
            | IngestError::InvalidField { .. } => StatusCode::BAD_REQUEST,
            IngestError::Authentication(_) => StatusCode::UNAUTHORIZED,
            IngestError::PauseNotFound(_) => StatusCode::NOT_FOUND,
            IngestError::IdempotencyKeyInUse => StatusCode::CONFLICT,
            IngestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the publisher may resubmit the same key and expect progress.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IngestError::PauseNotFound(_)
                | IngestError::IdempotencyKeyInUse
                | IngestError::Internal(_)
        )
    }
}

impl From<DomainError> for IngestError {
    fn from(err: DomainError) -> Self {
        IngestError::Internal(err.to_string())
    }
}

impl From<ValidationError> for IngestError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::EmptyField { field } if field == "opportunity_id" => {
                IngestError::MissingOpportunityId
            }
            other => IngestError::invalid_field(other.field().to_string(), other.to_string()),
        }
    }
}
