//! Publisher authentication middleware and extractor for axum.
//!
//! This module provides:
//! - `publisher_auth_middleware` - Layer that authenticates the request and
//!   injects the publisher into extensions
//! - `RequirePublisher` - Extractor that reads the authenticated publisher
//!
//! # Architecture
//!
//! Signatures cover the raw body, so the middleware buffers the body, hands
//! it to `AuthenticatePublisherHandler` with the proof headers, then
//! re-attaches the same bytes for the route handler.
//!
//! ```text
//! Request → publisher_auth_middleware → injects AuthenticatedPublisher
//!                                          ↓
//!                               Handler → RequirePublisher reads it back
//! ```
//!
//! # Example
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/v1/events", post(ingest_event))
//!     .route_layer(middleware::from_fn_with_state(state.clone(), publisher_auth_middleware))
//!     .with_state(state);
//! ```

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::ingest::IngestAppState;
use crate::application::handlers::ingest::RequestCredentials;
use crate::domain::ingest::publisher_hint;
use crate::domain::publisher::{AuthError, AuthenticatedPublisher};

/// Header naming the publisher for signature authentication.
pub const X_PUBLISHER_ID: &str = "x-publisher-id";
/// Unix-seconds timestamp covered by the signature.
pub const X_TIMESTAMP: &str = "x-timestamp";
/// Hex HMAC-SHA256 of `<timestamp>.<body>`.
pub const X_SIGNATURE: &str = "x-signature";

/// Authenticates every request it wraps.
///
/// 1. Buffers the body, up to `max_body_bytes`
/// 2. Reads the bearer key, or the timestamp, signature and publisher headers
/// 3. Falls back to `publisher.publisher_id` in the body for the publisher
/// 4. On success, injects `AuthenticatedPublisher` and restores the body
/// 5. On failure, answers 401 with the auth error code
pub async fn publisher_auth_middleware(
    State(state): State<IngestAppState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, state.settings.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(_) => return PublisherRejection::PayloadTooLarge.into_response(),
    };

    let proof = credentials_from(&parts.headers, &bytes);

    match state.authenticate_handler().handle(&proof, &bytes).await {
        Ok(publisher) => {
            tracing::debug!(
                publisher_id = %publisher.publisher_id,
                method = ?publisher.method,
                "Publisher authenticated"
            );
            parts.extensions.insert(publisher);
            next.run(Request::from_parts(parts, Body::from(bytes))).await
        }
        Err(e) => e.into_response(),
    }
}

/// Lifts the proof headers out of a request.
fn credentials_from(headers: &HeaderMap, body: &Bytes) -> RequestCredentials {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
    };

    let bearer_token = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);

    let timestamp = text(X_TIMESTAMP);
    let signature = text(X_SIGNATURE);

    // The body is only parsed when a signature needs a publisher to check it.
    let publisher_id = text(X_PUBLISHER_ID).or_else(|| {
        if bearer_token.is_some() || signature.is_none() {
            return None;
        }
        serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| publisher_hint(&v).map(String::from))
    });

    RequestCredentials {
        bearer_token,
        timestamp,
        signature,
        publisher_id,
    }
}

/// Extractor that requires an authenticated publisher.
///
/// Only succeeds behind `publisher_auth_middleware`.
#[derive(Debug, Clone)]
pub struct RequirePublisher(pub AuthenticatedPublisher);

impl<S> axum::extract::FromRequestParts<S> for RequirePublisher
where
    S: Send + Sync,
{
    type Rejection = PublisherRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            parts
                .extensions
                .get::<AuthenticatedPublisher>()
                .cloned()
                .map(RequirePublisher)
                .ok_or(PublisherRejection::Unauthenticated)
        })
    }
}

/// Rejections raised before a request reaches its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublisherRejection {
    /// No publisher was injected for this request.
    Unauthenticated,
    /// The body exceeded the configured limit.
    PayloadTooLarge,
}

impl IntoResponse for PublisherRejection {
    fn into_response(self) -> Response {
        let (status, code) = match self {
            PublisherRejection::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                AuthError::AuthenticationRequired.error_code(),
            ),
            PublisherRejection::PayloadTooLarge => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large")
            }
        };

        (status, Json(serde_json::json!({ "error": code }))).into_response()
    }
}
