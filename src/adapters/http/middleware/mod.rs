//! HTTP middleware for axum.
//!
//! - `auth` - Publisher authentication middleware and extractor

pub mod auth;

pub use auth::{publisher_auth_middleware, PublisherRejection, RequirePublisher};
