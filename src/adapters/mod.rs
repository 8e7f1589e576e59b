//! Adapters - Implementations of port interfaces.
//!
//! - `http` - axum routes, middleware and tower layers
//! - `idempotency` - Redis and in-memory replay caches
//! - `memory` - In-memory implementations of the persistence ports
//! - `postgres` - sqlx implementations of every port

pub mod http;
pub mod idempotency;
pub mod memory;
pub mod postgres;
