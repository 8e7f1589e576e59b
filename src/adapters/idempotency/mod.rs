//! Idempotency store adapters.
//!
//! ## Available Adapters
//!
//! - `InMemoryIdempotencyStore` - tests and single-process runs
//! - `RedisIdempotencyStore` - shared cache for multi-server deployments
//!
//! The PostgreSQL store lives with the other SQL adapters in
//! [`crate::adapters::postgres`].

mod in_memory;
mod redis;

pub use in_memory::InMemoryIdempotencyStore;
pub use self::redis::RedisIdempotencyStore;
