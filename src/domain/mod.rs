//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, money, timestamps, errors)
//! - `publisher` - Credentials, request signatures, auth errors
//! - `ingest` - Event validation, typed events, receipts
//! - `metrics` - ASV, A2AR and ACI tiers
//! - `billing` - Wallets, ledger lines, settlement decisions
//! - `rollup` - Daily attention counters and window summaries

pub mod billing;
pub mod foundation;
pub mod ingest;
pub mod metrics;
pub mod publisher;
pub mod rollup;
