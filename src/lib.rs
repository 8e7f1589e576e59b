//! Attention Ingest - pause-moment impression and QR conversion ingestion.
//!
//! Publishers report when an ad was shown on a paused screen and when a
//! viewer scanned its QR code. Each conversion is correlated with its
//! impression, scored for attention, and billed against the advertiser's
//! prepaid wallet exactly once.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
