//! Ingest module - event validation, typed events and receipts.

mod errors;
mod event;
mod receipt;
mod validator;

pub use errors::IngestError;
pub use event::{ConversionEvent, ConversionResult, EventType, ImpressionEvent, IngestEvent};
pub use receipt::{ConversionReceipt, EventReceipt, ImpressionReceipt, ReceiptFilter};
pub use validator::{idempotency_key_hint, publisher_hint, validate_event};
