//! ReceiptRepository port - event receipts and correlation.
//!
//! # Design
//!
//! - `event_id` is unique across all receipts; a second insert reports the
//!   existing receipt instead of failing
//! - the canonical impression for an opportunity is the most recently stored
//!   one for that publisher
//! - storing a matched conversion and linking its impression happen in one
//!   transaction

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventId, OpportunityId, PublisherId, ReceiptId};
use crate::domain::ingest::{ConversionReceipt, EventReceipt, ImpressionReceipt, ReceiptFilter};

/// Result of an insert keyed by `event_id`.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// A receipt with this `event_id` already exists.
    Duplicate(EventReceipt),
}

#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    async fn find_by_id(&self, id: &ReceiptId) -> Result<Option<EventReceipt>, DomainError>;

    async fn find_by_event_id(&self, event_id: &EventId)
        -> Result<Option<EventReceipt>, DomainError>;

    /// Stores an impression unless its `event_id` is already recorded.
    async fn insert_impression(
        &self,
        receipt: &ImpressionReceipt,
    ) -> Result<InsertOutcome, DomainError>;

    /// Most recently stored impression for the opportunity, if any.
    async fn find_canonical_impression(
        &self,
        publisher_id: &PublisherId,
        opportunity_id: &OpportunityId,
    ) -> Result<Option<ImpressionReceipt>, DomainError>;

    /// Stores a conversion and sets `matched_conversion_id` on the impression
    /// it points to, atomically.
    ///
    /// # Errors
    ///
    /// - `ReceiptNotFound` if the referenced impression no longer exists
    /// - `DatabaseError` on persistence failure
    async fn record_matched_conversion(
        &self,
        receipt: &ConversionReceipt,
    ) -> Result<InsertOutcome, DomainError>;

    /// Receipts matching `filter`, newest event time first, at most
    /// `filter.limit` rows.
    async fn list(&self, filter: &ReceiptFilter) -> Result<Vec<EventReceipt>, DomainError>;
}
