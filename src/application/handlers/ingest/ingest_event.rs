//! IngestEventHandler - persists a validated event and drives correlation,
//! billing and rollups.
//!
//! # Flow
//!
//! ```text
//! impression ─▶ store receipt ─▶ rollup (+1 opportunity)
//!
//! conversion ─▶ duplicate? ──yes──▶ re-settle if still pending
//!                  │no
//!                  ▼
//!            canonical impression ──none──▶ pause_not_found
//!                  │
//!                  ▼
//!            store + link ─▶ settle ─▶ rollup (+1 scan, +1 verified if billed)
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::domain::billing::{BillingStatus, SettlementOutcome, SettlementRequest};
use crate::domain::foundation::{AdvertiserId, PublisherId, ReceiptId, Timestamp};
use crate::domain::ingest::{
    ConversionEvent, ConversionReceipt, EventReceipt, ImpressionEvent, ImpressionReceipt,
    IngestError, IngestEvent,
};
use crate::domain::metrics::ScanVelocity;
use crate::domain::rollup::{RollupDelta, RollupKey};
use crate::ports::{BillingLedger, CampaignDirectory, InsertOutcome, ReceiptRepository, RollupStore};

/// Command to ingest one validated event.
#[derive(Debug, Clone)]
pub struct IngestEventCommand {
    pub publisher_id: PublisherId,
    pub event: IngestEvent,
    pub received_at: Timestamp,
}

/// Result of ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestEventResult {
    Accepted {
        receipt_id: ReceiptId,
        ingested_at: Timestamp,
        /// Present for conversions.
        #[serde(skip_serializing_if = "Option::is_none")]
        asv: Option<ScanVelocity>,
        #[serde(skip)]
        billing_status: BillingStatus,
    },
    /// The `event_id` was already recorded; nothing new was stored.
    Duplicate {
        receipt_id: ReceiptId,
        message: String,
    },
}

impl IngestEventResult {
    fn duplicate(existing: &EventReceipt) -> Self {
        IngestEventResult::Duplicate {
            receipt_id: existing.id(),
            message: format!("Event {} was already recorded", existing.event_id()),
        }
    }

    pub fn receipt_id(&self) -> ReceiptId {
        match self {
            IngestEventResult::Accepted { receipt_id, .. }
            | IngestEventResult::Duplicate { receipt_id, .. } => *receipt_id,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestEventResult::Duplicate { .. })
    }
}

pub struct IngestEventHandler {
    receipts: Arc<dyn ReceiptRepository>,
    campaigns: Arc<dyn CampaignDirectory>,
    ledger: Arc<dyn BillingLedger>,
    rollups: Arc<dyn RollupStore>,
}

impl IngestEventHandler {
    pub fn new(
        receipts: Arc<dyn ReceiptRepository>,
        campaigns: Arc<dyn CampaignDirectory>,
        ledger: Arc<dyn BillingLedger>,
        rollups: Arc<dyn RollupStore>,
    ) -> Self {
        Self {
            receipts,
            campaigns,
            ledger,
            rollups,
        }
    }

    pub async fn handle(&self, cmd: IngestEventCommand) -> Result<IngestEventResult, IngestError> {
        match cmd.event {
            IngestEvent::Impression(event) => {
                self.ingest_impression(cmd.publisher_id, event, cmd.received_at)
                    .await
            }
            IngestEvent::Conversion(event) => {
                self.ingest_conversion(cmd.publisher_id, event, cmd.received_at)
                    .await
            }
        }
    }

    async fn ingest_impression(
        &self,
        publisher_id: PublisherId,
        event: ImpressionEvent,
        received_at: Timestamp,
    ) -> Result<IngestEventResult, IngestError> {
        let receipt = ImpressionReceipt::record(publisher_id, event, received_at);

        if let InsertOutcome::Duplicate(existing) = self.receipts.insert_impression(&receipt).await?
        {
            tracing::info!(event_id = %receipt.event_id, receipt_id = %existing.id(), "Duplicate impression");
            return Ok(IngestEventResult::duplicate(&existing));
        }

        tracing::info!(
            publisher_id = %receipt.publisher_id,
            event_id = %receipt.event_id,
            opportunity_id = %receipt.opportunity_id,
            receipt_id = %receipt.id,
            "Pause impression recorded"
        );

        let advertiser = self.advertiser_for(&receipt).await;
        let key = RollupKey::for_event(
            receipt.event_time,
            advertiser,
            receipt.publisher_id.clone(),
            receipt.program_id.clone(),
        );
        self.record_rollup(&key, RollupDelta::Impression).await;

        Ok(IngestEventResult::Accepted {
            receipt_id: receipt.id,
            ingested_at: received_at,
            asv: None,
            billing_status: receipt.billing_status,
        })
    }

    async fn ingest_conversion(
        &self,
        publisher_id: PublisherId,
        event: ConversionEvent,
        received_at: Timestamp,
    ) -> Result<IngestEventResult, IngestError> {
        if let Some(existing) = self.receipts.find_by_event_id(&event.event_id).await? {
            return self.replay_duplicate(existing).await;
        }

        let impression = self
            .receipts
            .find_canonical_impression(&publisher_id, &event.opportunity_id)
            .await?
            .ok_or_else(|| {
                tracing::info!(
                    publisher_id = %publisher_id,
                    event_id = %event.event_id,
                    opportunity_id = %event.opportunity_id,
                    "No pause impression for conversion"
                );
                IngestError::PauseNotFound(event.opportunity_id.to_string())
            })?;

        let receipt = ConversionReceipt::matched(publisher_id, event, &impression, received_at);

        if let InsertOutcome::Duplicate(existing) =
            self.receipts.record_matched_conversion(&receipt).await?
        {
            return self.replay_duplicate(existing).await;
        }

        tracing::info!(
            publisher_id = %receipt.publisher_id,
            event_id = %receipt.event_id,
            opportunity_id = %receipt.opportunity_id,
            receipt_id = %receipt.id,
            matched_pause_id = %impression.id,
            asv_seconds = receipt.asv.seconds,
            "QR conversion matched"
        );

        let (advertiser, settled) = self.settle(&receipt, &impression).await;
        let status = match &settled {
            Ok(Some(outcome)) => outcome.conversion_status(),
            Ok(None) | Err(_) => receipt.billing_status,
        };
        // Only the settle call that charged counts the verified conversion;
        // a concurrent duplicate may have billed it first.
        let billed_here = matches!(&settled, Ok(Some(outcome)) if outcome.is_billed());
        let key = RollupKey::for_event(
            receipt.event_time,
            advertiser,
            receipt.publisher_id.clone(),
            impression.program_id.clone(),
        );
        self.record_rollup(
            &key,
            RollupDelta::conversion(&receipt.asv, billed_here),
        )
        .await;

        settled?;

        Ok(IngestEventResult::Accepted {
            receipt_id: receipt.id,
            ingested_at: received_at,
            asv: Some(receipt.asv),
            billing_status: status,
        })
    }

    /// Resolves the campaign and charges the conversion if it is still
    /// `pending`.
    ///
    /// The advertiser is reported whenever the campaign resolves, so rollups
    /// can be keyed by it even when nothing is charged. `Ok(None)` means no
    /// settlement was attempted; an unknown campaign leaves the conversion
    /// `pending`.
    async fn settle(
        &self,
        conversion: &ConversionReceipt,
        impression: &ImpressionReceipt,
    ) -> (
        Option<AdvertiserId>,
        Result<Option<SettlementOutcome>, IngestError>,
    ) {
        let terms = match self.campaigns.resolve(&impression.campaign_id).await {
            Ok(Some(terms)) => terms,
            Ok(None) => {
                tracing::warn!(
                    receipt_id = %conversion.id,
                    campaign_id = %impression.campaign_id,
                    "Campaign not resolvable; conversion not charged"
                );
                return (None, Ok(None));
            }
            Err(e) => return (None, Err(e.into())),
        };
        let advertiser = Some(terms.advertiser_id);

        if !conversion.billing_status.is_pending() {
            return (advertiser, Ok(None));
        }

        let request = SettlementRequest {
            conversion_receipt_id: conversion.id,
            impression_receipt_id: impression.id,
            publisher_id: conversion.publisher_id.clone(),
            terms,
        };

        let outcome = match self.ledger.settle(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(receipt_id = %conversion.id, error = %e, "Settlement failed");
                return (advertiser, Err(e.into()));
            }
        };

        match &outcome {
            SettlementOutcome::Billed { record, .. } => tracing::info!(
                receipt_id = %conversion.id,
                billing_record_id = %record.id,
                fee = %record.split.fee,
                "Conversion billed"
            ),
            SettlementOutcome::NonBillable(reason) => tracing::info!(
                receipt_id = %conversion.id,
                reason = ?reason,
                "Conversion not billable"
            ),
            SettlementOutcome::AlreadySettled(status) => tracing::debug!(
                receipt_id = %conversion.id,
                status = %status,
                "Conversion already settled"
            ),
        }

        (advertiser, Ok(Some(outcome)))
    }

    /// Answers a repeated `event_id`, finishing settlement of a matched
    /// conversion that an earlier attempt left `pending`.
    async fn replay_duplicate(
        &self,
        existing: EventReceipt,
    ) -> Result<IngestEventResult, IngestError> {
        tracing::info!(
            event_id = %existing.event_id(),
            receipt_id = %existing.id(),
            "Duplicate event"
        );

        if let EventReceipt::Conversion(conversion) = &existing {
            if conversion.billing_status.is_pending() {
                if let Some(EventReceipt::Impression(impression)) =
                    self.receipts.find_by_id(&conversion.matched_pause_id).await?
                {
                    let (advertiser, settled) = self.settle(conversion, &impression).await;
                    if settled?.is_some_and(|outcome| outcome.is_billed()) {
                        let key = RollupKey::for_event(
                            conversion.event_time,
                            advertiser,
                            conversion.publisher_id.clone(),
                            impression.program_id.clone(),
                        );
                        self.record_rollup(&key, RollupDelta::Verified).await;
                    }
                }
            }
        }

        Ok(IngestEventResult::duplicate(&existing))
    }

    async fn advertiser_for(&self, impression: &ImpressionReceipt) -> Option<AdvertiserId> {
        match self.campaigns.resolve(&impression.campaign_id).await {
            Ok(terms) => terms.map(|t| t.advertiser_id),
            Err(e) => {
                tracing::warn!(campaign_id = %impression.campaign_id, error = %e, "Campaign lookup failed");
                None
            }
        }
    }

    /// Rollups are derived data; a failed increment is logged and the event
    /// is still acknowledged.
    async fn record_rollup(&self, key: &RollupKey, delta: RollupDelta) {
        if let Err(e) = self.rollups.record(key, delta).await {
            tracing::error!(
                publisher_id = %key.publisher_id,
                date = %key.date,
                error = %e,
                "Failed to update attention rollup"
            );
        }
    }
}
