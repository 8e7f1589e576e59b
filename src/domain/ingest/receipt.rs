//! Persisted receipts for accepted events.

use serde::Serialize;

use super::event::{ConversionEvent, ConversionResult, EventType, ImpressionEvent};
use crate::domain::billing::BillingStatus;
use crate::domain::foundation::{
    CampaignId, EventId, OpportunityId, PublisherId, ReceiptId, Timestamp,
};
use crate::domain::metrics::ScanVelocity;

/// A stored pause impression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpressionReceipt {
    pub id: ReceiptId,
    pub event_id: EventId,
    pub publisher_id: PublisherId,
    pub opportunity_id: OpportunityId,
    pub event_time: Timestamp,
    pub received_at: Timestamp,
    pub campaign_id: CampaignId,
    pub creative_id: Option<String>,
    pub program_id: Option<String>,
    pub qr_displayed_at: Option<Timestamp>,
    /// Set once a conversion is correlated to this impression.
    pub matched_conversion_id: Option<ReceiptId>,
    pub billing_status: BillingStatus,
    pub payload: serde_json::Value,
}

impl ImpressionReceipt {
    pub fn record(publisher_id: PublisherId, event: ImpressionEvent, received_at: Timestamp) -> Self {
        Self {
            id: ReceiptId::new(),
            event_id: event.event_id,
            publisher_id,
            opportunity_id: event.opportunity_id,
            event_time: event.event_time,
            received_at,
            campaign_id: event.campaign_id,
            creative_id: event.creative_id,
            program_id: event.program_id,
            qr_displayed_at: event.qr_displayed_at,
            matched_conversion_id: None,
            billing_status: BillingStatus::Pending,
            payload: event.payload,
        }
    }
}

/// A stored conversion. Only conversions that matched an impression are kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReceipt {
    pub id: ReceiptId,
    pub event_id: EventId,
    pub publisher_id: PublisherId,
    pub opportunity_id: OpportunityId,
    pub event_time: Timestamp,
    pub received_at: Timestamp,
    pub result: ConversionResult,
    pub matched_pause_id: ReceiptId,
    pub asv: ScanVelocity,
    pub billing_status: BillingStatus,
    pub payload: serde_json::Value,
}

impl ConversionReceipt {
    /// Correlates `event` with its impression and measures scan velocity.
    ///
    /// A failed scan starts out `non_billable`.
    pub fn matched(
        publisher_id: PublisherId,
        event: ConversionEvent,
        impression: &ImpressionReceipt,
        received_at: Timestamp,
    ) -> Self {
        let asv = ScanVelocity::measure(
            impression.qr_displayed_at,
            impression.event_time,
            event.event_time,
        );
        let billing_status = if event.result.is_success() {
            BillingStatus::Pending
        } else {
            BillingStatus::NonBillable
        };

        Self {
            id: ReceiptId::new(),
            event_id: event.event_id,
            publisher_id,
            opportunity_id: event.opportunity_id,
            event_time: event.event_time,
            received_at,
            result: event.result,
            matched_pause_id: impression.id,
            asv,
            billing_status,
            payload: event.payload,
        }
    }
}

/// Either kind of stored receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventReceipt {
    #[serde(rename = "pause_impression")]
    Impression(ImpressionReceipt),
    #[serde(rename = "qr_conversion")]
    Conversion(ConversionReceipt),
}

impl EventReceipt {
    pub fn id(&self) -> ReceiptId {
        match self {
            EventReceipt::Impression(r) => r.id,
            EventReceipt::Conversion(r) => r.id,
        }
    }

    pub fn event_id(&self) -> &EventId {
        match self {
            EventReceipt::Impression(r) => &r.event_id,
            EventReceipt::Conversion(r) => &r.event_id,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self {
            EventReceipt::Impression(_) => EventType::PauseImpression,
            EventReceipt::Conversion(_) => EventType::QrConversion,
        }
    }

    pub fn publisher_id(&self) -> &PublisherId {
        match self {
            EventReceipt::Impression(r) => &r.publisher_id,
            EventReceipt::Conversion(r) => &r.publisher_id,
        }
    }

    pub fn event_time(&self) -> Timestamp {
        match self {
            EventReceipt::Impression(r) => r.event_time,
            EventReceipt::Conversion(r) => r.event_time,
        }
    }

    pub fn billing_status(&self) -> BillingStatus {
        match self {
            EventReceipt::Impression(r) => r.billing_status,
            EventReceipt::Conversion(r) => r.billing_status,
        }
    }
}

/// Listing filter for a publisher's receipts. Results are newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptFilter {
    pub publisher_id: PublisherId,
    pub event_type: Option<EventType>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: u32,
}

impl ReceiptFilter {
    pub fn for_publisher(publisher_id: PublisherId, limit: u32) -> Self {
        Self {
            publisher_id,
            event_type: None,
            from: None,
            to: None,
            limit,
        }
    }

    /// True when `receipt` falls inside this filter, ignoring the limit.
    pub fn matches(&self, receipt: &EventReceipt) -> bool {
        receipt.publisher_id() == &self.publisher_id
            && self.event_type.map_or(true, |t| receipt.event_type() == t)
            && self.from.map_or(true, |from| receipt.event_time() >= from)
            && self.to.map_or(true, |to| receipt.event_time() <= to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::AsvTier;
    use serde_json::json;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse_rfc3339(s).unwrap()
    }

    fn publisher() -> PublisherId {
        PublisherId::new("pub_acme").unwrap()
    }

    fn impression(qr_at: Option<&str>) -> ImpressionReceipt {
        ImpressionReceipt::record(
            publisher(),
            ImpressionEvent {
                event_id: EventId::new("evt-imp").unwrap(),
                event_time: ts("2026-05-01T10:00:00Z"),
                opportunity_id: OpportunityId::new("opp-1").unwrap(),
                campaign_id: CampaignId::new("cmp-1").unwrap(),
                creative_id: None,
                program_id: Some("prog-7".into()),
                qr_displayed_at: qr_at.map(ts),
                payload: json!({}),
            },
            Timestamp::now(),
        )
    }

    fn conversion(at: &str, result: ConversionResult) -> ConversionEvent {
        ConversionEvent {
            event_id: EventId::new("evt-conv").unwrap(),
            event_time: ts(at),
            opportunity_id: OpportunityId::new("opp-1").unwrap(),
            result,
            payload: json!({}),
        }
    }

    #[test]
    fn new_impression_is_pending_and_unmatched() {
        let imp = impression(None);
        assert_eq!(imp.billing_status, BillingStatus::Pending);
        assert!(imp.matched_conversion_id.is_none());
    }

    #[test]
    fn matched_conversion_points_back_and_measures_asv() {
        let imp = impression(Some("2026-05-01T10:00:05Z"));
        let conv = ConversionReceipt::matched(
            publisher(),
            conversion("2026-05-01T10:00:12Z", ConversionResult::Success),
            &imp,
            Timestamp::now(),
        );

        assert_eq!(conv.matched_pause_id, imp.id);
        assert_eq!(conv.asv.seconds, 7.0);
        assert_eq!(conv.asv.tier, AsvTier::Strong);
        assert_eq!(conv.billing_status, BillingStatus::Pending);
    }

    #[test]
    fn failed_conversion_starts_non_billable() {
        let imp = impression(None);
        let conv = ConversionReceipt::matched(
            publisher(),
            conversion("2026-05-01T10:00:03Z", ConversionResult::Failure),
            &imp,
            Timestamp::now(),
        );
        assert_eq!(conv.billing_status, BillingStatus::NonBillable);
    }

    #[test]
    fn conversion_before_display_is_not_applicable() {
        let imp = impression(Some("2026-05-01T10:00:30Z"));
        let conv = ConversionReceipt::matched(
            publisher(),
            conversion("2026-05-01T10:00:10Z", ConversionResult::Success),
            &imp,
            Timestamp::now(),
        );
        assert_eq!(conv.asv.tier, AsvTier::NotApplicable);
    }

    #[test]
    fn filter_matches_kind_and_window() {
        let receipt = EventReceipt::Impression(impression(None));
        let mut filter = ReceiptFilter::for_publisher(publisher(), 100);
        assert!(filter.matches(&receipt));

        filter.event_type = Some(EventType::QrConversion);
        assert!(!filter.matches(&receipt));

        filter.event_type = Some(EventType::PauseImpression);
        filter.from = Some(ts("2026-05-01T11:00:00Z"));
        assert!(!filter.matches(&receipt));

        filter.from = Some(ts("2026-05-01T09:00:00Z"));
        filter.to = Some(ts("2026-05-01T10:00:00Z"));
        assert!(filter.matches(&receipt));
    }

    #[test]
    fn filter_rejects_other_publishers() {
        let receipt = EventReceipt::Impression(impression(None));
        let filter = ReceiptFilter::for_publisher(PublisherId::new("pub_other").unwrap(), 10);
        assert!(!filter.matches(&receipt));
    }

    #[test]
    fn receipt_serializes_with_kind_tag() {
        let receipt = EventReceipt::Impression(impression(None));
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["event_type"], "pause_impression");
        assert_eq!(json["billing_status"], "pending");
    }
}
