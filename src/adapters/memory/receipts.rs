use async_trait::async_trait;

use super::InMemoryIngestStore;
use crate::domain::foundation::{
    DomainError, ErrorCode, EventId, OpportunityId, PublisherId, ReceiptId,
};
use crate::domain::ingest::{ConversionReceipt, EventReceipt, ImpressionReceipt, ReceiptFilter};
use crate::ports::{InsertOutcome, ReceiptRepository};

#[async_trait]
impl ReceiptRepository for InMemoryIngestStore {
    async fn find_by_id(&self, id: &ReceiptId) -> Result<Option<EventReceipt>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.receipt_index(id).map(|i| tables.receipts[i].clone()))
    }

    async fn find_by_event_id(
        &self,
        event_id: &EventId,
    ) -> Result<Option<EventReceipt>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables
            .receipts_by_event
            .get(event_id.as_str())
            .map(|&i| tables.receipts[i].clone()))
    }

    async fn insert_impression(
        &self,
        receipt: &ImpressionReceipt,
    ) -> Result<InsertOutcome, DomainError> {
        let mut tables = self.tables.write().await;

        if let Some(&i) = tables.receipts_by_event.get(receipt.event_id.as_str()) {
            return Ok(InsertOutcome::Duplicate(tables.receipts[i].clone()));
        }

        let index = tables.receipts.len();
        tables
            .receipts
            .push(EventReceipt::Impression(receipt.clone()));
        tables
            .receipts_by_event
            .insert(receipt.event_id.as_str().to_string(), index);
        Ok(InsertOutcome::Inserted)
    }

    async fn find_canonical_impression(
        &self,
        publisher_id: &PublisherId,
        opportunity_id: &OpportunityId,
    ) -> Result<Option<ImpressionReceipt>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.receipts.iter().rev().find_map(|r| match r {
            EventReceipt::Impression(imp)
                if &imp.publisher_id == publisher_id && &imp.opportunity_id == opportunity_id =>
            {
                Some(imp.clone())
            }
            _ => None,
        }))
    }

    async fn record_matched_conversion(
        &self,
        receipt: &ConversionReceipt,
    ) -> Result<InsertOutcome, DomainError> {
        let mut tables = self.tables.write().await;

        if let Some(&i) = tables.receipts_by_event.get(receipt.event_id.as_str()) {
            return Ok(InsertOutcome::Duplicate(tables.receipts[i].clone()));
        }

        let linked = match tables.receipt_index(&receipt.matched_pause_id) {
            Some(i) => match &mut tables.receipts[i] {
                EventReceipt::Impression(imp) => {
                    imp.matched_conversion_id = Some(receipt.id);
                    true
                }
                EventReceipt::Conversion(_) => false,
            },
            None => false,
        };
        if !linked {
            return Err(DomainError::new(
                ErrorCode::ReceiptNotFound,
                format!("Impression {} not found", receipt.matched_pause_id),
            ));
        }

        let index = tables.receipts.len();
        tables
            .receipts
            .push(EventReceipt::Conversion(receipt.clone()));
        tables
            .receipts_by_event
            .insert(receipt.event_id.as_str().to_string(), index);
        Ok(InsertOutcome::Inserted)
    }

    async fn list(&self, filter: &ReceiptFilter) -> Result<Vec<EventReceipt>, DomainError> {
        let tables = self.tables.read().await;
        let mut matched: Vec<(usize, &EventReceipt)> = tables
            .receipts
            .iter()
            .enumerate()
            .filter(|(_, r)| filter.matches(r))
            .collect();
        matched.sort_by(|(ia, a), (ib, b)| {
            b.event_time()
                .cmp(&a.event_time())
                .then_with(|| ib.cmp(ia))
        });

        Ok(matched
            .into_iter()
            .take(filter.limit as usize)
            .map(|(_, r)| r.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{CampaignId, Timestamp};
    use crate::domain::ingest::{ConversionEvent, ConversionResult, EventType, ImpressionEvent};
    use serde_json::json;

    fn publisher() -> PublisherId {
        PublisherId::new("pub_acme").unwrap()
    }

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse_rfc3339(s).unwrap()
    }

    fn impression(event_id: &str, opportunity: &str, at: &str) -> ImpressionReceipt {
        ImpressionReceipt::record(
            publisher(),
            ImpressionEvent {
                event_id: EventId::new(event_id).unwrap(),
                event_time: ts(at),
                opportunity_id: OpportunityId::new(opportunity).unwrap(),
                campaign_id: CampaignId::new("cmp-1").unwrap(),
                creative_id: None,
                program_id: None,
                qr_displayed_at: None,
                payload: json!({}),
            },
            Timestamp::now(),
        )
    }

    fn conversion(event_id: &str, imp: &ImpressionReceipt, at: &str) -> ConversionReceipt {
        ConversionReceipt::matched(
            publisher(),
            ConversionEvent {
                event_id: EventId::new(event_id).unwrap(),
                event_time: ts(at),
                opportunity_id: imp.opportunity_id.clone(),
                result: ConversionResult::Success,
                payload: json!({}),
            },
            imp,
            Timestamp::now(),
        )
    }

    #[tokio::test]
    async fn duplicate_event_id_returns_existing_receipt() {
        let store = InMemoryIngestStore::new();
        let first = impression("evt-1", "opp-1", "2026-05-01T10:00:00Z");
        let second = impression("evt-1", "opp-2", "2026-05-01T10:00:05Z");

        assert_eq!(
            store.insert_impression(&first).await.unwrap(),
            InsertOutcome::Inserted
        );
        match store.insert_impression(&second).await.unwrap() {
            InsertOutcome::Duplicate(existing) => assert_eq!(existing.id(), first.id),
            other => panic!("expected duplicate, got {:?}", other),
        }
        assert_eq!(store.receipt_count().await, 1);
    }

    #[tokio::test]
    async fn most_recently_stored_impression_is_canonical() {
        let store = InMemoryIngestStore::new();
        let older = impression("evt-1", "opp-1", "2026-05-01T10:00:00Z");
        let newer = impression("evt-2", "opp-1", "2026-05-01T09:00:00Z");
        store.insert_impression(&older).await.unwrap();
        store.insert_impression(&newer).await.unwrap();

        let canonical = store
            .find_canonical_impression(&publisher(), &OpportunityId::new("opp-1").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(canonical.id, newer.id);
    }

    #[tokio::test]
    async fn canonical_lookup_is_scoped_to_publisher() {
        let store = InMemoryIngestStore::new();
        store
            .insert_impression(&impression("evt-1", "opp-1", "2026-05-01T10:00:00Z"))
            .await
            .unwrap();

        let other = PublisherId::new("pub_other").unwrap();
        let found = store
            .find_canonical_impression(&other, &OpportunityId::new("opp-1").unwrap())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn matched_conversion_links_both_ways() {
        let store = InMemoryIngestStore::new();
        let imp = impression("evt-1", "opp-1", "2026-05-01T10:00:00Z");
        store.insert_impression(&imp).await.unwrap();

        let conv = conversion("evt-2", &imp, "2026-05-01T10:00:07Z");
        store.record_matched_conversion(&conv).await.unwrap();

        let stored_imp = store
            .find_by_event_id(&imp.event_id)
            .await
            .unwrap()
            .unwrap();
        match stored_imp {
            EventReceipt::Impression(r) => assert_eq!(r.matched_conversion_id, Some(conv.id)),
            other => panic!("expected impression, got {:?}", other),
        }

        match store.find_by_event_id(&conv.event_id).await.unwrap().unwrap() {
            EventReceipt::Conversion(r) => assert_eq!(r.matched_pause_id, imp.id),
            other => panic!("expected conversion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn conversion_for_unknown_impression_is_rejected() {
        let store = InMemoryIngestStore::new();
        let imp = impression("evt-1", "opp-1", "2026-05-01T10:00:00Z");
        let conv = conversion("evt-2", &imp, "2026-05-01T10:00:07Z");

        let err = store.record_matched_conversion(&conv).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ReceiptNotFound);
        assert_eq!(store.receipt_count().await, 0);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_limited() {
        let store = InMemoryIngestStore::new();
        let a = impression("evt-a", "opp-1", "2026-05-01T10:00:00Z");
        let b = impression("evt-b", "opp-2", "2026-05-01T12:00:00Z");
        let c = impression("evt-c", "opp-3", "2026-05-01T11:00:00Z");
        for imp in [&a, &b, &c] {
            store.insert_impression(imp).await.unwrap();
        }

        let mut filter = ReceiptFilter::for_publisher(publisher(), 2);
        filter.event_type = Some(EventType::PauseImpression);
        let listed = store.list(&filter).await.unwrap();

        let ids: Vec<_> = listed.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![b.id, c.id]);
    }
}
