//! ListReceiptsHandler - query handler for a publisher's own receipts.

use std::sync::Arc;

use crate::domain::foundation::{PublisherId, Timestamp};
use crate::domain::ingest::{EventReceipt, EventType, IngestError, ReceiptFilter};
use crate::ports::ReceiptRepository;

pub const DEFAULT_LIST_LIMIT: u32 = 100;

/// Query for listing receipts.
#[derive(Debug, Clone)]
pub struct ListReceiptsQuery {
    pub publisher_id: PublisherId,
    pub event_type: Option<EventType>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: Option<u32>,
}

pub struct ListReceiptsHandler {
    receipts: Arc<dyn ReceiptRepository>,
    max_limit: u32,
}

impl ListReceiptsHandler {
    pub fn new(receipts: Arc<dyn ReceiptRepository>, max_limit: u32) -> Self {
        Self {
            receipts,
            max_limit: max_limit.max(1),
        }
    }

    /// Only the caller's receipts are ever visible; the limit is clamped to
    /// `1..=max_limit`.
    pub async fn handle(&self, query: ListReceiptsQuery) -> Result<Vec<EventReceipt>, IngestError> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(IngestError::invalid_field("from", "must not be after 'to'"));
            }
        }

        let limit = query
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, self.max_limit);

        let filter = ReceiptFilter {
            publisher_id: query.publisher_id,
            event_type: query.event_type,
            from: query.from,
            to: query.to,
            limit,
        };

        Ok(self.receipts.list(&filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryIngestStore;
    use crate::domain::foundation::{CampaignId, EventId, OpportunityId};
    use crate::domain::ingest::{ImpressionEvent, ImpressionReceipt};
    use serde_json::json;

    async fn seeded(publisher: &str, count: usize) -> InMemoryIngestStore {
        let store = InMemoryIngestStore::new();
        for i in 0..count {
            let receipt = ImpressionReceipt::record(
                PublisherId::new(publisher).unwrap(),
                ImpressionEvent {
                    event_id: EventId::new(format!("{}-evt-{}", publisher, i)).unwrap(),
                    event_time: Timestamp::now().plus_secs(i as i64),
                    opportunity_id: OpportunityId::new(format!("opp-{}", i)).unwrap(),
                    campaign_id: CampaignId::new("cmp-1").unwrap(),
                    creative_id: None,
                    program_id: None,
                    qr_displayed_at: None,
                    payload: json!({}),
                },
                Timestamp::now(),
            );
            store.insert_impression(&receipt).await.unwrap();
        }
        store
    }

    fn query(publisher: &str, limit: Option<u32>) -> ListReceiptsQuery {
        ListReceiptsQuery {
            publisher_id: PublisherId::new(publisher).unwrap(),
            event_type: None,
            from: None,
            to: None,
            limit,
        }
    }

    #[tokio::test]
    async fn limit_is_clamped_to_maximum() {
        let store = seeded("pub_acme", 8).await;
        let handler = ListReceiptsHandler::new(Arc::new(store), 5);

        let listed = handler.handle(query("pub_acme", Some(50))).await.unwrap();
        assert_eq!(listed.len(), 5);
    }

    #[tokio::test]
    async fn other_publishers_are_invisible() {
        let store = seeded("pub_other", 3).await;
        let handler = ListReceiptsHandler::new(Arc::new(store), 500);

        let listed = handler.handle(query("pub_acme", None)).await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn inverted_window_is_rejected() {
        let handler = ListReceiptsHandler::new(Arc::new(InMemoryIngestStore::new()), 500);
        let mut q = query("pub_acme", None);
        q.from = Some(Timestamp::now());
        q.to = Some(Timestamp::now().plus_secs(-60));

        let err = handler.handle(q).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_field_format");
    }
}
