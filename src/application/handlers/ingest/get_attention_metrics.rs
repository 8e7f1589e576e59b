//! GetAttentionMetricsHandler - summarizes rollups over a date window.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::domain::foundation::{PublisherId, Timestamp};
use crate::domain::ingest::IngestError;
use crate::domain::rollup::{AttentionSummary, RollupQuery};
use crate::ports::RollupStore;

/// Window used when the caller gives no `from`.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct GetAttentionMetricsQuery {
    pub publisher_id: PublisherId,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub program_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetAttentionMetricsResult {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_id: Option<String>,
    #[serde(flatten)]
    pub summary: AttentionSummary,
}

pub struct GetAttentionMetricsHandler {
    rollups: Arc<dyn RollupStore>,
}

impl GetAttentionMetricsHandler {
    pub fn new(rollups: Arc<dyn RollupStore>) -> Self {
        Self { rollups }
    }

    /// `to` defaults to today (UTC); `from` defaults to the 30 days ending at
    /// `to`. Both bounds are inclusive.
    pub async fn handle(
        &self,
        query: GetAttentionMetricsQuery,
    ) -> Result<GetAttentionMetricsResult, IngestError> {
        let to = query.to.unwrap_or_else(|| Timestamp::now().date());
        let from = query
            .from
            .unwrap_or_else(|| to - Duration::days(DEFAULT_WINDOW_DAYS - 1));
        if from > to {
            return Err(IngestError::invalid_field("from", "must not be after 'to'"));
        }

        let rows = self
            .rollups
            .query(&RollupQuery {
                publisher_id: query.publisher_id,
                from,
                to,
                program_id: query.program_id.clone(),
            })
            .await?;

        Ok(GetAttentionMetricsResult {
            from,
            to,
            program_id: query.program_id,
            summary: AttentionSummary::from_rollups(&rows),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryIngestStore;
    use crate::domain::metrics::{A2arTier, AciLevel, AsvTier};
    use crate::domain::rollup::{RollupDelta, RollupKey};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    async fn store_with_activity() -> InMemoryIngestStore {
        let store = InMemoryIngestStore::new();
        let key = RollupKey::for_event(
            Timestamp::parse_rfc3339("2026-05-02T12:00:00Z").unwrap(),
            None,
            PublisherId::new("pub_acme").unwrap(),
            Some("prog-1".into()),
        );
        for _ in 0..1000 {
            store.record(&key, RollupDelta::Impression).await.unwrap();
        }
        for _ in 0..20 {
            store
                .record(
                    &key,
                    RollupDelta::Conversion {
                        asv_seconds: Some(7.0),
                        verified: true,
                    },
                )
                .await
                .unwrap();
        }
        store
    }

    fn query(from: Option<NaiveDate>, to: Option<NaiveDate>) -> GetAttentionMetricsQuery {
        GetAttentionMetricsQuery {
            publisher_id: PublisherId::new("pub_acme").unwrap(),
            from,
            to,
            program_id: None,
        }
    }

    #[tokio::test]
    async fn summarizes_window() {
        let handler = GetAttentionMetricsHandler::new(Arc::new(store_with_activity().await));
        let result = handler
            .handle(query(Some(day(1)), Some(day(3))))
            .await
            .unwrap();

        assert_eq!(result.summary.pause_opportunities, 1000);
        assert_eq!(result.summary.verified_conversions, 20);
        assert_eq!(result.summary.a2ar.tier, A2arTier::Strong);
        assert_eq!(result.summary.asv.unwrap().tier, AsvTier::Strong);
        assert_eq!(result.summary.aci.level, AciLevel::Strong);
    }

    #[tokio::test]
    async fn window_outside_activity_is_empty() {
        let handler = GetAttentionMetricsHandler::new(Arc::new(store_with_activity().await));
        let result = handler
            .handle(query(Some(day(10)), Some(day(12))))
            .await
            .unwrap();

        assert_eq!(result.summary.pause_opportunities, 0);
        assert_eq!(result.summary.aci.level, AciLevel::NotApplicable);
    }

    #[tokio::test]
    async fn default_window_spans_thirty_days() {
        let handler = GetAttentionMetricsHandler::new(Arc::new(InMemoryIngestStore::new()));
        let result = handler.handle(query(None, Some(day(31)))).await.unwrap();
        assert_eq!(result.from, day(2));
    }

    #[tokio::test]
    async fn inverted_window_is_rejected() {
        let handler = GetAttentionMetricsHandler::new(Arc::new(InMemoryIngestStore::new()));
        let err = handler
            .handle(query(Some(day(5)), Some(day(1))))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_field_format");
    }
}
