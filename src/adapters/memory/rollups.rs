use async_trait::async_trait;

use super::InMemoryIngestStore;
use crate::domain::foundation::DomainError;
use crate::domain::rollup::{AttentionRollup, RollupDelta, RollupKey, RollupQuery};
use crate::ports::RollupStore;

#[async_trait]
impl RollupStore for InMemoryIngestStore {
    async fn record(
        &self,
        key: &RollupKey,
        delta: RollupDelta,
    ) -> Result<AttentionRollup, DomainError> {
        let mut tables = self.tables.write().await;
        let rollup = tables
            .rollups
            .entry(key.clone())
            .or_insert_with(|| AttentionRollup::empty(key.clone()));
        rollup.apply(delta);
        Ok(rollup.clone())
    }

    async fn query(&self, query: &RollupQuery) -> Result<Vec<AttentionRollup>, DomainError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<AttentionRollup> = tables
            .rollups
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.key.date);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{PublisherId, Timestamp};

    fn key(at: &str, program: Option<&str>) -> RollupKey {
        RollupKey::for_event(
            Timestamp::parse_rfc3339(at).unwrap(),
            None,
            PublisherId::new("pub_acme").unwrap(),
            program.map(String::from),
        )
    }

    #[tokio::test]
    async fn increments_accumulate_per_key() {
        let store = InMemoryIngestStore::new();
        let k = key("2026-05-01T10:00:00Z", Some("prog-1"));

        store.record(&k, RollupDelta::Impression).await.unwrap();
        let rollup = store.record(&k, RollupDelta::Impression).await.unwrap();

        assert_eq!(rollup.pause_opportunities, 2);
    }

    #[tokio::test]
    async fn query_filters_window_and_program() {
        let store = InMemoryIngestStore::new();
        store
            .record(&key("2026-05-01T10:00:00Z", Some("a")), RollupDelta::Impression)
            .await
            .unwrap();
        store
            .record(&key("2026-05-02T10:00:00Z", Some("b")), RollupDelta::Impression)
            .await
            .unwrap();
        store
            .record(&key("2026-05-09T10:00:00Z", Some("a")), RollupDelta::Impression)
            .await
            .unwrap();

        let query = RollupQuery {
            publisher_id: PublisherId::new("pub_acme").unwrap(),
            from: chrono::NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            to: chrono::NaiveDate::from_ymd_opt(2026, 5, 3).unwrap(),
            program_id: None,
        };
        assert_eq!(store.query(&query).await.unwrap().len(), 2);

        let only_a = RollupQuery {
            program_id: Some("a".into()),
            ..query
        };
        assert_eq!(store.query(&only_a).await.unwrap().len(), 1);
    }
}
