use async_trait::async_trait;

use super::InMemoryIngestStore;
use crate::domain::foundation::{DomainError, PublisherId, Timestamp};
use crate::domain::publisher::PublisherCredential;
use crate::ports::CredentialStore;

#[async_trait]
impl CredentialStore for InMemoryIngestStore {
    async fn find_by_api_key_digest(
        &self,
        digest: &str,
    ) -> Result<Option<PublisherCredential>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables
            .credentials
            .values()
            .find(|c| c.api_key_digest.as_deref() == Some(digest))
            .cloned())
    }

    async fn find_by_publisher(
        &self,
        publisher_id: &PublisherId,
    ) -> Result<Option<PublisherCredential>, DomainError> {
        let tables = self.tables.read().await;
        Ok(tables.credentials.get(publisher_id).cloned())
    }

    async fn record_usage(
        &self,
        publisher_id: &PublisherId,
        used_at: Timestamp,
    ) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;
        if let Some(credential) = tables.credentials.get_mut(publisher_id) {
            credential.last_used_at = Some(used_at);
            credential.usage_count += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::publisher::digest_api_key;

    #[tokio::test]
    async fn finds_credential_by_key_digest() {
        let store = InMemoryIngestStore::new();
        let publisher = PublisherId::new("pub_acme").unwrap();
        store
            .add_credential(PublisherCredential::new(publisher.clone()).with_api_key("k-1"))
            .await;

        let found = store
            .find_by_api_key_digest(&digest_api_key("k-1"))
            .await
            .unwrap();
        assert_eq!(found.map(|c| c.publisher_id), Some(publisher));

        let missing = store
            .find_by_api_key_digest(&digest_api_key("k-2"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn usage_is_counted() {
        let store = InMemoryIngestStore::new();
        let publisher = PublisherId::new("pub_acme").unwrap();
        store
            .add_credential(PublisherCredential::new(publisher.clone()))
            .await;

        let now = Timestamp::now();
        store.record_usage(&publisher, now).await.unwrap();
        store.record_usage(&publisher, now).await.unwrap();

        let credential = store.find_by_publisher(&publisher).await.unwrap().unwrap();
        assert_eq!(credential.usage_count, 2);
        assert_eq!(credential.last_used_at, Some(now));
    }
}
