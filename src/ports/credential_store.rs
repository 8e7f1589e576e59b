//! CredentialStore port - read access to publisher credentials.
//!
//! Credentials are provisioned elsewhere. The ingest service only looks them
//! up and bumps usage counters.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PublisherId, Timestamp};
use crate::domain::publisher::PublisherCredential;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Finds the credential whose API key hashes to `digest`.
    async fn find_by_api_key_digest(
        &self,
        digest: &str,
    ) -> Result<Option<PublisherCredential>, DomainError>;

    async fn find_by_publisher(
        &self,
        publisher_id: &PublisherId,
    ) -> Result<Option<PublisherCredential>, DomainError>;

    /// Sets `last_used_at` and increments `usage_count`.
    async fn record_usage(
        &self,
        publisher_id: &PublisherId,
        used_at: Timestamp,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn CredentialStore) {}
    }
}
