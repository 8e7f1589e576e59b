//! PostgreSQL implementation of CredentialStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, PublisherId, Timestamp};
use crate::domain::publisher::PublisherCredential;
use crate::ports::CredentialStore;

pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    publisher_id: String,
    status: String,
    api_key_digest: Option<String>,
    signing_secret: Option<String>,
    last_used_at: Option<DateTime<Utc>>,
    usage_count: i64,
}

impl TryFrom<CredentialRow> for PublisherCredential {
    type Error = DomainError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|e: String| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid credential row: {}", e))
        })?;

        let mut credential = PublisherCredential::new(PublisherId::new(row.publisher_id)?)
            .with_status(status);
        credential.api_key_digest = row.api_key_digest;
        if let Some(secret) = row.signing_secret {
            credential = credential.with_signing_secret(secret);
        }
        credential.last_used_at = row.last_used_at.map(Timestamp::from_datetime);
        credential.usage_count = row.usage_count.max(0) as u64;
        Ok(credential)
    }
}

const SELECT_CREDENTIAL: &str = r#"
    SELECT publisher_id, status, api_key_digest, signing_secret, last_used_at, usage_count
    FROM publisher_credentials
"#;

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find_by_api_key_digest(
        &self,
        digest: &str,
    ) -> Result<Option<PublisherCredential>, DomainError> {
        let row: Option<CredentialRow> =
            sqlx::query_as(&format!("{} WHERE api_key_digest = $1", SELECT_CREDENTIAL))
                .bind(digest)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::database("Failed to look up API key", e))?;

        row.map(PublisherCredential::try_from).transpose()
    }

    async fn find_by_publisher(
        &self,
        publisher_id: &PublisherId,
    ) -> Result<Option<PublisherCredential>, DomainError> {
        let row: Option<CredentialRow> =
            sqlx::query_as(&format!("{} WHERE publisher_id = $1", SELECT_CREDENTIAL))
                .bind(publisher_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DomainError::database("Failed to look up publisher", e))?;

        row.map(PublisherCredential::try_from).transpose()
    }

    async fn record_usage(
        &self,
        publisher_id: &PublisherId,
        used_at: Timestamp,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE publisher_credentials
            SET last_used_at = $2, usage_count = usage_count + 1
            WHERE publisher_id = $1
            "#,
        )
        .bind(publisher_id.as_str())
        .bind(used_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to record credential usage", e))?;

        Ok(())
    }
}
