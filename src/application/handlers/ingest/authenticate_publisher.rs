//! AuthenticatePublisherHandler - resolves a request to an active publisher.

use std::sync::Arc;

use crate::domain::foundation::{PublisherId, Timestamp};
use crate::domain::ingest::IngestError;
use crate::domain::publisher::{
    digest_api_key, AuthError, AuthMethod, AuthenticatedPublisher, PublisherCredential,
    RequestSignatureVerifier,
};
use crate::ports::CredentialStore;

/// Proofs lifted from request headers.
#[derive(Debug, Clone, Default)]
pub struct RequestCredentials {
    /// Value after `Bearer ` in `Authorization`.
    pub bearer_token: Option<String>,
    /// `X-Timestamp`.
    pub timestamp: Option<String>,
    /// `X-Signature`.
    pub signature: Option<String>,
    /// `X-Publisher-Id`, or `publisher.publisher_id` from the body.
    pub publisher_id: Option<String>,
}

pub struct AuthenticatePublisherHandler {
    credentials: Arc<dyn CredentialStore>,
    verifier: RequestSignatureVerifier,
}

impl AuthenticatePublisherHandler {
    pub fn new(credentials: Arc<dyn CredentialStore>, verifier: RequestSignatureVerifier) -> Self {
        Self {
            credentials,
            verifier,
        }
    }

    /// A bearer key takes precedence over a signature when both are sent.
    ///
    /// On success the credential's usage counters are bumped in the
    /// background; a failure there is logged and never fails the request.
    pub async fn handle(
        &self,
        proof: &RequestCredentials,
        body: &[u8],
    ) -> Result<AuthenticatedPublisher, IngestError> {
        let authenticated = if let Some(token) = proof.bearer_token.as_deref() {
            self.by_api_key(token).await?
        } else if let (Some(timestamp), Some(signature)) =
            (proof.timestamp.as_deref(), proof.signature.as_deref())
        {
            let publisher = proof
                .publisher_id
                .as_deref()
                .ok_or(AuthError::AuthenticationRequired)?;
            self.by_signature(publisher, timestamp, signature, body)
                .await?
        } else {
            return Err(AuthError::AuthenticationRequired.into());
        };

        self.record_usage(authenticated.publisher_id.clone());
        Ok(authenticated)
    }

    async fn by_api_key(&self, token: &str) -> Result<AuthenticatedPublisher, IngestError> {
        let credential = self
            .credentials
            .find_by_api_key_digest(&digest_api_key(token.trim()))
            .await?
            .filter(PublisherCredential::is_active)
            .ok_or(AuthError::InvalidCredentials)?;

        Ok(AuthenticatedPublisher::new(
            credential.publisher_id,
            AuthMethod::ApiKey,
        ))
    }

    async fn by_signature(
        &self,
        publisher: &str,
        timestamp: &str,
        signature: &str,
        body: &[u8],
    ) -> Result<AuthenticatedPublisher, IngestError> {
        let publisher_id =
            PublisherId::new(publisher).map_err(|_| AuthError::PublisherNotFound)?;

        let credential = self
            .credentials
            .find_by_publisher(&publisher_id)
            .await?
            .ok_or(AuthError::PublisherNotFound)?;

        if !credential.is_active() {
            return Err(AuthError::InvalidCredentials.into());
        }
        let secret = credential
            .signing_key()
            .ok_or(AuthError::InvalidCredentials)?;

        self.verifier
            .verify(secret, timestamp, signature, body, Timestamp::now())?;

        Ok(AuthenticatedPublisher::new(
            credential.publisher_id,
            AuthMethod::Signature,
        ))
    }

    fn record_usage(&self, publisher_id: PublisherId) {
        let credentials = self.credentials.clone();
        tokio::spawn(async move {
            if let Err(e) = credentials
                .record_usage(&publisher_id, Timestamp::now())
                .await
            {
                tracing::warn!(
                    publisher_id = %publisher_id,
                    error = %e,
                    "Failed to record credential usage"
                );
            }
        });
    }
}
