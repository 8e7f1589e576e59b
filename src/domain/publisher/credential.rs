//! Publisher credentials and the identity they resolve to.
//!
//! Credentials are provisioned administratively. The ingest path only reads
//! them and bumps the usage counters.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{PublisherId, Timestamp};

/// Lifecycle of a publisher credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Active,
    Suspended,
    Revoked,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStatus::Active => "active",
            CredentialStatus::Suspended => "suspended",
            CredentialStatus::Revoked => "revoked",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, CredentialStatus::Active)
    }
}

impl FromStr for CredentialStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CredentialStatus::Active),
            "suspended" => Ok(CredentialStatus::Suspended),
            "revoked" => Ok(CredentialStatus::Revoked),
            other => Err(format!("unknown credential status '{}'", other)),
        }
    }
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hex SHA-256 digest of an API key, the only form in which keys are stored.
pub fn digest_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

/// A stored publisher credential.
#[derive(Clone)]
pub struct PublisherCredential {
    pub publisher_id: PublisherId,
    pub status: CredentialStatus,
    /// Hex SHA-256 of the bearer key, when the publisher uses one.
    pub api_key_digest: Option<String>,
    /// HMAC signing secret, when the publisher signs requests.
    pub signing_secret: Option<SecretString>,
    pub last_used_at: Option<Timestamp>,
    pub usage_count: u64,
}

impl PublisherCredential {
    /// A fresh active credential with neither proof configured.
    pub fn new(publisher_id: PublisherId) -> Self {
        Self {
            publisher_id,
            status: CredentialStatus::Active,
            api_key_digest: None,
            signing_secret: None,
            last_used_at: None,
            usage_count: 0,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key_digest = Some(digest_api_key(api_key));
        self
    }

    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = Some(SecretString::new(secret.into()));
        self
    }

    pub fn with_status(mut self, status: CredentialStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Exposes the signing secret bytes for MAC computation.
    pub fn signing_key(&self) -> Option<&[u8]> {
        self.signing_secret
            .as_ref()
            .map(|secret| secret.expose_secret().as_bytes())
    }
}

impl fmt::Debug for PublisherCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherCredential")
            .field("publisher_id", &self.publisher_id)
            .field("status", &self.status)
            .field("has_api_key", &self.api_key_digest.is_some())
            .field("has_signing_secret", &self.signing_secret.is_some())
            .field("last_used_at", &self.last_used_at)
            .field("usage_count", &self.usage_count)
            .finish()
    }
}

/// How the caller proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    ApiKey,
    Signature,
}

/// A request principal resolved by the authenticator.
///
/// Injected into request extensions by the HTTP middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPublisher {
    pub publisher_id: PublisherId,
    pub method: AuthMethod,
}

impl AuthenticatedPublisher {
    pub fn new(publisher_id: PublisherId, method: AuthMethod) -> Self {
        Self {
            publisher_id,
            method,
        }
    }
}
