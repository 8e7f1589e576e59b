//! Publisher identity: credentials, request signatures and auth errors.

mod credential;
mod errors;
mod signature;

pub use credential::{
    digest_api_key, AuthMethod, AuthenticatedPublisher, CredentialStatus, PublisherCredential,
};
pub use errors::AuthError;
pub use signature::{sign_request, RequestSignatureVerifier, DEFAULT_TOLERANCE_SECS};
