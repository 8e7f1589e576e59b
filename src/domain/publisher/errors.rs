//! Publisher authentication errors.

use thiserror::Error;

/// Why a request could not be attributed to an active publisher.
///
/// Every variant maps to a 401 response; the machine-readable code lets the
/// publisher tell a bad key from a clock problem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The API key is unknown or its credential is not active.
    #[error("Invalid or inactive credentials")]
    InvalidCredentials,

    /// The signature proof names a publisher with no credential on file.
    #[error("Publisher not found")]
    PublisherNotFound,

    /// The HMAC does not match the request body.
    #[error("Request signature does not match")]
    InvalidSignature,

    /// The signed timestamp is outside the accepted window.
    #[error("Request timestamp is outside the accepted window")]
    TimestampExpired,

    /// Neither a bearer key nor a signature was presented.
    #[error("Authentication required")]
    AuthenticationRequired,
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::PublisherNotFound => "publisher_not_found",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TimestampExpired => "timestamp_expired",
            AuthError::AuthenticationRequired => "authentication_required",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_snake_case() {
        assert_eq!(AuthError::InvalidCredentials.error_code(), "invalid_credentials");
        assert_eq!(AuthError::PublisherNotFound.error_code(), "publisher_not_found");
        assert_eq!(AuthError::InvalidSignature.error_code(), "invalid_signature");
        assert_eq!(AuthError::TimestampExpired.error_code(), "timestamp_expired");
        assert_eq!(
            AuthError::AuthenticationRequired.error_code(),
            "authentication_required"
        );
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(format!("{}", AuthError::AuthenticationRequired), "Authentication required");
    }
}
