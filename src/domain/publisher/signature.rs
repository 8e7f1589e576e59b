//! HMAC-SHA256 request signatures.
//!
//! The signed payload is `<timestamp>.<raw body>` where the timestamp is the
//! value of the `X-Timestamp` header in unix seconds. The signature is sent hex
//! encoded in `X-Signature`, optionally prefixed with `sha256=`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::AuthError;
use crate::domain::foundation::Timestamp;

type HmacSha256 = Hmac<Sha256>;

/// Default acceptance window, in either direction, for signed timestamps.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verifies publisher request signatures against a clock window.
#[derive(Debug, Clone, Copy)]
pub struct RequestSignatureVerifier {
    tolerance_secs: i64,
}

impl Default for RequestSignatureVerifier {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_SECS)
    }
}

impl RequestSignatureVerifier {
    pub fn new(tolerance_secs: i64) -> Self {
        Self {
            tolerance_secs: tolerance_secs.abs(),
        }
    }

    pub fn tolerance_secs(&self) -> i64 {
        self.tolerance_secs
    }

    /// Checks the timestamp window first, then the MAC.
    ///
    /// # Errors
    ///
    /// - `TimestampExpired` if the timestamp is not an integer or is too far
    ///   from `now`
    /// - `InvalidSignature` if the signature is not hex or does not match
    pub fn verify(
        &self,
        secret: &[u8],
        timestamp: &str,
        signature: &str,
        body: &[u8],
        now: Timestamp,
    ) -> Result<(), AuthError> {
        let signed_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| AuthError::TimestampExpired)?;
        if (now.as_unix_secs() - signed_at).abs() > self.tolerance_secs {
            return Err(AuthError::TimestampExpired);
        }

        let provided = decode_signature(signature)?;
        let expected = compute_mac(secret, timestamp.trim(), body)?;

        if provided.len() != expected.len() || !bool::from(provided.ct_eq(&expected)) {
            return Err(AuthError::InvalidSignature);
        }
        Ok(())
    }
}

/// Produces the hex signature a publisher sends for `body` at `timestamp`.
pub fn sign_request(secret: &[u8], timestamp: &str, body: &[u8]) -> Result<String, AuthError> {
    compute_mac(secret, timestamp, body).map(hex::encode)
}

fn decode_signature(signature: &str) -> Result<Vec<u8>, AuthError> {
    let trimmed = signature.trim();
    let hex_part = trimmed.strip_prefix("sha256=").unwrap_or(trimmed);
    hex::decode(hex_part).map_err(|_| AuthError::InvalidSignature)
}

fn compute_mac(secret: &[u8], timestamp: &str, body: &[u8]) -> Result<Vec<u8>, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| AuthError::InvalidSignature)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}
