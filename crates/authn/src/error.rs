//! Authentication error types.
//!
//! This module defines errors that can occur during token verification and
//! issuer key resolution. Every variant carries a stable machine-readable
//! code (see [`AuthError::code`]) so callers can surface rejections without
//! string-matching display text.

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Authentication errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]` — new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Malformed token - cannot be decoded.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The declared algorithm is not in the allow-list.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The token's `kid` does not resolve to a key in the issuer's current
    /// key set.
    #[error("unknown signing key: {kid}")]
    UnknownKey {
        /// Key ID that was not found.
        kid: String,
    },

    /// Signature verification failed.
    #[error("invalid signature")]
    InvalidSignature,

    /// The token's `exp` claim is in the past.
    #[error("token expired")]
    Expired,

    /// A standard claim does not match the configured expectation, or a
    /// required claim is missing or unrecognized.
    #[error("claim mismatch: {0}")]
    ClaimMismatch(String),

    /// A key descriptor from the issuer could not be turned into a usable
    /// verification key.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// The issuer's key endpoint could not be reached and no cached key was
    /// available. Surfaced to callers as a service-unavailable condition,
    /// never as a rejection of the token itself.
    #[error("issuer unavailable: {0}")]
    IssuerUnavailable(#[from] KeySetError),
}

impl AuthError {
    /// Creates a new `Malformed` error with the given detail.
    #[must_use]
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed(detail.into())
    }

    /// Creates a new `UnsupportedAlgorithm` error with the given detail.
    #[must_use]
    pub fn unsupported_algorithm(detail: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm(detail.into())
    }

    /// Creates a new `UnknownKey` error for the given key ID.
    #[must_use]
    pub fn unknown_key(kid: impl Into<String>) -> Self {
        Self::UnknownKey { kid: kid.into() }
    }

    /// Creates a new `ClaimMismatch` error with the given detail.
    #[must_use]
    pub fn claim_mismatch(detail: impl Into<String>) -> Self {
        Self::ClaimMismatch(detail.into())
    }

    /// Creates a new `InvalidKeyMaterial` error with the given detail.
    #[must_use]
    pub fn invalid_key_material(detail: impl Into<String>) -> Self {
        Self::InvalidKeyMaterial(detail.into())
    }

    /// Returns the stable machine-readable code for this error.
    ///
    /// Codes are part of the public contract: they never change for an
    /// existing variant and are safe to expose to API clients.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "MALFORMED",
            Self::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
            Self::UnknownKey { .. } => "UNKNOWN_KEY",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::Expired => "EXPIRED",
            Self::ClaimMismatch(_) => "CLAIM_MISMATCH",
            Self::InvalidKeyMaterial(_) => "INVALID_KEY_MATERIAL",
            Self::IssuerUnavailable(_) => "ISSUER_UNAVAILABLE",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken => AuthError::malformed("invalid JWT structure"),
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidAudience => AuthError::claim_mismatch("audience validation failed"),
            ErrorKind::InvalidIssuer => AuthError::claim_mismatch("issuer validation failed"),
            ErrorKind::InvalidAlgorithm => {
                AuthError::unsupported_algorithm("algorithm not supported")
            },
            _ => AuthError::malformed(format!("JWT error: {err}")),
        }
    }
}

/// Errors from fetching the issuer's published key set.
///
/// Transient variants ([`Http`](Self::Http), [`Timeout`](Self::Timeout))
/// qualify for stale-serving from the key cache's fallback tier;
/// [`Decode`](Self::Decode) is a definitive bad response and does not.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum KeySetError {
    /// The HTTP request to the key endpoint failed.
    #[error("key set request failed: {message}")]
    Http {
        /// Description of the failure.
        message: String,
        /// The underlying transport error.
        #[source]
        source: Option<BoxError>,
    },

    /// The key endpoint responded with something that is not a key set.
    #[error("key set response malformed: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    /// The request exceeded its configured time limit.
    #[error("key set request timed out")]
    Timeout,
}

impl KeySetError {
    /// Creates a new `Http` error with the given message.
    #[must_use]
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http { message: message.into(), source: None }
    }

    /// Creates a new `Http` error with a message and source error.
    #[must_use]
    pub fn http_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Http { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Decode` error with the given message.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode { message: message.into() }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Returns `true` if the fetch may succeed when re-issued and the cache
    /// may serve a stale-but-unexpired fallback entry in the meantime.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http { .. } | Self::Timeout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::malformed("truncated");
        assert_eq!(err.to_string(), "malformed token: truncated");

        let err = AuthError::Expired;
        assert_eq!(err.to_string(), "token expired");

        let err = AuthError::unknown_key("kid-001");
        assert_eq!(err.to_string(), "unknown signing key: kid-001");
    }

    #[test]
    fn test_stable_codes() {
        assert_eq!(AuthError::malformed("x").code(), "MALFORMED");
        assert_eq!(AuthError::unsupported_algorithm("HS256").code(), "UNSUPPORTED_ALGORITHM");
        assert_eq!(AuthError::unknown_key("k").code(), "UNKNOWN_KEY");
        assert_eq!(AuthError::InvalidSignature.code(), "INVALID_SIGNATURE");
        assert_eq!(AuthError::Expired.code(), "EXPIRED");
        assert_eq!(AuthError::claim_mismatch("aud").code(), "CLAIM_MISMATCH");
        assert_eq!(AuthError::invalid_key_material("short").code(), "INVALID_KEY_MATERIAL");
        assert_eq!(AuthError::from(KeySetError::timeout()).code(), "ISSUER_UNAVAILABLE");
    }

    #[test]
    fn test_error_from_jsonwebtoken() {
        let jwt_err =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::ExpiredSignature);
        let auth_err: AuthError = jwt_err.into();
        assert!(matches!(auth_err, AuthError::Expired));

        let jwt_err =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSignature);
        let auth_err: AuthError = jwt_err.into();
        assert!(matches!(auth_err, AuthError::InvalidSignature));
    }

    #[test]
    fn test_key_set_error_transient_classification() {
        assert!(KeySetError::http("connection refused").is_transient());
        assert!(KeySetError::timeout().is_transient());
        assert!(!KeySetError::decode("not json").is_transient());
    }

    #[test]
    fn test_issuer_unavailable_preserves_source() {
        use std::error::Error;

        let err = AuthError::from(KeySetError::http("dns failure"));
        let source = err.source().expect("source chain must be preserved");
        assert_eq!(source.to_string(), "key set request failed: dns failure");
    }
}
