//! # Muster Authentication
//!
//! Bearer token verification and role-gated authorization for Muster
//! services.
//!
//! This crate provides:
//! - **Token verification**: signature, expiry, and claim checks producing a verified
//!   [`Principal`]
//! - **Issuer key cache**: TTL cache over the issuer's published key set with single-flight fetch
//!   coalescing and staleness-bounded fallback
//! - **Role gate**: the single canonical role check for protected operations
//!
//! ## Security Posture
//!
//! - Only asymmetric algorithms (EdDSA, RS256) are accepted; `none` and HS* are always rejected
//! - Every identity derives from a fully verified token — no unverified-decode path exists
//! - The declared algorithm must match the resolved key's type (confusion guard)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use muster_authn::{
//!     authorize, HttpKeySetClient, KeyCache, Role, TokenVerifier, VerifierConfig,
//! };
//!
//! # async fn example(token: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(HttpKeySetClient::new(
//!     "https://issuer.example.com/.well-known/jwks.json",
//! )?);
//! let keys = Arc::new(KeyCache::new(client, Duration::from_secs(300)));
//! let verifier = TokenVerifier::new(keys, VerifierConfig {
//!     issuer: "https://issuer.example.com/pool-1".into(),
//!     audience: "client-abc123".into(),
//! });
//!
//! let principal = verifier.verify(token).await?;
//! authorize(&principal, Role::Organizer)?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Role-gated authorization.
pub mod authz;
/// Authentication error types.
pub mod error;
/// Token verification and claims.
pub mod jwt;
/// Issuer key cache.
pub mod key_cache;
/// Issuer key-set types and fetch client.
pub mod keyset;
/// Verified caller identity.
pub mod principal;
/// Shared test helpers.
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
/// Token header validation.
pub mod validation;

// Re-export key types for convenience
pub use authz::{PolicyError, authorize};
pub use error::{AuthError, KeySetError, Result};
pub use jwt::{Claims, TokenVerifier, VerifierConfig};
pub use key_cache::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_FALLBACK_TTL, DEFAULT_KEY_TTL, KeyCache, KeyCacheConfig,
    VerificationKey,
};
pub use keyset::{HttpKeySetClient, KeyDescriptor, KeySet, KeySetClient};
pub use principal::{Principal, Role};
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
