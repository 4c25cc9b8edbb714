//! Token header validation.
//!
//! This module provides security checks applied to a token's unverified
//! header before any key lookup or signature work happens.
//!
//! # Security
//!
//! - Strict algorithm checks to prevent algorithm substitution attacks
//! - Only asymmetric algorithms (EdDSA, RS256) are allowed
//! - Symmetric algorithms and "none" are always rejected
//! - `kid` values are shape-checked before reaching the cache or the network

use crate::error::AuthError;

/// Forbidden algorithms that are never accepted for security reasons.
///
/// These algorithms are blocked because:
/// - `none`: No signature verification (trivially bypassable)
/// - `HS256`, `HS384`, `HS512`: Symmetric algorithms (shared secret vulnerability)
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Accepted algorithms.
///
/// EdDSA (Ed25519) and RS256 have full verification support end-to-end: the
/// key-set parser produces matching key material for both (`OKP` and `RSA`
/// descriptors), and the verifier cross-checks the declared algorithm against
/// the resolved key's type. Per RFC 8725 Section 3.1, validators must reject
/// algorithms they do not fully implement, so anything else is refused here.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["EdDSA", "RS256"];

/// Upper bound on accepted `kid` length.
const MAX_KID_LENGTH: usize = 256;

/// Validate a declared token algorithm against security policies.
///
/// This function enforces strict algorithm security per RFC 8725:
/// - ALWAYS rejects symmetric algorithms (HS256, HS384, HS512)
/// - ALWAYS rejects "none"
/// - Only accepts algorithms in [`ACCEPTED_ALGORITHMS`]
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] for anything outside the
/// allow-list.
///
/// # Examples
///
/// ```
/// use muster_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("EdDSA").is_ok());
/// assert!(validate_algorithm("RS256").is_ok());
/// assert!(validate_algorithm("HS256").is_err());
/// assert!(validate_algorithm("none").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(AuthError::unsupported_algorithm(format!(
            "algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::unsupported_algorithm(format!(
            "algorithm '{alg}' is not in the accepted list"
        )));
    }

    Ok(())
}

/// Validate a `kid` value's shape before any cache or network interaction.
///
/// # Errors
///
/// Returns [`AuthError::Malformed`] if the `kid` is empty, longer than 256
/// characters, or contains whitespace or control characters.
pub fn validate_kid(kid: &str) -> Result<(), AuthError> {
    if kid.is_empty() {
        return Err(AuthError::malformed("token header `kid` is empty"));
    }
    if kid.len() > MAX_KID_LENGTH {
        return Err(AuthError::malformed(format!(
            "token header `kid` exceeds {MAX_KID_LENGTH} characters"
        )));
    }
    if kid.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(AuthError::malformed(
            "token header `kid` contains whitespace or control characters",
        ));
    }
    Ok(())
}
