//! Token verification.
//!
//! This module provides [`TokenVerifier`], the single entry point for
//! turning a bearer token into a [`Principal`]. Every request path that
//! derives an identity goes through [`TokenVerifier::verify`]; claims are
//! only ever materialized from the verified decode, so there is no code
//! path that reads claims from an unverified token.

use std::sync::Arc;

use jsonwebtoken::{Validation, decode, decode_header};
use serde::{Deserialize, Serialize};

use crate::{
    error::AuthError,
    key_cache::KeyCache,
    keyset::algorithm_name,
    principal::{Principal, Role},
    validation::{validate_algorithm, validate_kid},
};

/// Verified token claims.
///
/// The payload carries the standard claims plus the issuer's custom role
/// claim:
///
/// ```json
/// {
///   "iss": "https://issuer.example.com/pool-1",
///   "sub": "7d8f1a2b-...",
///   "aud": "client-abc123",
///   "exp": 1234567890,
///   "iat": 1234567800,
///   "email": "person@example.com",
///   "custom:role": "organizer"
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer URL.
    pub iss: String,
    /// Subject - stable principal identifier.
    pub sub: String,
    /// Audience - the client this token was minted for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Expiration time (seconds since epoch).
    pub exp: u64,
    /// Issued at (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Custom role claim; absent means lowest privilege.
    #[serde(default, rename = "custom:role", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Configuration for [`TokenVerifier`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifierConfig {
    /// Expected `iss` claim value.
    pub issuer: String,
    /// Expected `aud` claim value.
    pub audience: String,
}

/// Verifies bearer tokens and extracts the calling [`Principal`].
///
/// # Verification Pipeline
///
/// 1. Decode the unverified header for `kid` and the declared algorithm
/// 2. Reject algorithms outside the allow-list (downgrade/confusion guard)
/// 3. Resolve the key via [`KeyCache`] (fetches from the issuer on miss)
/// 4. Reject tokens whose declared algorithm disagrees with the key's type
/// 5. Verify the signature and `exp`
/// 6. Check `iss` and `aud` against the configured expectations
/// 7. Build the [`Principal`] from `sub`, `email`, and `custom:role`
///
/// Failures short-circuit at the first failing step, so an expired or
/// forged token never reaches authorization.
pub struct TokenVerifier {
    keys: Arc<KeyCache>,
    issuer: String,
    audience: String,
}

impl TokenVerifier {
    /// Creates a verifier over the given key cache and expectations.
    #[must_use]
    pub fn new(keys: Arc<KeyCache>, config: VerifierConfig) -> Self {
        Self { keys, issuer: config.issuer, audience: config.audience }
    }

    /// Verifies a bearer token and extracts the calling principal.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Malformed`] — token or header cannot be decoded, or `kid` is missing
    /// - [`AuthError::UnsupportedAlgorithm`] — declared algorithm outside the allow-list, or
    ///   disagreeing with the resolved key's type
    /// - [`AuthError::UnknownKey`] — `kid` absent from the issuer's current key set
    /// - [`AuthError::InvalidSignature`] — signature does not verify
    /// - [`AuthError::Expired`] — `exp` is in the past
    /// - [`AuthError::ClaimMismatch`] — `iss`/`aud` mismatch, empty `sub`, or unrecognized role
    /// - [`AuthError::IssuerUnavailable`] — key fetch failed with no usable fallback
    #[tracing::instrument(skip(self, token))]
    pub async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let header = decode_header(token)
            .map_err(|e| AuthError::malformed(format!("failed to decode token header: {e}")))?;

        validate_algorithm(algorithm_name(header.alg))?;

        let kid = header
            .kid
            .ok_or_else(|| AuthError::malformed("token header missing `kid`"))?;
        validate_kid(&kid)?;

        let key = self.keys.get_verification_key(&kid).await?;

        // A token must use exactly the algorithm its key was published for.
        if header.alg != key.algorithm {
            return Err(AuthError::unsupported_algorithm(format!(
                "token declares {} but key '{kid}' verifies {}",
                algorithm_name(header.alg),
                algorithm_name(key.algorithm)
            )));
        }

        let mut validation = Validation::new(key.algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let token_data = decode::<Claims>(token, &key.decoding, &validation)?;
        let claims = token_data.claims;

        if claims.sub.is_empty() {
            return Err(AuthError::claim_mismatch("`sub` claim is empty"));
        }

        if claims.iss != self.issuer {
            return Err(AuthError::claim_mismatch(format!(
                "issuer: expected '{}', got '{}'",
                self.issuer, claims.iss
            )));
        }

        match claims.aud.as_deref() {
            Some(aud) if aud == self.audience => {},
            Some(aud) => {
                return Err(AuthError::claim_mismatch(format!(
                    "audience: expected '{}', got '{aud}'",
                    self.audience
                )));
            },
            None => return Err(AuthError::claim_mismatch("`aud` claim is missing")),
        }

        let role = match claims.role.as_deref() {
            None => Role::Participant,
            Some(value) => Role::from_claim(value).ok_or_else(|| {
                AuthError::claim_mismatch(format!("unrecognized role claim '{value}'"))
            })?,
        };

        tracing::debug!(sub = %claims.sub, %role, "token verified");

        Ok(Principal {
            id: claims.sub,
            email: claims.email.unwrap_or_default(),
            role,
        })
    }
}
