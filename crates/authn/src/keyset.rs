//! Issuer key-set types and fetch client.
//!
//! The issuer publishes its current public signing keys as a JWKS-style
//! document: a set of key descriptors, each addressed by `kid`. This module
//! provides the descriptor types, the [`KeySetClient`] collaborator trait,
//! and the HTTP implementation used in production.
//!
//! # Supported Key Types
//!
//! | `kty` | Algorithm | Material |
//! |-------|-----------|----------|
//! | `OKP` | EdDSA     | `crv: "Ed25519"`, `x` (base64url, 32 bytes) |
//! | `RSA` | RS256     | `n`, `e` (base64url) |
//!
//! Descriptors of any other type are skipped with a warning when the cache
//! ingests a fetched key set; they never cause the whole set to be rejected.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{PUBLIC_KEY_LENGTH, VerifyingKey};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{AuthError, KeySetError};

/// Default total request timeout for key-set fetches.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout for key-set fetches.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// A single public key descriptor from the issuer's key set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    /// Key identifier, matched against the token header's `kid`.
    pub kid: String,
    /// Key type: `OKP` (Ed25519) or `RSA`.
    pub kty: String,
    /// Optional algorithm hint; when present it must agree with `kty`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Optional intended-use marker (`sig`).
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// Curve name for `OKP` keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    /// Public key bytes for `OKP` keys (base64url, no padding).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// Modulus for `RSA` keys (base64url, no padding).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// Public exponent for `RSA` keys (base64url, no padding).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl KeyDescriptor {
    /// Returns the signature algorithm this key verifies.
    ///
    /// The verifier cross-checks this against the token header's declared
    /// algorithm, so a token cannot pick a different algorithm than the key
    /// was published for.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKeyMaterial`] for unsupported key types or
    /// when the descriptor's `alg` hint disagrees with its `kty`.
    pub fn algorithm(&self) -> Result<Algorithm, AuthError> {
        let expected = match self.kty.as_str() {
            "OKP" => Algorithm::EdDSA,
            "RSA" => Algorithm::RS256,
            other => {
                return Err(AuthError::invalid_key_material(format!(
                    "unsupported key type '{other}'"
                )));
            },
        };

        if let Some(alg) = self.alg.as_deref()
            && alg != algorithm_name(expected)
        {
            return Err(AuthError::invalid_key_material(format!(
                "key '{}' declares alg '{alg}' but key type '{}' implies '{}'",
                self.kid,
                self.kty,
                algorithm_name(expected)
            )));
        }

        Ok(expected)
    }

    /// Converts the descriptor into a [`DecodingKey`] for signature
    /// verification.
    ///
    /// Ed25519 material is length-checked and parsed with `ed25519-dalek`
    /// before being accepted; the raw bytes are wrapped in [`Zeroizing`] so
    /// they are scrubbed from memory when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidKeyMaterial`] if required fields are
    /// missing or the material does not parse.
    pub fn to_decoding_key(&self) -> Result<DecodingKey, AuthError> {
        match self.kty.as_str() {
            "OKP" => {
                match self.crv.as_deref() {
                    Some("Ed25519") => {},
                    Some(other) => {
                        return Err(AuthError::invalid_key_material(format!(
                            "unsupported OKP curve '{other}'"
                        )));
                    },
                    None => {
                        return Err(AuthError::invalid_key_material("OKP key missing 'crv'"));
                    },
                }
                let x = self
                    .x
                    .as_deref()
                    .ok_or_else(|| AuthError::invalid_key_material("OKP key missing 'x'"))?;

                let public_key_bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
                    URL_SAFE_NO_PAD.decode(x.as_bytes()).map_err(|e| {
                        AuthError::invalid_key_material(format!("base64 decode: {e}"))
                    })?,
                );

                if public_key_bytes.len() != PUBLIC_KEY_LENGTH {
                    return Err(AuthError::invalid_key_material(format!(
                        "expected {PUBLIC_KEY_LENGTH} bytes, got {}",
                        public_key_bytes.len()
                    )));
                }

                // Parse to confirm the bytes are a valid Ed25519 point.
                let key_bytes: Zeroizing<[u8; PUBLIC_KEY_LENGTH]> = Zeroizing::new(
                    public_key_bytes[..PUBLIC_KEY_LENGTH]
                        .try_into()
                        .map_err(|_| AuthError::invalid_key_material("failed to convert bytes"))?,
                );
                let _verifying_key = VerifyingKey::from_bytes(&key_bytes).map_err(|e| {
                    AuthError::invalid_key_material(format!("invalid Ed25519 key: {e}"))
                })?;

                drop(key_bytes);
                drop(public_key_bytes);

                DecodingKey::from_ed_components(x)
                    .map_err(|e| AuthError::invalid_key_material(e.to_string()))
            },
            "RSA" => {
                let n = self
                    .n
                    .as_deref()
                    .ok_or_else(|| AuthError::invalid_key_material("RSA key missing 'n'"))?;
                let e = self
                    .e
                    .as_deref()
                    .ok_or_else(|| AuthError::invalid_key_material("RSA key missing 'e'"))?;

                DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| AuthError::invalid_key_material(e.to_string()))
            },
            other => {
                Err(AuthError::invalid_key_material(format!("unsupported key type '{other}'")))
            },
        }
    }
}

/// The issuer's published key set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KeySet {
    /// Current public key descriptors, each addressed by `kid`.
    pub keys: Vec<KeyDescriptor>,
}

/// Returns the canonical name of an algorithm as it appears in a token
/// header and in [`ACCEPTED_ALGORITHMS`](crate::validation::ACCEPTED_ALGORITHMS).
pub(crate) fn algorithm_name(alg: Algorithm) -> &'static str {
    match alg {
        Algorithm::EdDSA => "EdDSA",
        Algorithm::RS256 => "RS256",
        Algorithm::RS384 => "RS384",
        Algorithm::RS512 => "RS512",
        Algorithm::HS256 => "HS256",
        Algorithm::HS384 => "HS384",
        Algorithm::HS512 => "HS512",
        Algorithm::ES256 => "ES256",
        Algorithm::ES384 => "ES384",
        Algorithm::PS256 => "PS256",
        Algorithm::PS384 => "PS384",
        Algorithm::PS512 => "PS512",
    }
}

/// Collaborator that fetches the issuer's current key set.
///
/// Constructed once at process start and passed into
/// [`KeyCache`](crate::key_cache::KeyCache) — no ambient singletons.
#[async_trait]
pub trait KeySetClient: Send + Sync {
    /// Fetches the issuer's full current key set.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError`] when the endpoint cannot be reached, responds
    /// with an error status, or returns a document that does not parse.
    async fn fetch_key_set(&self) -> Result<KeySet, KeySetError>;
}

/// HTTP implementation of [`KeySetClient`].
///
/// Every request carries both a connection timeout and a total request
/// timeout, so a hung issuer endpoint cannot stall token verification
/// indefinitely.
pub struct HttpKeySetClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpKeySetClient {
    /// Creates a client for the given key endpoint URL with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::Http`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, KeySetError> {
        Self::with_timeouts(endpoint, DEFAULT_REQUEST_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Creates a client with explicit request and connection timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`KeySetError::Http`] if the underlying HTTP client cannot be
    /// constructed.
    pub fn with_timeouts(
        endpoint: impl Into<String>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, KeySetError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| KeySetError::http_with_source("failed to build HTTP client", e))?;

        Ok(Self { client, endpoint: endpoint.into() })
    }
}

#[async_trait]
impl KeySetClient for HttpKeySetClient {
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch_key_set(&self) -> Result<KeySet, KeySetError> {
        let response = self.client.get(&self.endpoint).send().await.map_err(|e| {
            if e.is_timeout() {
                KeySetError::Timeout
            } else {
                KeySetError::http_with_source("request failed", e)
            }
        })?;

        let response = response
            .error_for_status()
            .map_err(|e| KeySetError::http_with_source("issuer returned error status", e))?;

        let key_set: KeySet = response.json().await.map_err(|e| {
            if e.is_timeout() {
                KeySetError::Timeout
            } else if e.is_decode() {
                KeySetError::decode(e.to_string())
            } else {
                KeySetError::http_with_source("failed to read response body", e)
            }
        })?;

        tracing::debug!(keys = key_set.keys.len(), "fetched issuer key set");
        Ok(key_set)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testutil::generate_keypair;

    fn okp_descriptor(kid: &str, x: &str) -> KeyDescriptor {
        KeyDescriptor {
            kid: kid.into(),
            kty: "OKP".into(),
            alg: Some("EdDSA".into()),
            key_use: Some("sig".into()),
            crv: Some("Ed25519".into()),
            x: Some(x.into()),
            n: None,
            e: None,
        }
    }

    #[test]
    fn test_okp_descriptor_to_decoding_key() {
        let (_, x) = generate_keypair();
        let descriptor = okp_descriptor("kid-001", &x);

        assert!(descriptor.to_decoding_key().is_ok());
        assert_eq!(descriptor.algorithm().unwrap(), Algorithm::EdDSA);
    }

    #[test]
    fn test_okp_descriptor_bad_base64() {
        let mut descriptor = okp_descriptor("kid-001", "not-valid!!!");
        descriptor.alg = None;

        let result = descriptor.to_decoding_key();
        assert!(matches!(result, Err(AuthError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn test_okp_descriptor_wrong_length() {
        let descriptor = okp_descriptor("kid-001", "AAAA");
        let result = descriptor.to_decoding_key();
        assert!(
            matches!(result, Err(AuthError::InvalidKeyMaterial(ref msg)) if msg.contains("expected 32 bytes"))
        );
    }

    #[test]
    fn test_okp_descriptor_missing_curve() {
        let (_, x) = generate_keypair();
        let mut descriptor = okp_descriptor("kid-001", &x);
        descriptor.crv = None;

        let result = descriptor.to_decoding_key();
        assert!(
            matches!(result, Err(AuthError::InvalidKeyMaterial(ref msg)) if msg.contains("missing 'crv'"))
        );
    }

    #[test]
    fn test_rsa_descriptor_requires_components() {
        let descriptor = KeyDescriptor {
            kid: "rsa-001".into(),
            kty: "RSA".into(),
            alg: Some("RS256".into()),
            key_use: Some("sig".into()),
            crv: None,
            x: None,
            n: None,
            e: None,
        };

        assert_eq!(descriptor.algorithm().unwrap(), Algorithm::RS256);
        let result = descriptor.to_decoding_key();
        assert!(
            matches!(result, Err(AuthError::InvalidKeyMaterial(ref msg)) if msg.contains("missing 'n'"))
        );
    }

    #[test]
    fn test_alg_hint_must_agree_with_key_type() {
        let (_, x) = generate_keypair();
        let mut descriptor = okp_descriptor("kid-001", &x);
        descriptor.alg = Some("RS256".into());

        let result = descriptor.algorithm();
        assert!(matches!(result, Err(AuthError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn test_unknown_key_type_rejected() {
        let descriptor = KeyDescriptor {
            kid: "ec-001".into(),
            kty: "EC".into(),
            alg: None,
            key_use: None,
            crv: Some("P-256".into()),
            x: None,
            n: None,
            e: None,
        };

        assert!(matches!(descriptor.algorithm(), Err(AuthError::InvalidKeyMaterial(_))));
        assert!(matches!(descriptor.to_decoding_key(), Err(AuthError::InvalidKeyMaterial(_))));
    }

    #[test]
    fn test_key_set_parses_jwks_document() {
        let json = r#"{
            "keys": [
                {"kid": "a", "kty": "OKP", "crv": "Ed25519", "x": "abc", "use": "sig"},
                {"kid": "b", "kty": "RSA", "n": "abc", "e": "AQAB", "alg": "RS256"}
            ]
        }"#;

        let set: KeySet = serde_json::from_str(json).unwrap();
        assert_eq!(set.keys.len(), 2);
        assert_eq!(set.keys[0].kid, "a");
        assert_eq!(set.keys[0].key_use.as_deref(), Some("sig"));
        assert_eq!(set.keys[1].kty, "RSA");
    }
}
