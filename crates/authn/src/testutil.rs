//! Shared test utilities for authentication testing.
//!
//! This module provides common helpers for generating Ed25519 key pairs,
//! creating signed tokens, crafting raw token strings (for attack testing),
//! and a configurable in-memory [`KeySetClient`]. It is feature-gated
//! behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! muster-authn = { path = "../authn", features = ["testutil"] }
//! ```

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::SigningKey;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use rand_core::OsRng;
use serde_json::json;
use zeroize::Zeroizing;

use crate::{
    error::KeySetError,
    keyset::{KeyDescriptor, KeySet, KeySetClient},
};

/// Generates a test Ed25519 key pair.
///
/// Returns `(pkcs8_der, public_key_base64url)` where:
/// - `pkcs8_der` is the private key in PKCS#8 DER format wrapped in [`Zeroizing`] (suitable for
///   [`EncodingKey::from_ed_der`])
/// - `public_key_base64url` is the 32-byte public key encoded as base64url without padding
///   (suitable for a [`KeyDescriptor`]'s `x` field)
///
/// Each call generates a fresh random key pair.
pub fn generate_keypair() -> (Zeroizing<Vec<u8>>, String) {
    let signing_key = SigningKey::generate(&mut OsRng);
    let public_key_bytes = signing_key.verifying_key().to_bytes();
    let public_key_b64 = URL_SAFE_NO_PAD.encode(public_key_bytes);

    // Wrap intermediate private bytes in Zeroizing to scrub from memory on drop.
    let private_bytes: Zeroizing<[u8; 32]> = Zeroizing::new(signing_key.to_bytes());
    let mut pkcs8_der = Zeroizing::new(vec![
        0x30, 0x2e, // SEQUENCE, 46 bytes
        0x02, 0x01, 0x00, // INTEGER version 0
        0x30, 0x05, // SEQUENCE, 5 bytes (algorithm identifier)
        0x06, 0x03, 0x2b, 0x65, 0x70, // OID 1.3.101.112 (Ed25519)
        0x04, 0x22, // OCTET STRING, 34 bytes
        0x04, 0x20, // OCTET STRING, 32 bytes (the actual key)
    ]);
    pkcs8_der.extend_from_slice(&*private_bytes);

    (pkcs8_der, public_key_b64)
}

/// Builds an Ed25519 [`KeyDescriptor`] for the given `kid` and public key.
pub fn key_descriptor(kid: &str, public_key_b64: &str) -> KeyDescriptor {
    KeyDescriptor {
        kid: kid.to_string(),
        kty: "OKP".to_string(),
        alg: Some("EdDSA".to_string()),
        key_use: Some("sig".to_string()),
        crv: Some("Ed25519".to_string()),
        x: Some(public_key_b64.to_string()),
        n: None,
        e: None,
    }
}

/// Returns the current time as seconds since the Unix epoch.
pub fn epoch_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before Unix epoch")
        .as_secs()
}

/// Builds a standard claim payload for `sub` against the given issuer and
/// audience, expiring in 1 hour.
///
/// Pass the result to [`signed_token`], editing fields first where a test
/// needs deviation (expired token, wrong audience, extra role claim).
pub fn base_claims(sub: &str, issuer: &str, audience: &str) -> serde_json::Value {
    let now = epoch_now();
    json!({
        "iss": issuer,
        "sub": sub,
        "aud": audience,
        "exp": now + 3600,
        "iat": now,
        "email": format!("{sub}@example.com"),
    })
}

/// Creates a token signed with an Ed25519 key in PKCS#8 DER format.
///
/// The `kid` header is set to the provided value so the verifier can look
/// up the matching public key.
///
/// # Panics
///
/// Panics if encoding fails (should not happen with valid inputs).
pub fn signed_token(pkcs8_der: &[u8], kid: &str, claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::EdDSA);
    header.kid = Some(kid.to_string());

    let encoding_key = EncodingKey::from_ed_der(pkcs8_der);
    jsonwebtoken::encode(&header, claims, &encoding_key).expect("failed to encode test token")
}

/// Creates a raw token string from arbitrary header and payload JSON.
///
/// The resulting token has the structure `{header_b64}.{payload_b64}.` with
/// an empty signature. This is useful for testing rejection of malformed or
/// attack tokens (e.g., `alg: "none"`, algorithm confusion).
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn craft_raw_token(header: &serde_json::Value, payload: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).expect("header json"));
    let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// In-memory [`KeySetClient`] with configurable contents, failure injection,
/// and a fetch counter for stampede assertions.
pub struct StaticKeySetClient {
    keys: Mutex<Vec<KeyDescriptor>>,
    fail_with: Mutex<Option<KeySetError>>,
    fetch_count: AtomicU64,
    delay: Option<Duration>,
}

impl StaticKeySetClient {
    /// Creates a client that serves the given descriptors.
    pub fn new(keys: Vec<KeyDescriptor>) -> Self {
        Self { keys: Mutex::new(keys), fail_with: Mutex::new(None), fetch_count: AtomicU64::new(0), delay: None }
    }

    /// Adds an artificial delay to each fetch, widening race windows in
    /// stampede tests.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replaces the served key set (simulates key rotation).
    pub fn set_keys(&self, keys: Vec<KeyDescriptor>) {
        *self.keys.lock() = keys;
    }

    /// Makes subsequent fetches fail with the given error; `None` restores
    /// normal operation.
    pub fn set_failure(&self, error: Option<KeySetError>) {
        *self.fail_with.lock() = error;
    }

    /// Returns how many fetches have been attempted.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetClient for StaticKeySetClient {
    async fn fetch_key_set(&self) -> Result<KeySet, KeySetError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.fail_with.lock().clone() {
            return Err(err);
        }
        Ok(KeySet { keys: self.keys.lock().clone() })
    }
}

/// Asserts that a `Result<T, AuthError>` is an `Err` matching the given
/// [`AuthError`](crate::error::AuthError) variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use muster_authn::{assert_auth_error, AuthError};
///
/// let result: Result<(), AuthError> = Err(AuthError::Expired);
/// assert_auth_error!(result, Expired);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}
