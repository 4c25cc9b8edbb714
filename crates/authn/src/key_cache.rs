//! Issuer key cache for token verification.
//!
//! This module provides [`KeyCache`], which wraps a [`KeySetClient`] with
//! in-memory caching so token verification does not hit the issuer's key
//! endpoint on every call.
//!
//! # Architecture
//!
//! ```text
//! token arrives → extract kid
//!               → check local cache (L1, TTL-bounded)
//!               → miss? acquire the single-flight guard, re-check L1
//!               → still miss? fetch the full key set from the issuer
//!               → populate L1 + fallback for every usable descriptor
//!               → verify signature
//! ```
//!
//! # Cache Strategy
//!
//! - **L1 TTL**: Default 300 seconds; a revoked key stops verifying within this window
//! - **Fallback TTL**: Default 1 hour; bounds staleness when the issuer is unreachable
//! - **Single-flight**: Concurrent misses coalesce on one guard so a cache stampede produces
//!   exactly one outstanding fetch
//!
//! # Graceful Degradation
//!
//! When the key-set fetch fails transiently (connection error or timeout)
//! and stale-serving is enabled, the cache falls back to the most recently
//! fetched copy of the key, bounded by the fallback TTL. Fetch failures
//! never evict still-valid entries. Definitive bad responses (a document
//! that does not parse) are not served from fallback.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use jsonwebtoken::{Algorithm, DecodingKey};
use moka::future::Cache;
use serde::{Deserialize, Serialize};

use crate::{error::AuthError, keyset::KeySetClient, validation::validate_kid};

/// Default L1 cache TTL (5 minutes).
///
/// This balances security (rotated-out keys stop verifying within this
/// window) with performance (reduces issuer round-trips).
pub const DEFAULT_KEY_TTL: Duration = Duration::from_secs(300);

/// Default maximum TTL for the fallback cache (1 hour).
///
/// Entries older than this are evicted even if the issuer remains
/// unreachable, bounding the window during which a rotated-out key could
/// still verify tokens during an outage.
pub const DEFAULT_FALLBACK_TTL: Duration = Duration::from_secs(3_600);

/// Default maximum cache capacity (both tiers).
pub const DEFAULT_CACHE_CAPACITY: u64 = 1_024;

/// A resolved verification key: decoding material plus the algorithm the
/// key was published for.
///
/// The verifier cross-checks [`algorithm`](Self::algorithm) against the
/// token header's declared algorithm before verifying the signature.
#[derive(Clone)]
pub struct VerificationKey {
    /// Decoding key for signature verification.
    pub decoding: Arc<DecodingKey>,
    /// The only algorithm this key verifies.
    pub algorithm: Algorithm,
}

/// An entry in the fallback cache, carrying the key along with the
/// timestamp at which it was inserted so stale-serve events can log the
/// entry age.
#[derive(Clone)]
struct FallbackEntry {
    key: VerificationKey,
    inserted_at: Instant,
}

/// Configuration for [`KeyCache`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyCacheConfig {
    /// L1 cache TTL.
    #[serde(with = "humantime_serde", default = "default_key_ttl")]
    pub ttl: Duration,

    /// Maximum staleness for fallback entries.
    #[serde(with = "humantime_serde", default = "default_fallback_ttl")]
    pub fallback_ttl: Duration,

    /// Maximum number of keys held in each tier.
    #[serde(default = "default_capacity")]
    pub capacity: u64,

    /// Whether transient fetch failures may be served from the fallback
    /// tier. Disable for a stricter posture where an issuer outage fails
    /// verification immediately.
    #[serde(default = "default_serve_stale")]
    pub serve_stale: bool,
}

fn default_key_ttl() -> Duration {
    DEFAULT_KEY_TTL
}

fn default_fallback_ttl() -> Duration {
    DEFAULT_FALLBACK_TTL
}

fn default_capacity() -> u64 {
    DEFAULT_CACHE_CAPACITY
}

fn default_serve_stale() -> bool {
    true
}

impl Default for KeyCacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_key_ttl(),
            fallback_ttl: default_fallback_ttl(),
            capacity: default_capacity(),
            serve_stale: default_serve_stale(),
        }
    }
}

/// Cache for the issuer's public signing keys, keyed by `kid`.
///
/// Wraps a [`KeySetClient`] with a TTL cache and a staleness-bounded
/// fallback tier. A cache miss fetches the issuer's *full* key set and
/// populates every usable descriptor, so one fetch warms the cache for all
/// current keys.
///
/// # Stampede Protection
///
/// Concurrent misses — for the same `kid` or for different kids — coalesce
/// on an internal single-flight guard: the first caller fetches, every
/// other caller waits and then finds the cache populated. There is never
/// more than one outstanding key-set fetch.
pub struct KeyCache {
    /// TTL-bounded primary cache (L1).
    cache: Cache<String, VerificationKey>,
    /// Staleness-bounded fallback for issuer outages.
    fallback: Cache<String, FallbackEntry>,
    /// Collaborator that fetches the issuer's published key set.
    client: Arc<dyn KeySetClient>,
    /// Single-flight guard for key-set fetches.
    fetch_guard: tokio::sync::Mutex<()>,
    /// Whether transient fetch failures may be served from fallback.
    serve_stale: bool,
}

impl KeyCache {
    /// Creates a key cache with default capacity and fallback TTL.
    #[must_use]
    pub fn new(client: Arc<dyn KeySetClient>, ttl: Duration) -> Self {
        Self::with_capacity(client, ttl, DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a key cache with a custom capacity for both tiers.
    #[must_use]
    pub fn with_capacity(client: Arc<dyn KeySetClient>, ttl: Duration, capacity: u64) -> Self {
        Self::with_fallback_ttl(client, ttl, capacity, DEFAULT_FALLBACK_TTL)
    }

    /// Creates a key cache with custom capacity and fallback TTL.
    ///
    /// The `fallback_ttl` bounds the maximum staleness of fallback entries:
    /// after this duration they are evicted even if the issuer remains
    /// unreachable.
    #[must_use]
    pub fn with_fallback_ttl(
        client: Arc<dyn KeySetClient>,
        ttl: Duration,
        capacity: u64,
        fallback_ttl: Duration,
    ) -> Self {
        Self {
            cache: Cache::builder().time_to_live(ttl).max_capacity(capacity).build(),
            fallback: Cache::builder().time_to_live(fallback_ttl).max_capacity(capacity).build(),
            client,
            fetch_guard: tokio::sync::Mutex::new(()),
            serve_stale: true,
        }
    }

    /// Creates a key cache from a [`KeyCacheConfig`].
    #[must_use]
    pub fn from_config(client: Arc<dyn KeySetClient>, config: &KeyCacheConfig) -> Self {
        Self::with_fallback_ttl(client, config.ttl, config.capacity, config.fallback_ttl)
            .serve_stale(config.serve_stale)
    }

    /// Sets whether transient fetch failures may be served from fallback.
    #[must_use]
    pub fn serve_stale(mut self, serve_stale: bool) -> Self {
        self.serve_stale = serve_stale;
        self
    }

    /// Returns the verification key for the given `kid`.
    ///
    /// Checks the L1 cache first, then fetches the issuer's full key set on
    /// a miss, coalescing concurrent fetches into one.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Malformed`] if the `kid` fails shape validation
    /// - [`AuthError::UnknownKey`] if the issuer's current key set has no such key
    /// - [`AuthError::IssuerUnavailable`] if the fetch fails and no fallback entry is available
    #[tracing::instrument(skip(self))]
    pub async fn get_verification_key(&self, kid: &str) -> Result<VerificationKey, AuthError> {
        validate_kid(kid)?;

        if let Some(key) = self.cache.get(kid).await {
            tracing::debug!(kid, "key cache hit");
            return Ok(key);
        }
        tracing::debug!(kid, "key cache miss");

        // Single-flight: only one caller fetches; everyone else waits here
        // and then re-checks the cache the winning fetch populated.
        let _guard = self.fetch_guard.lock().await;
        if let Some(key) = self.cache.get(kid).await {
            tracing::debug!(kid, "key cache hit after coalesced fetch");
            return Ok(key);
        }

        match self.client.fetch_key_set().await {
            Ok(key_set) => {
                let mut found = None;
                for descriptor in &key_set.keys {
                    let key = match descriptor
                        .algorithm()
                        .and_then(|alg| Ok((alg, descriptor.to_decoding_key()?)))
                    {
                        Ok((algorithm, decoding)) => {
                            VerificationKey { decoding: Arc::new(decoding), algorithm }
                        },
                        Err(err) => {
                            tracing::warn!(
                                kid = %descriptor.kid,
                                error = %err,
                                "skipping unusable key descriptor"
                            );
                            continue;
                        },
                    };

                    self.cache.insert(descriptor.kid.clone(), key.clone()).await;
                    self.fallback
                        .insert(
                            descriptor.kid.clone(),
                            FallbackEntry { key: key.clone(), inserted_at: Instant::now() },
                        )
                        .await;

                    if descriptor.kid == kid {
                        found = Some(key);
                    }
                }

                found.ok_or_else(|| {
                    tracing::debug!(kid, "kid absent from fetched key set");
                    AuthError::unknown_key(kid)
                })
            },
            Err(err) if err.is_transient() && self.serve_stale => {
                if let Some(entry) = self.fallback.get(kid).await {
                    tracing::warn!(
                        kid,
                        fallback_age_secs = entry.inserted_at.elapsed().as_secs(),
                        error = %err,
                        "issuer unreachable, serving stale key from fallback"
                    );
                    return Ok(entry.key);
                }
                Err(AuthError::IssuerUnavailable(err))
            },
            Err(err) => Err(AuthError::IssuerUnavailable(err)),
        }
    }

    /// Removes a key from both cache tiers.
    ///
    /// Call this when a key is known to be rotated out or compromised; the
    /// next lookup fetches fresh state from the issuer.
    pub async fn invalidate(&self, kid: &str) {
        self.cache.invalidate(kid).await;
        self.fallback.invalidate(kid).await;
        tracing::info!(kid, "invalidated cached verification key");
    }

    /// Returns the current L1 entry count.
    ///
    /// The count is eventually consistent; call [`sync`](Self::sync) first
    /// in tests that assert on it.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Returns the current fallback entry count.
    #[must_use]
    pub fn fallback_entry_count(&self) -> u64 {
        self.fallback.entry_count()
    }

    /// Synchronizes pending cache maintenance so entry counts are accurate.
    pub async fn sync(&self) {
        self.cache.run_pending_tasks().await;
        self.fallback.run_pending_tasks().await;
    }

    /// Clears only the L1 tier, leaving fallback entries intact.
    ///
    /// Used in tests to force an issuer fetch while preserving fallback
    /// entries for degradation scenarios.
    pub async fn clear_l1(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}
