//! Bounded retry with backoff for contended conditional writes.
//!
//! Retries apply only to write contention ([`StorageError::Conflict`]
//! surfaced from a compare-and-set or transaction commit). Business
//! rejections — full event, duplicate registration, insufficient role —
//! are never retried.
//!
//! # Backoff Strategy
//!
//! Delays use exponential backoff with jitter:
//! - Base delay doubles with each attempt: `initial_backoff * 2^attempt`
//! - Delay is capped at `max_backoff`
//! - Random jitter of 0–50% of the computed delay is added so contending writers don't retry in
//!   lockstep
//!
//! [`StorageError::Conflict`]: muster_storage::StorageError::Conflict

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry policy for contended conditional writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total number of attempts (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration.
    #[serde(with = "humantime_serde", default = "default_initial_backoff")]
    pub initial_backoff: Duration,

    /// Maximum backoff duration.
    #[serde(with = "humantime_serde", default = "default_max_backoff")]
    pub max_backoff: Duration,
}

fn default_max_attempts() -> u32 {
    4
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(25)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(1)
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

/// Computes the backoff delay before retrying after the given zero-based
/// attempt, with exponential growth, a cap, and 0–50% jitter.
pub(crate) fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponential = config
        .initial_backoff
        .saturating_mul(2u32.saturating_pow(attempt.min(16)));
    let capped = exponential.min(config.max_backoff);

    let half_micros = (capped.as_micros() as u64) / 2;
    let jitter = if half_micros == 0 {
        Duration::ZERO
    } else {
        Duration::from_micros(rand::thread_rng().gen_range(0..=half_micros))
    };

    capped + jitter
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.initial_backoff, Duration::from_millis(25));
        assert_eq!(config.max_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_deserialize_humantime() {
        let config: RetryConfig =
            serde_json::from_str(r#"{"max_attempts": 2, "initial_backoff": "10ms"}"#).unwrap();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.initial_backoff, Duration::from_millis(10));
        assert_eq!(config.max_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(80),
        };

        for attempt in 0..10 {
            let delay = backoff_delay(&config, attempt);
            let base = Duration::from_millis(10 * 2u64.pow(attempt.min(16))).min(config.max_backoff);
            assert!(delay >= base, "delay below base at attempt {attempt}");
            // Jitter adds at most 50%
            assert!(delay <= base + base / 2 + Duration::from_micros(1));
        }
    }

    #[test]
    fn test_backoff_huge_attempt_does_not_overflow() {
        let config = RetryConfig::default();
        let delay = backoff_delay(&config, u32::MAX);
        assert!(delay <= config.max_backoff + config.max_backoff / 2);
    }
}
