//! Registration ledger: atomic enrollment into capacity-limited events.
//!
//! The ledger is the sole writer of an event's participant set. Every
//! enrollment is a single conditional mutation: the business conditions
//! (event exists, is open, user not already a member, capacity remains) and
//! the membership insert commit together via compare-and-set against the
//! exact event bytes that were read. Two concurrent callers can therefore
//! never both observe a free seat and both commit — the second one's
//! precondition fails and its whole check-and-write is re-run against fresh
//! state.
//!
//! Contention (a lost compare-and-set) retries with exponential backoff up
//! to a configured attempt bound. Business rejections are surfaced
//! immediately and never retried.

use std::sync::Arc;

use muster_storage::{StorageBackend, StorageError, Transaction};

use crate::{
    error::RegistrationError,
    keys,
    retry::{RetryConfig, backoff_delay},
    types::{Event, EventId, EventStatus},
};

/// Evaluates the enrollment conditions and returns the event with `user_id`
/// admitted.
///
/// Pure: the decision is always made against the snapshot the caller read,
/// and committed with a conditional write against those same bytes.
pub(crate) fn admit(event: &Event, user_id: &str) -> Result<Event, RegistrationError> {
    if event.status != EventStatus::Open {
        return Err(RegistrationError::EventClosed { event_id: event.id });
    }
    if event.participants.contains(user_id) {
        return Err(RegistrationError::AlreadyRegistered {
            event_id: event.id,
            user_id: user_id.to_owned(),
        });
    }
    if event.is_full() {
        return Err(RegistrationError::Full { event_id: event.id });
    }

    let mut updated = event.clone();
    updated.participants.insert(user_id.to_owned());
    Ok(updated)
}

/// Atomically enforces the capacity and duplicate-membership invariants on
/// an event's participant set.
///
/// # Guarantees
///
/// For an event with capacity `C`, after any sequence of concurrent
/// [`try_register`](Self::try_register) calls:
/// - `participants.len() <= C` always holds
/// - each user appears at most once, regardless of interleaving or retries
pub struct RegistrationLedger<B> {
    backend: Arc<B>,
    retry: RetryConfig,
}

impl<B> Clone for RegistrationLedger<B> {
    fn clone(&self) -> Self {
        Self { backend: Arc::clone(&self.backend), retry: self.retry.clone() }
    }
}

impl<B: StorageBackend> RegistrationLedger<B> {
    /// Creates a ledger over the given backend with the default retry
    /// policy.
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend, retry: RetryConfig::default() }
    }

    /// Replaces the retry policy for contended writes.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Enrolls `user_id` into the event, returning the updated event.
    ///
    /// Each attempt re-reads the event, re-evaluates the business
    /// conditions, and commits with a compare-and-set against the bytes it
    /// read. A lost compare-and-set retries after backoff; business
    /// rejections return immediately.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::EventNotFound`] — no such event
    /// - [`RegistrationError::EventClosed`] — event no longer accepts registrations
    /// - [`RegistrationError::AlreadyRegistered`] — user already a member
    /// - [`RegistrationError::Full`] — capacity reached
    /// - [`RegistrationError::Conflict`] — contention outlasted every bounded retry; safe to
    ///   re-issue
    /// - [`RegistrationError::Store`] — backend failure
    #[tracing::instrument(skip(self))]
    pub async fn try_register(
        &self,
        event_id: EventId,
        user_id: &str,
    ) -> Result<Event, RegistrationError> {
        let key = keys::event_key(event_id);

        for attempt in 0..self.retry.max_attempts {
            let Some(current) = self.backend.get(&key).await? else {
                return Err(RegistrationError::EventNotFound { event_id });
            };
            let event: Event = keys::decode(&current)?;

            let updated = admit(&event, user_id)?;
            let new_bytes = keys::encode(&updated)?;

            match self.backend.compare_and_set(&key, Some(current.as_ref()), new_bytes).await {
                Ok(()) => {
                    tracing::debug!(
                        participants = updated.participants.len(),
                        capacity = updated.capacity,
                        "participant enrolled"
                    );
                    return Ok(updated);
                },
                Err(StorageError::Conflict) => {
                    let delay = backoff_delay(&self.retry, attempt);
                    tracing::debug!(
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "enrollment write contended, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(err) => return Err(err.into()),
            }
        }

        tracing::warn!(attempts = self.retry.max_attempts, "enrollment retries exhausted");
        Err(RegistrationError::Conflict { attempts: self.retry.max_attempts })
    }

    /// Stages the enrollment of `user_id` into `txn` as a conditional write
    /// against `current_bytes`.
    ///
    /// Used by the request workflow to commit an approval and its enrollment
    /// as one all-or-nothing transaction. The ledger stays the sole author
    /// of participant-set mutations; the workflow only provides the
    /// transaction they ride in.
    pub(crate) fn stage_enrollment(
        &self,
        txn: &mut dyn Transaction,
        current_bytes: &[u8],
        event: &Event,
        user_id: &str,
    ) -> Result<Event, RegistrationError> {
        let updated = admit(event, user_id)?;
        let new_bytes = keys::encode(&updated)?;
        txn.compare_and_set(keys::event_key(event.id), Some(current_bytes.to_vec()), new_bytes)?;
        Ok(updated)
    }
}
