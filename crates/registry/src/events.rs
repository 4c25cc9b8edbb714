//! Organizer-side event store.
//!
//! Creation, lookup, and listing of events. The participant set is never
//! touched here — it belongs to the
//! [`RegistrationLedger`](crate::ledger::RegistrationLedger). Role
//! enforcement for organizer operations is composed at the service edge,
//! where the verified principal is in hand.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use muster_storage::{StorageBackend, StorageError};

use crate::{
    error::RegistrationError,
    keys,
    retry::{RetryConfig, backoff_delay},
    types::{Event, EventId, EventStatus},
};

/// Input for creating a new event.
#[derive(Clone, Debug)]
pub struct NewEvent {
    /// Principal id of the authoring organizer.
    pub organizer_id: String,
    /// Human-readable title.
    pub title: String,
    /// Scheduled start time.
    pub starts_at: DateTime<Utc>,
    /// Venue description.
    pub location: String,
    /// Maximum number of participants.
    pub capacity: u32,
}

/// Event record store with an organizer index.
pub struct EventStore<B> {
    backend: Arc<B>,
    retry: RetryConfig,
}

impl<B> Clone for EventStore<B> {
    fn clone(&self) -> Self {
        Self { backend: Arc::clone(&self.backend), retry: self.retry.clone() }
    }
}

impl<B: StorageBackend> EventStore<B> {
    /// Creates an event store over the given backend.
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

    /// Creates a new open event with an empty participant set.
    ///
    /// The event record and its organizer index entry are written in one
    /// atomic transaction, so the index never references a missing event.
    #[tracing::instrument(skip(self, new_event), fields(organizer_id = %new_event.organizer_id))]
    pub async fn create_event(&self, new_event: NewEvent) -> Result<Event, RegistrationError> {
        let event = Event {
            id: EventId::new(),
            organizer_id: new_event.organizer_id,
            title: new_event.title,
            starts_at: new_event.starts_at,
            location: new_event.location,
            capacity: new_event.capacity,
            participants: Default::default(),
            status: EventStatus::Open,
        };

        let mut txn = self.backend.transaction().await?;
        txn.compare_and_set(keys::event_key(event.id), None, keys::encode(&event)?)?;
        txn.set(
            keys::organizer_index_key(&event.organizer_id, event.id),
            event.id.to_string().into_bytes(),
        );
        txn.commit().await?;

        tracing::info!(event_id = %event.id, capacity = event.capacity, "event created");
        Ok(event)
    }

    /// Retrieves an event by id.
    pub async fn event(&self, id: EventId) -> Result<Option<Event>, RegistrationError> {
        match self.backend.get(&keys::event_key(id)).await? {
            Some(bytes) => Ok(Some(keys::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Lists all events, in id order.
    pub async fn events(&self) -> Result<Vec<Event>, RegistrationError> {
        let (start, end) = keys::prefix_range(keys::EVENT_PREFIX.as_bytes());
        let entries = self.backend.get_range(start..end).await?;

        let mut events = Vec::with_capacity(entries.len());
        for entry in entries {
            events.push(keys::decode(&entry.value)?);
        }
        Ok(events)
    }

    /// Lists the events authored by one organizer via the organizer index.
    pub async fn events_by_organizer(
        &self,
        organizer_id: &str,
    ) -> Result<Vec<Event>, RegistrationError> {
        let (start, end) = keys::prefix_range(&keys::organizer_index_prefix(organizer_id));
        let entries = self.backend.get_range(start..end).await?;

        let mut events = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = EventId::parse(
                std::str::from_utf8(&entry.value)
                    .map_err(|e| StorageError::serialization_with_source("corrupt index entry", e))?,
            )
            .map_err(|e| StorageError::serialization_with_source("corrupt index entry", e))?;

            // The index write is transactional with the event write, but an
            // event deleted out-of-band must not fail the whole listing.
            if let Some(event) = self.event(id).await? {
                events.push(event);
            } else {
                tracing::warn!(event_id = %id, organizer_id, "organizer index references missing event");
            }
        }
        Ok(events)
    }

    /// Closes an event so it no longer accepts registrations.
    ///
    /// Idempotent: closing an already-closed event succeeds. The transition
    /// is a conditional write so it cannot clobber a concurrent enrollment.
    #[tracing::instrument(skip(self))]
    pub async fn close_event(&self, id: EventId) -> Result<Event, RegistrationError> {
        let key = keys::event_key(id);

        for attempt in 0..self.retry.max_attempts {
            let Some(current) = self.backend.get(&key).await? else {
                return Err(RegistrationError::EventNotFound { event_id: id });
            };
            let event: Event = keys::decode(&current)?;

            if event.status == EventStatus::Closed {
                return Ok(event);
            }

            let mut updated = event;
            updated.status = EventStatus::Closed;
            let new_bytes = keys::encode(&updated)?;

            match self.backend.compare_and_set(&key, Some(current.as_ref()), new_bytes).await {
                Ok(()) => {
                    tracing::info!(event_id = %id, "event closed");
                    return Ok(updated);
                },
                Err(StorageError::Conflict) => {
                    tokio::time::sleep(backoff_delay(&self.retry, attempt)).await;
                },
                Err(err) => return Err(err.into()),
            }
        }

        Err(RegistrationError::Conflict { attempts: self.retry.max_attempts })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use muster_storage::MemoryBackend;

    use super::*;

    fn new_event(organizer_id: &str, title: &str) -> NewEvent {
        NewEvent {
            organizer_id: organizer_id.into(),
            title: title.into(),
            starts_at: Utc::now(),
            location: "Hall A".into(),
            capacity: 10,
        }
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let backend = Arc::new(MemoryBackend::new());
        let store = EventStore::new(backend);

        let created = store.create_event(new_event("org-1", "Rust Workshop")).await.unwrap();
        assert_eq!(created.status, EventStatus::Open);
        assert!(created.participants.is_empty());

        let fetched = store.event(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);

        assert_eq!(store.event(EventId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_events_lists_all() {
        let backend = Arc::new(MemoryBackend::new());
        let store = EventStore::new(backend);

        store.create_event(new_event("org-1", "First")).await.unwrap();
        store.create_event(new_event("org-2", "Second")).await.unwrap();

        let all = store.events().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_events_by_organizer_uses_index() {
        let backend = Arc::new(MemoryBackend::new());
        let store = EventStore::new(backend);

        let mine = store.create_event(new_event("org-1", "Mine")).await.unwrap();
        store.create_event(new_event("org-2", "Theirs")).await.unwrap();

        let listed = store.events_by_organizer("org-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);

        assert!(store.events_by_organizer("org-3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_event_is_idempotent() {
        let backend = Arc::new(MemoryBackend::new());
        let store = EventStore::new(backend);

        let event = store.create_event(new_event("org-1", "Closing")).await.unwrap();

        let closed = store.close_event(event.id).await.unwrap();
        assert_eq!(closed.status, EventStatus::Closed);

        let again = store.close_event(event.id).await.unwrap();
        assert_eq!(again.status, EventStatus::Closed);
    }

    #[tokio::test]
    async fn test_close_unknown_event() {
        let backend = Arc::new(MemoryBackend::new());
        let store = EventStore::new(backend);

        let result = store.close_event(EventId::new()).await;
        assert!(matches!(result, Err(RegistrationError::EventNotFound { .. })));
    }
}
