//! # Muster Registry
//!
//! Event registration core: a capacity-enforcing enrollment ledger and a
//! reviewable registration request workflow.
//!
//! This crate provides:
//! - **[`RegistrationLedger`]**: at-most-`capacity` membership and at-most-once enrollment per
//!   principal, enforced by atomic conditional writes under concurrent access
//! - **[`RequestWorkflow`]**: the `PENDING → APPROVED | REJECTED` request lifecycle, with the
//!   approval and its enrollment committed as one all-or-nothing step
//! - **[`EventStore`]**: organizer-side event creation, lookup, and listing
//! - **[`Notifier`]**: the fire-and-forget confirmation-delivery collaborator
//!
//! # Concurrency Model
//!
//! The backing store is the only shared mutable resource. Every
//! capacity- or duplicate-sensitive mutation is a conditional write
//! (compare-and-set, or buffered CAS inside a transaction) — never a
//! read-then-write sequence — so concurrent callers cannot both observe
//! capacity available and both commit. Lost conditional writes retry a
//! bounded number of times with jittered backoff; business rejections
//! (`Full`, `AlreadyRegistered`, `InsufficientRole`) are never retried.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use chrono::Utc;
//! use muster_registry::{
//!     EventStore, LogNotifier, NewEvent, RegistrationFields, RegistrationLedger,
//!     RequestWorkflow,
//! };
//! use muster_storage::MemoryBackend;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = Arc::new(MemoryBackend::new());
//! let events = EventStore::new(Arc::clone(&backend));
//! let ledger = RegistrationLedger::new(Arc::clone(&backend));
//! let workflow = RequestWorkflow::new(backend, ledger.clone(), Arc::new(LogNotifier));
//!
//! let event = events
//!     .create_event(NewEvent {
//!         organizer_id: "org-1".into(),
//!         title: "Rust Workshop".into(),
//!         starts_at: Utc::now(),
//!         location: "Hall A".into(),
//!         capacity: 30,
//!     })
//!     .await
//!     .unwrap();
//!
//! let request = workflow
//!     .submit(event.id, "user-1", RegistrationFields {
//!         full_name: "Ada Lovelace".into(),
//!         email: "ada@example.com".into(),
//!         college_name: "Analytical College".into(),
//!         year_of_study: "3".into(),
//!         phone_number: "+1-555-0100".into(),
//!         why_interested: "Systems programming".into(),
//!     })
//!     .await
//!     .unwrap();
//! # let _ = request;
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Registry error types.
pub mod error;
/// Organizer-side event store.
pub mod events;
mod keys;
/// Registration ledger.
pub mod ledger;
/// Notification collaborator.
pub mod notify;
/// Bounded retry with backoff.
pub mod retry;
/// Domain records.
pub mod types;
/// Registration request workflow.
pub mod workflow;

// Re-export primary types at crate root for convenience
pub use error::{RegistrationError, WorkflowError};
pub use events::{EventStore, NewEvent};
pub use ledger::RegistrationLedger;
pub use notify::{EventSummary, LogNotifier, Notifier, NotifyError, RegistrationSummary};
pub use retry::RetryConfig;
pub use types::{
    Event, EventId, EventStatus, RegistrationFields, RegistrationRequest, RequestId, RequestStatus,
};
pub use workflow::RequestWorkflow;
