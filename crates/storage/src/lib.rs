//! Shared storage backend abstraction for Muster services.
//!
//! This crate provides the [`StorageBackend`] trait and related types that form
//! the foundation for all storage operations in Muster. The registry layer
//! builds its event and registration records on top of this abstraction.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! │              (HTTP handlers, external)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  muster-registry                            │
//! │   EventStore │ RegistrationLedger │ RequestWorkflow         │
//! │        (Domain logic, serialization, indexing)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  muster-storage                             │
//! │               StorageBackend trait                          │
//! │  (get, set, compare_and_set, get_range, transaction)        │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryBackend│        database-backed backends              │
//! │   (testing)  │             (production)                     │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Conditional Writes
//!
//! The distinguishing feature of this trait is that every invariant-sensitive
//! mutation can be expressed as a conditional write:
//! [`compare_and_set`](StorageBackend::compare_and_set) for single keys and
//! buffered CAS inside [`Transaction`]s for multi-key commits. Callers never
//! need a separate read-then-write sequence, which would race under
//! concurrency.
//!
//! # Quick Start
//!
//! ```
//! use muster_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"user:123".to_vec(), b"Alice".to_vec()).await?;
//!
//!     let value = backend.get(b"user:123").await?;
//!     assert_eq!(value.map(|b| b.to_vec()), Some(b"Alice".to_vec()));
//!
//!     // Use transactions for atomic multi-key operations
//!     let mut txn = backend.transaction().await?;
//!     txn.set(b"counter".to_vec(), b"1".to_vec());
//!     txn.set(b"updated".to_vec(), b"true".to_vec());
//!     txn.commit().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`], which wraps potential
//! [`StorageError`] variants. Backends should map their internal errors
//! to these standardized error types.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod transaction;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::StorageBackend;
pub use error::{BoxError, StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use transaction::Transaction;
pub use types::KeyValue;
