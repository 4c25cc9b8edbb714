//! Storage backend trait definition.
//!
//! This module defines the [`StorageBackend`] trait, the core abstraction for
//! key-value storage in Muster. All storage implementations (the in-memory
//! backend, a database-backed backend, etc.) implement this trait.
//!
//! # Design Philosophy
//!
//! The trait provides a minimal, generic key-value interface:
//! - **Keys and values are bytes**: No assumptions about serialization format
//! - **Async by default**: All operations are async for non-blocking I/O
//! - **Range queries supported**: Efficient prefix scans and ordered iteration
//! - **Conditional writes**: Atomic compare-and-set, plus multi-key transactions
//!
//! Domain-specific logic (events, registration requests, indexes) lives in the
//! registry layer built on top of this trait, not in the storage backends.
//!
//! # Implementing a Backend
//!
//! To implement a new storage backend:
//!
//! 1. Implement the [`StorageBackend`] trait
//! 2. Implement a corresponding [`Transaction`] type
//! 3. Map backend-specific errors to [`StorageError`](crate::StorageError)
//! 4. Bound every network operation with a timeout, surfacing
//!    [`StorageError::Timeout`](crate::StorageError::Timeout) rather than
//!    blocking indefinitely
//!
//! See [`MemoryBackend`](crate::MemoryBackend) for a reference implementation.

use std::ops::RangeBounds;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::StorageResult, transaction::Transaction, types::KeyValue};

/// Abstract storage backend for key-value operations.
///
/// This trait defines the interface that all storage backends must implement.
/// Backends are expected to be thread-safe (`Send + Sync`) and support
/// concurrent operations.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageBackend::get) | Retrieve a single value by key |
/// | [`set`](StorageBackend::set) | Store a key-value pair |
/// | [`compare_and_set`](StorageBackend::compare_and_set) | Atomic compare-and-swap |
/// | [`delete`](StorageBackend::delete) | Remove a key |
/// | [`get_range`](StorageBackend::get_range) | Retrieve multiple keys in a range |
/// | [`transaction`](StorageBackend::transaction) | Begin an atomic transaction |
/// | [`health_check`](StorageBackend::health_check) | Verify backend availability |
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use muster_storage::{MemoryBackend, StorageBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
///
/// backend.set(b"key".to_vec(), b"value".to_vec()).await.unwrap();
/// let value = backend.get(b"key").await.unwrap();
/// assert_eq!(value, Some(Bytes::from("value")));
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the key exists
    /// - `Ok(None)` if the key doesn't exist
    /// - `Err(...)` on storage errors
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores a key-value pair.
    ///
    /// If the key already exists, its value is overwritten.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Atomically sets a key's value if it matches the expected current value.
    ///
    /// Compare-and-set (CAS) reads the current value and conditionally updates
    /// it in a single atomic step. This is the primitive that makes
    /// check-then-act sequences safe under concurrency: two callers cannot
    /// both observe a condition and both commit, because the second commit
    /// fails its precondition.
    ///
    /// # Semantics
    ///
    /// The `expected` parameter controls the precondition:
    ///
    /// - **`expected: None`** — insert-if-absent. Succeeds only when the key does not exist. Fails
    ///   with [`Conflict`](crate::StorageError::Conflict) if any value is present.
    /// - **`expected: Some(value)`** — update-if-unchanged. Succeeds only when the current value is
    ///   an exact byte-for-byte match of `value`. Fails with
    ///   [`Conflict`](crate::StorageError::Conflict) if the key is absent or holds a different
    ///   value.
    ///
    /// # Byte Comparison Rules
    ///
    /// The comparison is an exact, length-sensitive byte equality check. There
    /// is no normalization or encoding-aware comparison — callers must ensure
    /// the expected value is byte-identical to the stored value. If you
    /// serialize structured data before storing it, the byte representation
    /// must be deterministic across serialization calls (`serde_json`
    /// serializes struct fields in declaration order, which is deterministic;
    /// `HashMap` entries are not — prefer `BTreeMap` or struct types for CAS
    /// values).
    ///
    /// # Retry Pattern
    ///
    /// `Conflict` is **not** transient
    /// ([`is_transient()`](crate::StorageError::is_transient) returns `false`).
    /// Callers that want the write to happen implement an application-level
    /// CAS loop: re-read the current value, re-evaluate the condition against
    /// fresh state, and re-issue the conditional write.
    ///
    /// # Examples
    ///
    /// Insert a key only if it does not already exist:
    ///
    /// ```
    /// use muster_storage::{MemoryBackend, StorageBackend};
    ///
    /// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
    /// let backend = MemoryBackend::new();
    ///
    /// // Insert-if-absent: succeeds because key is new
    /// backend.compare_and_set(b"lock", None, b"holder-1".to_vec()).await.unwrap();
    ///
    /// // Insert-if-absent again: fails with Conflict because key already exists
    /// let result = backend.compare_and_set(b"lock", None, b"holder-2".to_vec()).await;
    /// assert!(result.is_err());
    /// # });
    /// ```
    #[must_use = "compare-and-set may fail with a conflict and errors must be handled"]
    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()>;

    /// Removes a key.
    ///
    /// Deleting a non-existent key is not an error.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Retrieves all key-value pairs within a key range, in key order.
    ///
    /// Used for prefix scans over index entries (e.g., all events owned by
    /// one organizer).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>> + Send;

    /// Begins an atomic transaction.
    ///
    /// All operations buffered on the returned [`Transaction`] are applied
    /// atomically at commit time; compare-and-set preconditions are evaluated
    /// at commit under the backend's write protection. If any precondition
    /// fails, nothing is applied and the commit returns
    /// [`Conflict`](crate::StorageError::Conflict).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>>;

    /// Verifies the backend is reachable and able to serve requests.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn health_check(&self) -> StorageResult<()>;
}
