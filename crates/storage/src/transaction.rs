//! Transaction trait for atomic storage operations.
//!
//! This module defines the [`Transaction`] trait that enables atomic
//! multi-operation commits to storage backends.
//!
//! # Transaction Semantics
//!
//! Transactions provide:
//! - **Atomicity**: All operations in a transaction either succeed together or fail together
//! - **Read-your-writes**: Reads within a transaction see pending writes
//! - **Buffering**: Writes are buffered until commit
//!
//! # Example
//!
//! ```
//! use muster_storage::{MemoryBackend, StorageBackend};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = MemoryBackend::new();
//!
//! backend.set(b"account:alice".to_vec(), b"100".to_vec()).await.unwrap();
//! backend.set(b"account:bob".to_vec(), b"50".to_vec()).await.unwrap();
//!
//! // Atomic transfer via transaction
//! let mut txn = backend.transaction().await.unwrap();
//! txn.set(b"account:alice".to_vec(), b"80".to_vec());
//! txn.set(b"account:bob".to_vec(), b"70".to_vec());
//! txn.commit().await.unwrap();
//!
//! let alice = backend.get(b"account:alice").await.unwrap().unwrap();
//! assert_eq!(&alice[..], b"80");
//! # });
//! ```

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// Transaction handle for atomic multi-operation commits.
///
/// A transaction buffers operations (sets, deletes, and conditional writes)
/// until [`commit`](Transaction::commit) is called, at which point all
/// operations are applied atomically.
///
/// # Concurrency
///
/// Transactions implement optimistic concurrency control. Compare-and-set
/// preconditions are evaluated at commit time; if another writer has modified
/// a guarded key, the commit fails with
/// [`StorageError::Conflict`](crate::StorageError::Conflict) and no operation
/// is applied.
#[async_trait]
pub trait Transaction: Send {
    /// Gets a value within the transaction.
    ///
    /// Checks pending writes first (read-your-writes), then falls back to
    /// the underlying storage.
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Buffers a set operation within the transaction.
    ///
    /// The write is applied atomically with the rest of the transaction when
    /// [`commit`](Transaction::commit) is called.
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Buffers a delete operation within the transaction.
    fn delete(&mut self, key: Vec<u8>);

    /// Buffers a compare-and-set operation within the transaction.
    ///
    /// The condition is checked at commit time, not when this method is
    /// called. If the current value of `key` does not match `expected` at
    /// commit time, the entire transaction fails with
    /// [`StorageError::Conflict`](crate::StorageError::Conflict) and nothing
    /// is applied. Use `expected: None` to require that the key not exist.
    fn compare_and_set(
        &mut self,
        key: Vec<u8>,
        expected: Option<Vec<u8>>,
        new_value: Vec<u8>,
    ) -> StorageResult<()>;

    /// Commits all buffered operations atomically.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`](crate::StorageError::Conflict) if any buffered compare-and-set
    ///   precondition no longer holds
    /// - Other [`StorageError`](crate::StorageError) variants on backend failures
    async fn commit(self: Box<Self>) -> StorageResult<()>;
}
