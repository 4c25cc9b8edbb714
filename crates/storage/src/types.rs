//! Common types used across storage operations.

use bytes::Bytes;

/// Key-value pair returned from range queries.
///
/// Contains the key and its associated value as byte sequences.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use muster_storage::KeyValue;
///
/// let kv = KeyValue {
///     key: Bytes::from("event/42"),
///     value: Bytes::from(r#"{"title":"Rust Meetup"}"#),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The key identifying this entry.
    pub key: Bytes,

    /// The value stored at this key.
    pub value: Bytes,
}

impl KeyValue {
    /// Creates a new key-value pair.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }
}
