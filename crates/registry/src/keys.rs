//! Key layout and record codec for the registry's storage footprint.
//!
//! Layout (all keys are UTF-8):
//!
//! ```text
//! event/{event_id}                          → Event (JSON)
//! event-by-organizer/{organizer_id}/{id}    → event id (index)
//! request/{request_id}                      → RegistrationRequest (JSON)
//! request-by-member/{event_id}/{user_id}    → request id (idempotency index)
//! ```
//!
//! Principal ids come from the issuer's `sub` claim and are UUIDs, so key
//! segments never contain `/`.

use muster_storage::StorageError;
use serde::{Serialize, de::DeserializeOwned};

use crate::types::{EventId, RequestId};

pub(crate) const EVENT_PREFIX: &str = "event/";
pub(crate) const ORGANIZER_INDEX_PREFIX: &str = "event-by-organizer/";
pub(crate) const REQUEST_PREFIX: &str = "request/";
pub(crate) const PAIR_INDEX_PREFIX: &str = "request-by-member/";

pub(crate) fn event_key(id: EventId) -> Vec<u8> {
    format!("{EVENT_PREFIX}{id}").into_bytes()
}

pub(crate) fn organizer_index_key(organizer_id: &str, id: EventId) -> Vec<u8> {
    format!("{ORGANIZER_INDEX_PREFIX}{organizer_id}/{id}").into_bytes()
}

pub(crate) fn organizer_index_prefix(organizer_id: &str) -> Vec<u8> {
    format!("{ORGANIZER_INDEX_PREFIX}{organizer_id}/").into_bytes()
}

pub(crate) fn request_key(id: RequestId) -> Vec<u8> {
    format!("{REQUEST_PREFIX}{id}").into_bytes()
}

/// Key of the at-most-one-live-request index entry for `(event, user)`.
pub(crate) fn pair_index_key(event_id: EventId, user_id: &str) -> Vec<u8> {
    format!("{PAIR_INDEX_PREFIX}{event_id}/{user_id}").into_bytes()
}

/// Returns the `[start, end)` byte range covering every key under `prefix`.
pub(crate) fn prefix_range(prefix: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let start = prefix.to_vec();
    let mut end = prefix.to_vec();
    while let Some(last) = end.last_mut() {
        if *last < u8::MAX {
            *last += 1;
            return (start, end);
        }
        end.pop();
    }
    // Prefix was all 0xff bytes; scan to the end of the key space.
    (start, vec![u8::MAX; prefix.len() + 1])
}

/// Encodes a record to its stored JSON bytes.
///
/// Struct fields serialize in declaration order, so the output is
/// deterministic and safe to use as a compare-and-set expectation.
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value)
        .map_err(|e| StorageError::serialization_with_source("failed to encode record", e))
}

/// Decodes a record from its stored JSON bytes.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes)
        .map_err(|e| StorageError::serialization_with_source("failed to decode record", e))
}

/// Decodes the request id held by a pair-index entry.
pub(crate) fn decode_request_id(bytes: &[u8]) -> Result<RequestId, StorageError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| StorageError::serialization_with_source("corrupt index entry", e))?;
    RequestId::parse(text)
        .map_err(|e| StorageError::serialization_with_source("corrupt index entry", e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let event_id = EventId::parse("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap();
        assert_eq!(
            event_key(event_id),
            b"event/6ba7b810-9dad-11d1-80b4-00c04fd430c8".to_vec()
        );
        assert_eq!(
            pair_index_key(event_id, "user-1"),
            b"request-by-member/6ba7b810-9dad-11d1-80b4-00c04fd430c8/user-1".to_vec()
        );
    }

    #[test]
    fn test_prefix_range_covers_prefixed_keys_only() {
        let (start, end) = prefix_range(b"event/");
        assert_eq!(start, b"event/".to_vec());
        assert_eq!(end, b"event0".to_vec());

        assert!(start.as_slice() < b"event/abc".as_slice());
        assert!(b"event/abc".as_slice() < end.as_slice());
        assert!(b"request/abc".as_slice() > end.as_slice());
    }

    #[test]
    fn test_prefix_range_all_ff() {
        let (start, end) = prefix_range(&[0xff, 0xff]);
        assert!(start < end);
    }

    #[test]
    fn test_request_id_index_round_trip() {
        let id = RequestId::new();
        let bytes = id.to_string().into_bytes();
        assert_eq!(decode_request_id(&bytes).unwrap(), id);

        assert!(decode_request_id(b"not-a-uuid").is_err());
        assert!(decode_request_id(&[0xff, 0xfe]).is_err());
    }
}
