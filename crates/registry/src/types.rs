//! Domain records for events and registration requests.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Macro to define a newtype wrapper around [`uuid::Uuid`] with standard
/// trait implementations.
///
/// Each generated type:
/// - Is a transparent wrapper around `Uuid` (zero runtime cost)
/// - Derives `Copy`, `Clone`, `Debug`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Derives `Serialize` and `Deserialize` (transparent)
/// - Implements `From<Uuid>` and `Into<Uuid>` for interop
/// - Implements `Display` that outputs the inner value
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Parses an identifier from its canonical string form.
            ///
            /// # Errors
            ///
            /// Returns an error if `value` is not a valid UUID.
            pub fn parse(value: &str) -> Result<Self, uuid::Error> {
                Ok(Self(uuid::Uuid::parse_str(value)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(value: uuid::Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Identifier of an [`Event`].
    EventId
);

define_id!(
    /// Identifier of a [`RegistrationRequest`].
    RequestId
);

/// Lifecycle state of an event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Accepting registrations (subject to capacity).
    Open,
    /// No longer accepting registrations.
    Closed,
}

/// A capacity-limited event.
///
/// # Invariants
///
/// - `participants.len() <= capacity` always holds
/// - `participants` contains no duplicates (enforced structurally by the set)
///
/// Both invariants are maintained exclusively by the registration ledger's
/// conditional writes; nothing else mutates `participants`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier.
    pub id: EventId,
    /// Principal id of the organizer who authored the event.
    pub organizer_id: String,
    /// Human-readable title.
    pub title: String,
    /// Scheduled start time.
    pub starts_at: DateTime<Utc>,
    /// Venue description.
    pub location: String,
    /// Maximum number of participants.
    pub capacity: u32,
    /// Principal ids of enrolled participants.
    pub participants: BTreeSet<String>,
    /// Lifecycle state.
    pub status: EventStatus,
}

impl Event {
    /// Returns `true` if the event has reached capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.participants.len() as u32 >= self.capacity
    }

    /// Returns how many seats remain.
    #[must_use]
    pub fn remaining_capacity(&self) -> u32 {
        self.capacity.saturating_sub(self.participants.len() as u32)
    }
}

/// Review state of a registration request.
///
/// `Pending` transitions exactly once, to either `Approved` or `Rejected`;
/// both are terminal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Awaiting an organizer decision.
    Pending,
    /// Accepted; the requester is enrolled in the event.
    Approved,
    /// Declined; the requester may submit again.
    Rejected,
}

impl RequestStatus {
    /// Returns `true` if the status is terminal (decided).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// Fields a principal submits when requesting registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationFields {
    /// Requester's full name.
    pub full_name: String,
    /// Contact email for the confirmation notification.
    pub email: String,
    /// College or institution name.
    pub college_name: String,
    /// Year of study.
    pub year_of_study: String,
    /// Contact phone number.
    pub phone_number: String,
    /// Free-form motivation statement.
    pub why_interested: String,
}

/// A reviewable registration request.
///
/// Created by a principal submitting interest; mutated only by an
/// organizer-authorized decision; never deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Unique identifier.
    pub id: RequestId,
    /// Event the request targets.
    pub event_id: EventId,
    /// Principal id of the requester.
    pub user_id: String,
    /// Review state.
    pub status: RequestStatus,
    /// Submitted form fields.
    pub fields: RegistrationFields,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Decision time, once terminal.
    pub decided_at: Option<DateTime<Utc>>,
}
