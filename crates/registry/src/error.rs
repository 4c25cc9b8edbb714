//! Registry error types.
//!
//! Two error families cover the registry surface:
//! [`RegistrationError`] for ledger operations and [`WorkflowError`] for the
//! request workflow (which also carries authorization and ledger failures).
//! Every variant exposes a stable machine-readable code.

use muster_authn::PolicyError;
use muster_storage::StorageError;
use thiserror::Error;

use crate::types::{EventId, RequestId, RequestStatus};

/// Errors from registration ledger operations.
///
/// Business outcomes (`EventNotFound`, `EventClosed`, `Full`,
/// `AlreadyRegistered`) are surfaced immediately and never retried.
/// `Conflict` means bounded internal retries were exhausted by write
/// contention; the operation is safe to re-issue. `Store` wraps
/// infrastructure failures and is surfaced as a service-unavailable
/// condition, never swallowed into a success response.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistrationError {
    /// No event exists with the given id.
    #[error("event not found: {event_id}")]
    EventNotFound {
        /// The event that was not found.
        event_id: EventId,
    },

    /// The event is no longer accepting registrations.
    #[error("event closed: {event_id}")]
    EventClosed {
        /// The closed event.
        event_id: EventId,
    },

    /// The event has reached capacity.
    #[error("event full: {event_id}")]
    Full {
        /// The full event.
        event_id: EventId,
    },

    /// The user is already enrolled, or already has a live registration
    /// request for this event.
    #[error("user {user_id} already registered for event {event_id}")]
    AlreadyRegistered {
        /// The event.
        event_id: EventId,
        /// The already-registered user.
        user_id: String,
    },

    /// Write contention persisted through every bounded retry.
    ///
    /// This is a transient condition: the caller may safely re-issue the
    /// operation. It is never returned for a business rejection.
    #[error("write contention persisted after {attempts} attempts")]
    Conflict {
        /// How many attempts were made.
        attempts: u32,
    },

    /// Storage backend failure.
    #[error("storage unavailable: {0}")]
    Store(#[from] StorageError),
}

impl RegistrationError {
    /// Returns the stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::EventNotFound { .. } => "EVENT_NOT_FOUND",
            Self::EventClosed { .. } => "EVENT_CLOSED",
            Self::Full { .. } => "EVENT_FULL",
            Self::AlreadyRegistered { .. } => "ALREADY_REGISTERED",
            Self::Conflict { .. } => "CONFLICT",
            Self::Store(_) => "STORE_UNAVAILABLE",
        }
    }
}

/// Errors from the registration request workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkflowError {
    /// No registration request exists with the given id.
    #[error("registration request not found: {request_id}")]
    RequestNotFound {
        /// The request that was not found.
        request_id: RequestId,
    },

    /// The request already carries a terminal status.
    ///
    /// Terminal statuses are set exactly once; a second decision is
    /// rejected, never silently overwritten.
    #[error("registration request {request_id} already decided: {status}")]
    AlreadyDecided {
        /// The already-decided request.
        request_id: RequestId,
        /// Its terminal status.
        status: RequestStatus,
    },

    /// The decision target is not a terminal status.
    #[error("invalid decision target: {target}")]
    InvalidTarget {
        /// The rejected target status.
        target: RequestStatus,
    },

    /// The acting principal is not authorized.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// A ledger operation failed.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

impl WorkflowError {
    /// Returns the stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RequestNotFound { .. } => "REQUEST_NOT_FOUND",
            Self::AlreadyDecided { .. } => "ALREADY_DECIDED",
            Self::InvalidTarget { .. } => "INVALID_TARGET",
            Self::Policy(err) => err.code(),
            Self::Registration(err) => err.code(),
        }
    }
}

impl From<StorageError> for WorkflowError {
    fn from(err: StorageError) -> Self {
        Self::Registration(RegistrationError::Store(err))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use muster_authn::Role;

    use super::*;

    #[test]
    fn test_registration_error_codes() {
        let event_id = EventId::new();
        assert_eq!(RegistrationError::EventNotFound { event_id }.code(), "EVENT_NOT_FOUND");
        assert_eq!(RegistrationError::EventClosed { event_id }.code(), "EVENT_CLOSED");
        assert_eq!(RegistrationError::Full { event_id }.code(), "EVENT_FULL");
        assert_eq!(
            RegistrationError::AlreadyRegistered { event_id, user_id: "u".into() }.code(),
            "ALREADY_REGISTERED"
        );
        assert_eq!(RegistrationError::Conflict { attempts: 4 }.code(), "CONFLICT");
        assert_eq!(
            RegistrationError::Store(StorageError::timeout()).code(),
            "STORE_UNAVAILABLE"
        );
    }

    #[test]
    fn test_workflow_error_codes_delegate() {
        let request_id = RequestId::new();
        assert_eq!(WorkflowError::RequestNotFound { request_id }.code(), "REQUEST_NOT_FOUND");
        assert_eq!(
            WorkflowError::AlreadyDecided { request_id, status: RequestStatus::Approved }.code(),
            "ALREADY_DECIDED"
        );
        assert_eq!(
            WorkflowError::InvalidTarget { target: RequestStatus::Pending }.code(),
            "INVALID_TARGET"
        );
        assert_eq!(
            WorkflowError::Policy(PolicyError::InsufficientRole {
                required: Role::Organizer,
                actual: Role::Participant,
            })
            .code(),
            "INSUFFICIENT_ROLE"
        );
        assert_eq!(
            WorkflowError::from(StorageError::timeout()).code(),
            "STORE_UNAVAILABLE"
        );
    }

    #[test]
    fn test_workflow_error_display_is_transparent_for_wrapped() {
        let err = WorkflowError::Registration(RegistrationError::Conflict { attempts: 2 });
        assert_eq!(err.to_string(), "write contention persisted after 2 attempts");
    }
}
