//! Role-gated authorization.
//!
//! This module is the single canonical role check. It consumes only a
//! verified [`Principal`] — never a token — and performs a pure comparison
//! with no network or storage access. Every protected operation composes
//! [`authorize`] in front of its business logic; no other role check exists
//! in the workspace.

use thiserror::Error;

use crate::principal::{Principal, Role};

/// Authorization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PolicyError {
    /// The caller's role does not satisfy the required role.
    #[error("insufficient role: {actual} may not act as {required}")]
    InsufficientRole {
        /// Role the operation requires.
        required: Role,
        /// Role the caller actually holds.
        actual: Role,
    },
}

impl PolicyError {
    /// Returns the stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientRole { .. } => "INSUFFICIENT_ROLE",
        }
    }
}

/// Authorizes a principal against the role an operation requires.
///
/// Uses the [`Role`] total order: an organizer satisfies a participant
/// requirement, but not the other way around.
///
/// # Errors
///
/// Returns [`PolicyError::InsufficientRole`] when the principal's role does
/// not satisfy `required`. The rejection is always surfaced to the caller
/// with a stable code; it is never retried and never downgraded.
///
/// # Examples
///
/// ```
/// use muster_authn::{authorize, Principal, Role};
///
/// let organizer = Principal {
///     id: "user-1".into(),
///     email: "org@example.com".into(),
///     role: Role::Organizer,
/// };
/// assert!(authorize(&organizer, Role::Organizer).is_ok());
///
/// let participant = Principal { role: Role::Participant, ..organizer };
/// assert!(authorize(&participant, Role::Organizer).is_err());
/// ```
pub fn authorize(principal: &Principal, required: Role) -> Result<(), PolicyError> {
    if principal.role.grants(required) {
        Ok(())
    } else {
        Err(PolicyError::InsufficientRole { required, actual: principal.role })
    }
}
