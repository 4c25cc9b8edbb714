//! Verified caller identity.
//!
//! A [`Principal`] is only ever constructed from a token that passed full
//! verification in [`TokenVerifier`](crate::jwt::TokenVerifier). It is the
//! sole input to authorization decisions — no component re-decodes the
//! bearer token to answer "who is calling".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller role carried in the token's `custom:role` claim.
///
/// Roles form a total order: `Participant < Organizer`. An organizer
/// satisfies any requirement a participant does. `Participant` is the
/// lowest-privilege role and the default when the claim is absent.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can browse events and submit registration requests.
    Participant,
    /// Can additionally create events and decide registration requests.
    Organizer,
}

impl Role {
    /// Returns the wire representation of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Participant => "participant",
            Role::Organizer => "organizer",
        }
    }

    /// Parses a role claim value.
    ///
    /// Returns `None` for unrecognized values — the verifier treats those as
    /// a claim mismatch rather than silently assigning a role.
    #[must_use]
    pub fn from_claim(value: &str) -> Option<Role> {
        match value {
            "participant" => Some(Role::Participant),
            "organizer" => Some(Role::Organizer),
            _ => None,
        }
    }

    /// Returns `true` if a caller holding this role satisfies the
    /// `required` role.
    #[must_use]
    pub fn grants(self, required: Role) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity extracted from a verified token.
///
/// Derived solely from verified claims (`sub`, `email`, `custom:role`) and
/// never persisted by this crate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable subject identifier (`sub` claim).
    pub id: String,
    /// Email address (`email` claim; empty when absent).
    pub email: String,
    /// Role (`custom:role` claim; defaults to [`Role::Participant`]).
    pub role: Role,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(Role::Participant < Role::Organizer);
    }

    #[test]
    fn test_role_grants() {
        assert!(Role::Organizer.grants(Role::Organizer));
        assert!(Role::Organizer.grants(Role::Participant));
        assert!(Role::Participant.grants(Role::Participant));
        assert!(!Role::Participant.grants(Role::Organizer));
    }

    #[test]
    fn test_role_from_claim() {
        assert_eq!(Role::from_claim("participant"), Some(Role::Participant));
        assert_eq!(Role::from_claim("organizer"), Some(Role::Organizer));
        assert_eq!(Role::from_claim("admin"), None);
        assert_eq!(Role::from_claim(""), None);
        assert_eq!(Role::from_claim("Organizer"), None);
    }

    #[test]
    fn test_role_serde_wire_format() {
        let json = serde_json::to_string(&Role::Organizer).unwrap();
        assert_eq!(json, r#""organizer""#);

        let role: Role = serde_json::from_str(r#""participant""#).unwrap();
        assert_eq!(role, Role::Participant);
    }
}
