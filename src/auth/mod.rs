//! Role-based access control for event photo sharing.
//!
//! The policy core has three pieces: a caller's role is resolved once (see
//! `db::profiles`) and carried in a [`Caller`], the pure predicates in
//! [`predicates`] decide against that value, and the redaction helpers in
//! [`redact`] null out biometric columns on every read path. Predicates
//! never query the database themselves, so a role check can never recurse
//! into another role check.

pub mod predicates;
pub mod redact;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Access role attached to a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including biometric payloads and the complete audit log.
    Admin,
    /// May create events and upload photos; no access to others' biometrics.
    Editor,
    /// Read-only participant. Default for new signups.
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }
}

/// Error for unrecognized role names coming from config or the CLI.
#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct InvalidRole(String);

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "viewer" => Ok(Role::Viewer),
            other => Err(InvalidRole(other.to_string())),
        }
    }
}

/// An already-resolved caller: identity plus role.
///
/// Built by `Database::caller` with a single policy-bypassing lookup and
/// passed explicitly to every predicate and filter. An unauthenticated
/// request carries neither identity nor role.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    /// Identity id from the auth provider, if authenticated.
    pub identity: Option<String>,
    /// Role from the caller's profile; `None` when unauthenticated or no
    /// profile exists yet.
    pub role: Option<Role>,
}

impl Caller {
    /// Caller for a request without any identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Caller with a known identity and an already-resolved role.
    pub fn new(identity: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            identity: Some(identity.into()),
            role,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}
