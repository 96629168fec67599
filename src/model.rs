//! Data model: users, role records, and the session envelope.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of roles an account can hold.
///
/// Kept as a tagged enum rather than an open string so role checks are
/// exhaustive and compiler-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Parent,
    Viewer,
}

impl Role {
    /// Stable lowercase name, used for storage and logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Teacher => "teacher",
            Self::Student => "student",
            Self::Parent => "parent",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role string that is not one of the five known roles.
#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "teacher" => Ok(Self::Teacher),
            "student" => Ok(Self::Student),
            "parent" => Ok(Self::Parent),
            "viewer" => Ok(Self::Viewer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// A registered account as persisted in the credential store.
///
/// `password_hash` is a self-describing versioned digest (see the `hash`
/// module) and is the only field this subsystem ever rewrites.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    /// Unique, stored case-sensitively.
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// One role grant for one user. A user may hold several.
#[derive(Debug, Clone)]
pub struct UserRole {
    pub id: String,
    pub user_id: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// The authenticated identity handed to callers.
///
/// `roles` is a snapshot taken at sign-in time; later role grants do not
/// propagate into an existing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub roles: Vec<Role>,
}

impl AuthSession {
    /// Whether this session holds the given role.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// The only persisted session representation: the session plus its
/// absolute expiry instant, JSON-encoded into the shared slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(flatten)]
    pub session: AuthSession,
    pub expires_at: DateTime<Utc>,
}

// ── Tests ───────────────────────────────────────────────────────────
