//! Credential storage seam.
//!
//! The auth service talks to user and role records only through the
//! [`CredentialStore`] trait. The SQLite implementation is the durable
//! default; the in-memory one backs tests and ephemeral embedders.
//!
//! Duplicate-email detection happens in the service as a lookup before
//! insert; the store's unique constraint is a backstop for the window
//! between the two, surfaced through the [`DuplicateKey`] marker so the
//! service can map it to the same caller-facing error.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{User, UserRole};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCredentialStore;
pub use sqlite::SqliteCredentialStore;

/// Marker error for unique-constraint violations on insert, so callers
/// can tell a duplicate apart from general store failure.
#[derive(Debug, Error)]
#[error("unique constraint violated")]
pub struct DuplicateKey;

/// Durable keyed storage for user and role records.
///
/// No transactional isolation is assumed: the service's read-then-write
/// sequences (duplicate check, bootstrap count) can race across contexts,
/// and that is accepted rather than locked around.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by exact (case-sensitive) email.
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// Total number of registered users. Drives the bootstrap-admin rule.
    async fn count_users(&self) -> anyhow::Result<u64>;

    /// Insert a new user. Fails with [`DuplicateKey`] if the email is taken.
    async fn insert_user(&self, user: &User) -> anyhow::Result<()>;

    /// Rewrite a user's password hash in place (digest migration).
    async fn update_user_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> anyhow::Result<()>;

    /// Insert a role grant for a user.
    async fn insert_user_role(&self, role: &UserRole) -> anyhow::Result<()>;

    /// All role grants currently held by a user.
    async fn find_roles_by_user_id(&self, user_id: &str) -> anyhow::Result<Vec<UserRole>>;
}
