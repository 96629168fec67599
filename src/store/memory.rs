//! In-memory credential store for tests and ephemeral embedders.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CredentialStore, DuplicateKey};
use crate::model::{User, UserRole};

/// Process-local credential store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    roles: Vec<UserRole>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .inner
            .lock()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn count_users(&self) -> anyhow::Result<u64> {
        Ok(self.inner.lock().users.len() as u64)
    }

    async fn insert_user(&self, user: &User) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(anyhow::Error::new(DuplicateKey));
        }
        inner.users.push(user.clone());
        Ok(())
    }

    async fn update_user_password_hash(
        &self,
        user_id: &str,
        password_hash: &str,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| anyhow::anyhow!("no user with id {user_id}"))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn insert_user_role(&self, role: &UserRole) -> anyhow::Result<()> {
        self.inner.lock().roles.push(role.clone());
        Ok(())
    }

    async fn find_roles_by_user_id(&self, user_id: &str) -> anyhow::Result<Vec<UserRole>> {
        Ok(self
            .inner
            .lock()
            .roles
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
