//! Auth service: sign-up, sign-in, sign-out, session retrieval.
//!
//! Owns the two policies the rest of the crate only mechanizes:
//! - **Bootstrap rule** — the first account created on an empty credential
//!   store becomes the administrator; everyone after starts as a viewer.
//! - **Transparent migration** — a legacy unsalted digest that verifies is
//!   rewritten to the versioned format before sign-in completes; the
//!   rewrite is best-effort and never blocks a successful credential check.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AuthError;
use crate::hash;
use crate::model::{AuthSession, Role, User, UserRole};
use crate::session::SessionCodec;
use crate::store::{CredentialStore, DuplicateKey};

/// Minimum password length accepted at sign-up.
const MIN_PASSWORD_LEN: usize = 8;

/// Maximum email length accepted at sign-up.
const MAX_EMAIL_LEN: usize = 254;

/// Orchestrates the credential store, hashing engine and session codec.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    codec: SessionCodec,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, codec: SessionCodec) -> Self {
        Self { store, codec }
    }

    /// Register a new account and sign it in.
    ///
    /// The duplicate check runs before any mutation, so a rejected sign-up
    /// leaves the store untouched.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthSession, AuthError> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::InvalidInput(
                "a valid email address is required".into(),
            ));
        }
        if email.len() > MAX_EMAIL_LEN {
            return Err(AuthError::InvalidInput("email address too long".into()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidInput("name cannot be empty".into()));
        }

        if self.store.find_user_by_email(email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = hash::hash_password(password)?;

        // Bootstrap rule: the first account on an empty store is the admin.
        let role = if self.store.count_users().await? == 0 {
            Role::Admin
        } else {
            Role::Viewer
        };

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            name: name.to_string(),
            password_hash,
            created_at: now,
        };
        self.store.insert_user(&user).await.map_err(|e| {
            if e.is::<DuplicateKey>() {
                AuthError::DuplicateEmail
            } else {
                AuthError::Store(e)
            }
        })?;
        self.store
            .insert_user_role(&UserRole {
                id: Uuid::new_v4().to_string(),
                user_id: user.id.clone(),
                role,
                created_at: now,
            })
            .await?;

        info!(email, role = role.as_str(), "account created");

        let session = AuthSession {
            user_id: user.id,
            email: user.email,
            name: user.name,
            roles: vec![role],
        };
        self.codec.save(&session)?;
        Ok(session)
    }

    /// Authenticate and sign in.
    ///
    /// Unknown email and wrong password fail identically so accounts
    /// cannot be enumerated.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = email.trim();
        let Some(user) = self.store.find_user_by_email(email).await? else {
            // Burn a derivation so unknown emails cost the same as wrong
            // passwords.
            let _ = hash::hash_password(password);
            return Err(AuthError::InvalidCredentials);
        };

        if !hash::verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        if hash::is_legacy_digest(&user.password_hash) {
            match hash::hash_password(password) {
                Ok(upgraded) => {
                    if let Err(e) = self
                        .store
                        .update_user_password_hash(&user.id, &upgraded)
                        .await
                    {
                        warn!(user_id = %user.id, error = %e,
                            "legacy digest upgrade failed; continuing sign-in");
                    } else {
                        info!(user_id = %user.id, "legacy digest upgraded");
                    }
                }
                Err(e) => {
                    warn!(user_id = %user.id, error = %e,
                        "legacy digest upgrade skipped; continuing sign-in");
                }
            }
        }

        let roles: Vec<Role> = self
            .store
            .find_roles_by_user_id(&user.id)
            .await?
            .into_iter()
            .map(|r| r.role)
            .collect();

        let session = AuthSession {
            user_id: user.id,
            email: user.email,
            name: user.name,
            roles,
        };
        self.codec.save(&session)?;
        info!(email, "signed in");
        Ok(session)
    }

    /// Clear the stored session. No credential store interaction.
    pub fn sign_out(&self) {
        self.codec.clear();
    }

    /// The current session, if a valid one is stored.
    pub fn session(&self) -> Option<AuthSession> {
        self.codec.load()
    }

    /// Alias of [`session`](Self::session), kept for callers that think in
    /// terms of "who is the user".
    pub fn user(&self) -> Option<AuthSession> {
        self.session()
    }

    /// Changed-key notifications from the shared session slot.
    pub fn changes(&self) -> tokio::sync::broadcast::Receiver<String> {
        self.codec.changes()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
