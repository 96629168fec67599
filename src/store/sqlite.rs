//! SQLite-backed credential store.
//!
//! Tables:
//! - `users`: id, email (unique), name, password_hash, created_at
//! - `user_roles`: id, user_id, role, created_at
//!
//! One connection behind a mutex; writes are short and the subsystem is
//! low-traffic, so a pool is not worth carrying here.

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{CredentialStore, DuplicateKey};
use crate::model::{Role, User, UserRole};

/// Durable credential store at a single database file.
pub struct SqliteCredentialStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteCredentialStore {
    /// Open (or create) the credential database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(db_path)
            .with_context(|| format!("opening credential store at {}", db_path.display()))?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_roles (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_user_roles_user ON user_roles(user_id);",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn datetime_from_epoch(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        let row = conn.query_row(
            "SELECT id, email, name, password_hash, created_at FROM users WHERE email = ?1",
            rusqlite::params![email],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                    password_hash: row.get(3)?,
                    created_at: datetime_from_epoch(row.get(4)?),
                })
            },
        );

        match row {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn count_users(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (id, email, name, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                user.id,
                user.email,
                user.name,
                user.password_hash,
                user.created_at.timestamp(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(anyhow::Error::new(DuplicateKey))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_user_password_hash(&self, user_id: &str, password_hash: &str) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            rusqlite::params![password_hash, user_id],
        )?;
        anyhow::ensure!(updated > 0, "no user with id {user_id}");
        Ok(())
    }

    async fn insert_user_role(&self, role: &UserRole) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO user_roles (id, user_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                role.id,
                role.user_id,
                role.role.as_str(),
                role.created_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    async fn find_roles_by_user_id(&self, user_id: &str) -> Result<Vec<UserRole>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, user_id, role, created_at
             FROM user_roles WHERE user_id = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, user_id, role, created_at)| {
                Ok(UserRole {
                    id,
                    user_id,
                    role: Role::from_str(&role)?,
                    created_at: datetime_from_epoch(created_at),
                })
            })
            .collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
