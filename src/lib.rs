//! Local-first authentication and authorization core for CampusHub.
//!
//! Provides:
//! - Account creation with email/password (PBKDF2-HMAC-SHA256, 100k rounds
//!   + per-user salt, self-describing digest format)
//! - Transparent upgrade of legacy unsalted SHA-256 digests on sign-in
//! - A single shared session slot with 24-hour expiry, visible to every
//!   execution context of the application
//! - A reactive session observer that republishes state whenever any
//!   context writes the shared slot
//!
//! ## Design Decisions
//! - The first account ever created on an empty credential store becomes
//!   the administrator (bootstrap rule); everyone after that starts as a
//!   viewer.
//! - Unknown-email and wrong-password sign-ins fail with one unified error
//!   so callers cannot enumerate accounts.
//! - Password digests carry an explicit scheme tag; verification dispatches
//!   on the tag and anything untagged is treated as a legacy digest.
//! - Session expiry is not an error: an expired slot reads as signed-out
//!   and is deleted on detection.

pub mod error;
pub mod hash;
pub mod model;
pub mod observer;
pub mod service;
pub mod session;
pub mod slot;
pub mod store;

pub use error::AuthError;
pub use model::{AuthSession, Role, StoredSession, User, UserRole};
pub use observer::{SessionObserver, SessionState};
pub use service::AuthService;
pub use session::{SessionCodec, SESSION_SLOT_KEY};
pub use slot::{FileSessionSlot, MemorySessionSlot, SessionSlot};
pub use store::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
