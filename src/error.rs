//! Error taxonomy for the authentication core.
//!
//! Everything a caller can hit is one of five cases. Session expiry is
//! deliberately absent: an expired session reads as `None`, not an error.

use thiserror::Error;

/// Errors surfaced by the auth service and hashing engine.
///
/// All variants carry a short human-readable message; presentation is the
/// caller's concern. None of these are retried internally.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The email is already registered.
    #[error("an account with this email already exists")]
    DuplicateEmail,

    /// Unknown email or wrong password. One message for both, so a caller
    /// cannot tell which accounts exist.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Sign-up input failed basic hygiene checks (empty name, short
    /// password, malformed email).
    #[error("{0}")]
    InvalidInput(String),

    /// The credential store or session slot could not be read or written.
    #[error("credential store unavailable: {0}")]
    Store(#[from] anyhow::Error),

    /// The CSPRNG or key-derivation primitive failed. Never downgraded to
    /// a weaker scheme.
    #[error("password hashing unavailable: {0}")]
    HashingUnavailable(String),
}
