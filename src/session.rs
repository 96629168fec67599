//! Session codec: the stored-session envelope over the shared slot.
//!
//! `save` stamps an absolute expiry 24 hours out and writes the JSON
//! envelope under one fixed key. `load` never errors: an absent, malformed
//! or expired payload reads as signed-out, and an expired payload is
//! deleted on detection so no context can revive it.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tokio::sync::broadcast;
use tracing::warn;

use crate::model::{AuthSession, StoredSession};
use crate::slot::SessionSlot;

/// The one fixed key every context shares for the stored session.
pub const SESSION_SLOT_KEY: &str = "auth.session";

/// Session lifetime in hours for newly saved sessions.
const SESSION_TTL_HOURS: i64 = 24;

/// Serializes sessions into the shared slot and enforces expiry on read.
#[derive(Clone)]
pub struct SessionCodec {
    slot: Arc<dyn SessionSlot>,
    ttl: Duration,
}

impl SessionCodec {
    pub fn new(slot: Arc<dyn SessionSlot>) -> Self {
        Self {
            slot,
            ttl: Duration::hours(SESSION_TTL_HOURS),
        }
    }

    /// Override the session lifetime. Negative values produce sessions
    /// that are already expired, which the tests rely on.
    pub fn with_ttl(slot: Arc<dyn SessionSlot>, ttl: Duration) -> Self {
        Self { slot, ttl }
    }

    /// Persist a session with a fresh expiry.
    pub fn save(&self, session: &AuthSession) -> Result<()> {
        let stored = StoredSession {
            session: session.clone(),
            expires_at: Utc::now() + self.ttl,
        };
        let payload = serde_json::to_string(&stored).context("encoding stored session")?;
        self.slot.write(SESSION_SLOT_KEY, &payload)
    }

    /// Read the current session, enforcing expiry.
    ///
    /// Degrades to `None` on any read or parse failure rather than
    /// propagating; a broken slot means signed-out, not crashed.
    pub fn load(&self) -> Option<AuthSession> {
        let raw = match self.slot.read(SESSION_SLOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "session slot unreadable; treating as signed out");
                return None;
            }
        };

        let stored: StoredSession = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "malformed stored session; treating as signed out");
                return None;
            }
        };

        if Utc::now() > stored.expires_at {
            if let Err(e) = self.slot.delete(SESSION_SLOT_KEY) {
                warn!(error = %e, "failed to delete expired session");
            }
            return None;
        }

        Some(stored.session)
    }

    /// Remove the stored session unconditionally. Best effort.
    pub fn clear(&self) {
        if let Err(e) = self.slot.delete(SESSION_SLOT_KEY) {
            warn!(error = %e, "failed to clear session slot");
        }
    }

    /// Subscribe to changed-key notifications from the underlying slot.
    pub fn changes(&self) -> broadcast::Receiver<String> {
        self.slot.subscribe()
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use crate::slot::MemorySessionSlot;

    fn session() -> AuthSession {
        AuthSession {
            user_id: "u1".into(),
            email: "a@x.com".into(),
            name: "Alice".into(),
            roles: vec![Role::Admin],
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let slot = Arc::new(MemorySessionSlot::new());
        let codec = SessionCodec::new(slot);

        codec.save(&session()).unwrap();
        assert_eq!(codec.load(), Some(session()));
    }

    #[test]
    fn load_of_empty_slot_is_none() {
        let codec = SessionCodec::new(Arc::new(MemorySessionSlot::new()));
        assert_eq!(codec.load(), None);
    }

    #[test]
    fn expired_session_loads_as_none_and_deletes_the_slot() {
        let slot = Arc::new(MemorySessionSlot::new());
        let codec = SessionCodec::with_ttl(slot.clone(), Duration::hours(-1));

        codec.save(&session()).unwrap();
        assert!(slot.read(SESSION_SLOT_KEY).unwrap().is_some());

        assert_eq!(codec.load(), None);
        assert_eq!(slot.read(SESSION_SLOT_KEY).unwrap(), None);
    }

    #[test]
    fn malformed_payload_loads_as_none() {
        let slot = Arc::new(MemorySessionSlot::new());
        slot.write(SESSION_SLOT_KEY, "{not json").unwrap();

        let codec = SessionCodec::new(slot.clone());
        assert_eq!(codec.load(), None);
        // Malformed payloads are left in place; only expiry deletes.
        assert!(slot.read(SESSION_SLOT_KEY).unwrap().is_some());
    }

    #[test]
    fn clear_removes_the_slot() {
        let slot = Arc::new(MemorySessionSlot::new());
        let codec = SessionCodec::new(slot.clone());

        codec.save(&session()).unwrap();
        codec.clear();
        assert_eq!(slot.read(SESSION_SLOT_KEY).unwrap(), None);
        assert_eq!(codec.load(), None);

        // Clearing an already-empty slot is fine.
        codec.clear();
    }

    #[test]
    fn fresh_session_carries_future_expiry() {
        let slot = Arc::new(MemorySessionSlot::new());
        let codec = SessionCodec::new(slot.clone());
        codec.save(&session()).unwrap();

        let raw = slot.read(SESSION_SLOT_KEY).unwrap().unwrap();
        let stored: StoredSession = serde_json::from_str(&raw).unwrap();
        assert!(stored.expires_at > Utc::now() + Duration::hours(23));
        assert!(stored.expires_at <= Utc::now() + Duration::hours(24));
    }
}
