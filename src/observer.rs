//! Reactive facade over the auth service.
//!
//! Each execution context (window, embedded view) holds its own observer;
//! all of them share one session slot. The observer loads the session once
//! at startup, then re-loads whenever any context writes the slot, and
//! publishes the result through a `watch` channel so views always see the
//! latest state. Signing out through the observer clears local state
//! synchronously instead of waiting for the notification round-trip.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::model::{AuthSession, Role};
use crate::service::AuthService;
use crate::session::SESSION_SLOT_KEY;

/// Published authentication state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// The current session, `None` when signed out.
    pub session: Option<AuthSession>,
    /// False only before the initial load has run.
    pub loaded: bool,
}

/// Watches the shared session slot and republishes state to views.
pub struct SessionObserver {
    service: Arc<AuthService>,
    state: watch::Sender<SessionState>,
    listener: JoinHandle<()>,
}

impl SessionObserver {
    /// Load the session, publish it, and start listening for slot changes.
    ///
    /// Must run inside a tokio runtime; the listener task lives until the
    /// observer is dropped.
    pub fn spawn(service: Arc<AuthService>) -> Self {
        // Subscribe before the initial load so no write is missed between
        // the two.
        let changes = service.changes();
        let initial = SessionState {
            session: service.session(),
            loaded: true,
        };
        let (state, _) = watch::channel(initial);

        let listener = tokio::spawn(Self::listen(service.clone(), state.clone(), changes));

        Self {
            service,
            state,
            listener,
        }
    }

    async fn listen(
        service: Arc<AuthService>,
        state: watch::Sender<SessionState>,
        mut changes: broadcast::Receiver<String>,
    ) {
        loop {
            match changes.recv().await {
                Ok(key) if key == SESSION_SLOT_KEY => {
                    let next = SessionState {
                        session: service.session(),
                        loaded: true,
                    };
                    debug!(
                        authenticated = next.session.is_some(),
                        "session slot changed; republishing"
                    );
                    state.send_replace(next);
                }
                Ok(_) => {}
                // Missed notifications collapse into one re-load.
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    state.send_replace(SessionState {
                        session: service.session(),
                        loaded: true,
                    });
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Snapshot of the current published state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Subscribe to state changes (for views that re-render on update).
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Whether a session is currently published.
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().session.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_teacher(&self) -> bool {
        self.has_role(Role::Teacher)
    }

    /// Whether the published session holds the given role.
    pub fn has_role(&self, role: Role) -> bool {
        self.state
            .borrow()
            .session
            .as_ref()
            .is_some_and(|s| s.has_role(role))
    }

    /// Sign out and clear local state immediately.
    ///
    /// Other contexts catch up when the slot-change notification reaches
    /// them; this one does not wait for it.
    pub fn sign_out(&self) {
        self.service.sign_out();
        self.state.send_replace(SessionState {
            session: None,
            loaded: true,
        });
    }
}

impl Drop for SessionObserver {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionCodec;
    use crate::slot::MemorySessionSlot;
    use crate::store::MemoryCredentialStore;
    use std::time::Duration;

    fn service() -> Arc<AuthService> {
        let store = Arc::new(MemoryCredentialStore::new());
        let slot = Arc::new(MemorySessionSlot::new());
        Arc::new(AuthService::new(store, SessionCodec::new(slot)))
    }

    async fn wait_for_change(rx: &mut watch::Receiver<SessionState>) {
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("no republish within timeout")
            .expect("observer state channel closed");
    }

    #[tokio::test]
    async fn initial_load_publishes_loaded_flag() {
        let observer = SessionObserver::spawn(service());
        let state = observer.state();
        assert!(state.loaded);
        assert!(state.session.is_none());
        assert!(!observer.is_authenticated());
    }

    #[tokio::test]
    async fn initial_load_sees_existing_session() {
        let service = service();
        service.sign_up("a@x.com", "secret123", "Alice").await.unwrap();

        let observer = SessionObserver::spawn(service);
        assert!(observer.is_authenticated());
        assert!(observer.is_admin());
    }

    #[tokio::test]
    async fn republishes_when_the_slot_changes() {
        let service = service();
        let observer = SessionObserver::spawn(service.clone());
        let mut rx = observer.subscribe();

        service.sign_up("a@x.com", "secret123", "Alice").await.unwrap();
        wait_for_change(&mut rx).await;

        assert!(observer.is_authenticated());
        assert!(observer.is_admin());
        assert!(!observer.is_teacher());
        assert!(observer.has_role(Role::Admin));
        assert!(!observer.has_role(Role::Parent));
    }

    #[tokio::test]
    async fn two_observers_share_one_slot() {
        let service = service();
        let tab_a = SessionObserver::spawn(service.clone());
        let tab_b = SessionObserver::spawn(service.clone());
        let mut rx_a = tab_a.subscribe();
        let mut rx_b = tab_b.subscribe();

        service.sign_up("a@x.com", "secret123", "Alice").await.unwrap();
        wait_for_change(&mut rx_a).await;
        wait_for_change(&mut rx_b).await;

        assert!(tab_a.is_authenticated());
        assert!(tab_b.is_authenticated());

        // Sign out from one tab; the other catches up via notification.
        tab_a.sign_out();
        assert!(!tab_a.is_authenticated());

        wait_for_change(&mut rx_b).await;
        assert!(!tab_b.is_authenticated());
    }

    #[tokio::test]
    async fn observer_sign_out_clears_locally_without_waiting() {
        let service = service();
        service.sign_up("a@x.com", "secret123", "Alice").await.unwrap();

        let observer = SessionObserver::spawn(service.clone());
        assert!(observer.is_authenticated());

        // No awaits between sign_out and the assertion: local state is
        // cleared synchronously.
        observer.sign_out();
        assert!(!observer.is_authenticated());
        assert!(observer.state().loaded);
        assert!(service.session().is_none());
    }

    #[tokio::test]
    async fn role_predicates_follow_the_session() {
        let service = service();
        service.sign_up("a@x.com", "secret123", "Alice").await.unwrap();
        service.sign_up("t@x.com", "secret123", "Tessa").await.unwrap();

        // Second sign-up overwrote the slot; its role set is viewer-only.
        let observer = SessionObserver::spawn(service);
        assert!(observer.is_authenticated());
        assert!(!observer.is_admin());
        assert!(!observer.is_teacher());
        assert!(observer.has_role(Role::Viewer));
    }
}
