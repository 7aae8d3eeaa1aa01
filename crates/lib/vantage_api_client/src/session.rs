//! Client-side session state.
//!
//! A [`Session`] is the only writer of the client's access token. It is an
//! explicit object handed to [`crate::ApiClient`], so several independent
//! sessions can live in one process and tests can inspect it directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::debug;

/// Storage for the tokens a session holds.
///
/// The refresh token slot is only used by clients that cannot rely on the
/// cookie jar (the body fallback); browsers and cookie-enabled clients leave
/// it empty.
pub trait TokenStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn set_access_token(&self, token: Option<String>);
    fn refresh_token(&self) -> Option<String>;
    fn set_refresh_token(&self, token: Option<String>);

    fn clear(&self) {
        self.set_access_token(None);
        self.set_refresh_token(None);
    }
}

#[derive(Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// Process-memory token store.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Tokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn access_token(&self) -> Option<String> {
        self.tokens.read().ok().and_then(|t| t.access.clone())
    }

    fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut t) = self.tokens.write() {
            t.access = token;
        }
    }

    fn refresh_token(&self) -> Option<String> {
        self.tokens.read().ok().and_then(|t| t.refresh.clone())
    }

    fn set_refresh_token(&self, token: Option<String>) {
        if let Ok(mut t) = self.tokens.write() {
            t.refresh = token;
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// The user logged out.
    Logout,
    /// A `401` arrived and there was no refresh token to renew with.
    NoRefreshToken,
    /// The refresh endpoint rejected the refresh token (or was unreachable).
    RefreshFailed,
}

/// Session lifecycle notifications.
///
/// Applications watch for [`SessionEvent::SignedOut`] to send the user back
/// to the sign-in screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Idle,
    SignedIn,
    Refreshed,
    SignedOut(SignOutReason),
}

/// Client session: token storage, a write epoch, and an event channel.
pub struct Session {
    store: Arc<dyn TokenStore>,
    epoch: AtomicU64,
    events: watch::Sender<SessionEvent>,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let (events, _) = watch::channel(SessionEvent::Idle);
        Self {
            store,
            epoch: AtomicU64::new(0),
            events,
        }
    }

    /// Session over a fresh [`MemoryTokenStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()))
    }

    pub fn access_token(&self) -> Option<String> {
        self.store.access_token()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.store.refresh_token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Incremented on every token write. Lets concurrent renewers tell
    /// whether someone else already refreshed.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Subscribe to session events. The receiver starts at the latest event.
    pub fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Most recent event.
    pub fn last_event(&self) -> SessionEvent {
        *self.events.borrow()
    }

    /// Seed a refresh token for clients without a cookie jar (body fallback).
    pub fn restore_refresh_token(&self, token: impl Into<String>) {
        self.store.set_refresh_token(Some(token.into()));
        self.bump();
    }

    /// Replace the access token directly, e.g. with one persisted from an
    /// earlier run.
    pub fn restore_access_token(&self, token: impl Into<String>) {
        self.store.set_access_token(Some(token.into()));
        self.bump();
    }

    pub(crate) fn sign_in(&self, access_token: String) {
        self.store.set_access_token(Some(access_token));
        self.bump();
        self.events.send_replace(SessionEvent::SignedIn);
    }

    pub(crate) fn rotate(&self, access_token: String, refresh_token: Option<String>) {
        self.store.set_access_token(Some(access_token));
        if let Some(refresh) = refresh_token {
            self.store.set_refresh_token(Some(refresh));
        }
        self.bump();
        self.events.send_replace(SessionEvent::Refreshed);
    }

    /// Clear all stored tokens and publish [`SessionEvent::SignedOut`].
    pub fn sign_out(&self, reason: SignOutReason) {
        self.store.clear();
        self.bump();
        debug!(?reason, "session signed out");
        self.events.send_replace(SessionEvent::SignedOut(reason));
    }

    fn bump(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_advance_epoch_and_publish_events() {
        let session = Session::in_memory();
        let rx = session.subscribe();
        assert_eq!(*rx.borrow(), SessionEvent::Idle);

        session.sign_in("a1".into());
        assert_eq!(session.epoch(), 1);
        assert_eq!(session.access_token().as_deref(), Some("a1"));
        assert_eq!(*rx.borrow(), SessionEvent::SignedIn);

        session.rotate("a2".into(), Some("r2".into()));
        assert_eq!(session.epoch(), 2);
        assert_eq!(session.refresh_token().as_deref(), Some("r2"));
        assert_eq!(session.last_event(), SessionEvent::Refreshed);

        session.sign_out(SignOutReason::RefreshFailed);
        assert!(!session.is_authenticated());
        assert!(session.refresh_token().is_none());
        assert_eq!(
            session.last_event(),
            SessionEvent::SignedOut(SignOutReason::RefreshFailed)
        );
    }

    #[test]
    fn rotate_keeps_refresh_token_when_not_returned() {
        let session = Session::in_memory();
        session.restore_refresh_token("r1");
        session.rotate("a1".into(), None);
        assert_eq!(session.refresh_token().as_deref(), Some("r1"));
    }
}
