//! Authentication session with optional persistence.
//!
//! [`AuthContext`] owns the session. Request executors and socket channels
//! never mutate it: they receive an [`AuthSignal`], a read-only view that
//! also lets them react to login and logout.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::storage::Storage;

const STORAGE_KEY: &str = "qa_session";

/// Session data for the signed-in user.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: String,
    pub access_token: String,
    /// Persist the session across restarts.
    #[serde(default)]
    pub remember_me: bool,
}

impl AuthSession {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
            remember_me: false,
        }
    }

    pub fn remembered(mut self) -> Self {
        self.remember_me = true;
        self
    }
}

/// Owner of the current session.
#[derive(Clone, Debug)]
pub struct AuthContext {
    session: Arc<watch::Sender<Option<AuthSession>>>,
    storage: Option<Storage>,
}

impl AuthContext {
    /// Context without persistence, starting signed out.
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            session: Arc::new(session),
            storage: None,
        }
    }

    /// Context backed by `storage`, restoring a remembered session if present.
    pub fn with_storage(storage: Storage) -> Self {
        let restored = storage.load::<AuthSession>(STORAGE_KEY);
        if let Some(sess) = restored.as_ref() {
            tracing::info!("Restored remembered session for {}", sess.user_id);
        }
        let (session, _) = watch::channel(restored);
        Self {
            session: Arc::new(session),
            storage: Some(storage),
        }
    }

    /// Sign in. The session is persisted only when `remember_me` is set.
    pub fn login(&self, session: AuthSession) {
        if let Some(storage) = self.storage.as_ref() {
            if session.remember_me {
                if !storage.save(STORAGE_KEY, &session) {
                    tracing::warn!("Failed to persist session for {}", session.user_id);
                }
            } else {
                storage.remove(STORAGE_KEY);
            }
        }
        tracing::info!("Signed in as {}", session.user_id);
        self.session.send_replace(Some(session));
    }

    /// Sign out and forget any persisted session.
    pub fn logout(&self) {
        if let Some(storage) = self.storage.as_ref() {
            storage.remove(STORAGE_KEY);
        }
        if let Some(previous) = self.session.send_replace(None) {
            tracing::info!("Signed out {}", previous.user_id);
        }
    }

    /// Check if user is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.session.borrow().is_some()
    }

    /// Get the current user ID
    pub fn user_id(&self) -> Option<String> {
        self.session.borrow().as_ref().map(|s| s.user_id.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.session.borrow().as_ref().map(|s| s.access_token.clone())
    }

    /// Read-only view handed to executors and channels.
    pub fn signal(&self) -> AuthSignal {
        AuthSignal {
            rx: self.session.subscribe(),
        }
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the session.
#[derive(Clone, Debug)]
pub struct AuthSignal {
    rx: watch::Receiver<Option<AuthSession>>,
}

impl AuthSignal {
    /// A signal that is never authenticated.
    pub fn anonymous() -> Self {
        let (_, rx) = watch::channel(None);
        Self { rx }
    }

    /// A signal fixed to `session` for its whole lifetime.
    pub fn fixed(session: AuthSession) -> Self {
        let (_, rx) = watch::channel(Some(session));
        Self { rx }
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.rx.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.rx.borrow().as_ref().map(|s| s.access_token.clone())
    }

    /// Current session, marking it as seen for [`AuthSignal::changed`].
    pub(crate) fn observe(&mut self) -> Option<AuthSession> {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next session change.
    ///
    /// Returns `false` once the owning context is gone and no further change
    /// can happen.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_and_logout_are_visible_through_signal() {
        let ctx = AuthContext::new();
        let signal = ctx.signal();
        assert!(!signal.is_authenticated());

        ctx.login(AuthSession::new("alice", "token-1"));
        assert!(ctx.is_authenticated());
        assert_eq!(signal.access_token().as_deref(), Some("token-1"));
        assert_eq!(ctx.user_id().as_deref(), Some("alice"));

        ctx.logout();
        assert!(!signal.is_authenticated());
        assert_eq!(ctx.access_token(), None);
    }

    #[test]
    fn remembered_session_survives_restart() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let ctx = AuthContext::with_storage(Storage::new(temp.path()));
        ctx.login(AuthSession::new("bob", "t").remembered());

        let restored = AuthContext::with_storage(Storage::new(temp.path()));
        assert_eq!(restored.user_id().as_deref(), Some("bob"));

        restored.logout();
        let after_logout = AuthContext::with_storage(Storage::new(temp.path()));
        assert!(!after_logout.is_authenticated());
    }

    #[test]
    fn session_without_remember_me_is_not_persisted() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let ctx = AuthContext::with_storage(Storage::new(temp.path()));
        ctx.login(AuthSession::new("carol", "t"));

        let restored = AuthContext::with_storage(Storage::new(temp.path()));
        assert!(!restored.is_authenticated());
    }

    #[tokio::test]
    async fn changed_reports_updates_and_owner_drop() {
        let ctx = AuthContext::new();
        let mut signal = ctx.signal();
        assert_eq!(signal.observe(), None);

        ctx.login(AuthSession::new("dave", "t"));
        assert!(signal.changed().await);
        assert_eq!(signal.observe().map(|s| s.user_id), Some("dave".to_string()));

        drop(ctx);
        assert!(!signal.changed().await);
    }

    #[tokio::test]
    async fn anonymous_signal_never_changes() {
        let mut signal = AuthSignal::anonymous();
        assert!(!signal.is_authenticated());
        assert!(!signal.changed().await);
    }
}
