use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::{AuthProvider, Credentials, Session, SessionBroadcaster, SessionSubscription};
use crate::error::AuthError;

/// In-process auth provider with a fixed account table.
///
/// Used by the shell's demo mode and by tests. Failures can be switched on
/// to exercise the supervisor's error paths, and `push_change` delivers a
/// session-change notification as if it came from another tab or an admin
/// revoking the session.
#[derive(Default)]
pub struct MemoryAuthProvider {
    accounts: HashMap<String, String>,
    current: Mutex<Option<Session>>,
    fail_sign_out: AtomicBool,
    fail_session_query: AtomicBool,
    sign_out_calls: AtomicUsize,
    changes: SessionBroadcaster,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, email: &str, password: &str) -> Self {
        self.accounts.insert(email.to_string(), password.to_string());
        self
    }

    /// Start with a session already signed in, as after an app restart.
    pub fn with_session(self, session: Session) -> Self {
        *self.current() = Some(session);
        self
    }

    /// The session this provider issues for `email`.
    pub fn session_for(email: &str) -> Session {
        Session::new(format!("user:{}", email), Some(email.to_string()), format!("token:{}", email))
    }

    pub fn set_fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_session_query(&self, fail: bool) {
        self.fail_session_query.store(fail, Ordering::SeqCst);
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    /// Deliver a session change without going through sign-in/sign-out.
    pub fn push_change(&self, change: Option<Session>) {
        *self.current() = change.clone();
        self.changes.notify(change);
    }

    fn current(&self) -> MutexGuard<'_, Option<Session>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        match self.accounts.get(&credentials.email) {
            Some(password) if *password == credentials.password => {
                let session = Self::session_for(&credentials.email);
                *self.current() = Some(session.clone());
                self.changes.notify(Some(session.clone()));
                Ok(session)
            }
            _ => Err(AuthError::Rejected("Invalid login credentials".to_string())),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            debug!("Simulated sign-out failure");
            return Err(AuthError::ServerError("sign-out unavailable".to_string()));
        }
        *self.current() = None;
        self.changes.notify(None);
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        if self.fail_session_query.load(Ordering::SeqCst) {
            return Err(AuthError::ServerError("session lookup unavailable".to_string()));
        }
        Ok(self.current().clone())
    }

    fn subscribe(&self) -> SessionSubscription {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_in_checks_password() {
        let auth = MemoryAuthProvider::new().with_account("ops@kiosk.local", "kiosk");

        let err = auth
            .sign_in(&Credentials::new("ops@kiosk.local", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert!(!auth.is_signed_in());

        let session = auth
            .sign_in(&Credentials::new("ops@kiosk.local", "kiosk"))
            .await
            .unwrap();
        assert_eq!(session, MemoryAuthProvider::session_for("ops@kiosk.local"));
        assert_eq!(auth.current_session().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn test_sign_out_failure_keeps_session() {
        let auth = MemoryAuthProvider::new()
            .with_session(MemoryAuthProvider::session_for("ops@kiosk.local"));
        auth.set_fail_sign_out(true);

        assert!(auth.sign_out().await.is_err());
        assert!(auth.is_signed_in());
        assert_eq!(auth.sign_out_calls(), 1);

        auth.set_fail_sign_out(false);
        auth.sign_out().await.unwrap();
        assert!(!auth.is_signed_in());
        assert_eq!(auth.sign_out_calls(), 2);
    }

    #[tokio::test]
    async fn test_push_change_notifies() {
        let auth = MemoryAuthProvider::new();
        let mut changes = auth.subscribe();
        let session = MemoryAuthProvider::session_for("a@b.c");

        auth.push_change(Some(session.clone()));
        assert_eq!(changes.recv().await, Some(Some(session)));
        assert!(auth.is_signed_in());
    }
}
