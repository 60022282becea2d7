//! Authentication providers and session types.
//!
//! This module provides:
//! - `AuthProvider`: the seam the session supervisor talks to
//! - `GoTrueAuth`: password auth against the hosted backend's auth endpoints
//! - `MemoryAuthProvider`: in-process accounts for demo runs and tests
//! - `Session` / `SessionFile`: the signed-in session and its on-disk copy
//!
//! Providers announce every sign-in and sign-out on a broadcast channel;
//! each `SessionSubscription` sees `Some(session)` or `None`.

pub mod gotrue;
pub mod memory;
pub mod session;

use std::fmt;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use crate::error::AuthError;

pub use gotrue::GoTrueAuth;
pub use memory::MemoryAuthProvider;
pub use session::{Session, SessionFile};

/// Buffer size for session-change broadcasts.
/// Changes are rare (sign-in/out), so a small buffer is plenty.
const CHANGE_BUFFER_SIZE: usize = 16;

/// Email/password pair entered on the login form.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    /// Sign in with email and password. Errors carry the provider's message.
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The session left over from a previous run, if still valid.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Receive a notification for every sign-in and sign-out.
    fn subscribe(&self) -> SessionSubscription;
}

/// Fan-out of session changes to every subscriber.
#[derive(Debug, Clone)]
pub struct SessionBroadcaster {
    tx: broadcast::Sender<Option<Session>>,
}

impl SessionBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_BUFFER_SIZE);
        Self { tx }
    }

    pub fn notify(&self, change: Option<Session>) {
        // No subscribers is fine
        let _ = self.tx.send(change);
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SessionBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// A live registration for session-change notifications.
#[derive(Debug)]
pub struct SessionSubscription {
    rx: broadcast::Receiver<Option<Session>>,
}

impl SessionSubscription {
    /// Wait for the next change. Returns `None` once the provider is gone.
    pub async fn recv(&mut self) -> Option<Option<Session>> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Session change subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}
