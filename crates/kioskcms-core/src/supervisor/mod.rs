//! Idle-timeout session supervisor.
//!
//! The supervisor signs a user out after a period without input. It runs as
//! a single tokio task that owns the idle timer, the activity listener
//! registration and the persisted last-activity timestamp, and reacts to:
//!
//! - commands from the UI (sign in, sign out, shutdown)
//! - activity reported by input sources
//! - session changes announced by the auth provider
//! - the idle timer elapsing
//!
//! The last-activity timestamp lives in a `KeyValueStore` so a countdown that
//! ran out while the app was closed is caught on the next start.

pub mod activity;
pub mod notice;
pub mod timer;


use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::auth::{AuthProvider, Credentials, Session, SessionSubscription};
use crate::clock::{Clock, SystemClock};
use crate::error::AuthError;
use crate::store::KeyValueStore;

pub use activity::{ActivityKind, ActivityListeners, ActivityReporter};
pub use notice::LogoutNotice;
pub use timer::IdleTimer;

use activity::ActivityInbox;

/// Store key for the last-activity timestamp (milliseconds since epoch).
pub const LAST_ACTIVITY_KEY: &str = "cms_last_activity_ms";

/// Reason recorded when the idle timer signs the user out.
pub const SESSION_EXPIRED_REASON: &str = "Session expired. Please sign in again.";

/// Buffer size for UI commands. Commands are one-at-a-time user actions.
const COMMAND_BUFFER_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated(Session),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::Authenticated(session) => Some(session),
            AuthState::Anonymous => None,
        }
    }
}

enum Command {
    SignIn {
        credentials: Credentials,
        reply: oneshot::Sender<Result<Session, AuthError>>,
    },
    SignOut {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::SignIn { credentials, .. } => f.debug_tuple("SignIn").field(credentials).finish(),
            Command::SignOut { .. } => f.write_str("SignOut"),
            Command::Shutdown { .. } => f.write_str("Shutdown"),
        }
    }
}

/// Configures and starts a supervisor.
pub struct SessionSupervisor {
    timeout: Duration,
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl SessionSupervisor {
    pub fn new(timeout: Duration, auth: Arc<dyn AuthProvider>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            timeout,
            auth,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Restore any existing session and start supervising it.
    ///
    /// Returns once startup checks are done: if the stored last activity is
    /// older than the timeout, the session has already been signed out and
    /// the handle reports `Anonymous`.
    pub async fn start(self) -> SupervisorHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER_SIZE);
        let (reporter, inbox) = activity::channel();
        let (state_tx, state_rx) = watch::channel(AuthState::Anonymous);
        let (deadline_tx, deadline_rx) = watch::channel(None);
        let notice = LogoutNotice::new();

        // Subscribe before looking at the current session so nothing announced
        // in between is missed
        let changes = self.auth.subscribe();

        let mut worker = Worker {
            auth: self.auth,
            store: self.store,
            clock: self.clock,
            timer: IdleTimer::new(self.timeout),
            listeners: None,
            commands: command_rx,
            activity: inbox,
            changes: Some(changes),
            state: state_tx,
            deadline: deadline_tx,
            notice: notice.clone(),
        };
        worker.restore().await;
        tokio::spawn(worker.run());

        SupervisorHandle {
            commands: command_tx,
            state: state_rx,
            deadline: deadline_rx,
            notice,
            reporter,
            timeout: self.timeout,
        }
    }
}

/// UI-facing handle to a running supervisor. Cheap to clone; the supervisor
/// tears itself down once every handle is dropped.
#[derive(Debug, Clone)]
pub struct SupervisorHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<AuthState>,
    deadline: watch::Receiver<Option<Instant>>,
    notice: LogoutNotice,
    reporter: ActivityReporter,
    timeout: Duration,
}

impl SupervisorHandle {
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Receiver that is notified on every state transition.
    pub fn watch_state(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    /// When the pending idle timer fires; `None` while signed out.
    pub fn idle_deadline(&self) -> Option<Instant> {
        *self.deadline.borrow()
    }

    /// Time left before an idle sign-out, for countdown displays.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.idle_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The reason for the last forced sign-out, handed out once.
    pub fn take_logout_reason(&self) -> Option<String> {
        self.notice.take()
    }

    pub fn activity_reporter(&self) -> ActivityReporter {
        self.reporter.clone()
    }

    pub fn report_activity(&self, kind: ActivityKind) -> bool {
        self.reporter.report(kind)
    }

    /// Sign in; provider errors come back unchanged.
    pub async fn sign_in(&self, credentials: Credentials) -> Result<Session, AuthError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::SignIn { credentials, reply })
            .await
            .map_err(|_| AuthError::SupervisorStopped)?;
        rx.await.map_err(|_| AuthError::SupervisorStopped)?
    }

    /// Sign out. Always ends signed out; only fails if the supervisor is gone.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::SignOut { reply })
            .await
            .map_err(|_| AuthError::SupervisorStopped)?;
        rx.await.map_err(|_| AuthError::SupervisorStopped)
    }

    /// Stop supervising. Persisted activity is kept so the next start can
    /// resume the countdown.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

struct Worker {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    timer: IdleTimer,
    listeners: Option<ActivityListeners>,
    commands: mpsc::Receiver<Command>,
    activity: ActivityInbox,
    changes: Option<SessionSubscription>,
    state: watch::Sender<AuthState>,
    deadline: watch::Sender<Option<Instant>>,
    notice: LogoutNotice,
}

impl Worker {
    // =========================================================================
    // Startup
    // =========================================================================

    async fn restore(&mut self) {
        let session = match self.auth.current_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Failed to look up existing session");
                None
            }
        };
        let Some(session) = session else {
            debug!("No existing session");
            return;
        };

        let Some(last_activity) = self.read_last_activity() else {
            debug!(user = %session.user_id, "Existing session without recorded activity");
            self.begin_countdown(session);
            return;
        };

        let timeout = self.timer.timeout();
        let idle = Duration::from_millis((self.clock.now_ms() - last_activity).max(0) as u64);
        if idle > timeout {
            info!(
                user = %session.user_id,
                idle_secs = idle.as_secs(),
                "Session went idle past the timeout while closed"
            );
            self.force_logout().await;
        } else {
            debug!(user = %session.user_id, idle_secs = idle.as_secs(), "Resuming session countdown");
            self.timer.arm_for(timeout - idle);
            self.publish_deadline();
            self.enter_authenticated(session);
        }
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::SignIn { credentials, reply }) => {
                        let result = self.sign_in(credentials).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::SignOut { reply }) => {
                        self.sign_out().await;
                        let _ = reply.send(());
                    }
                    Some(Command::Shutdown { reply }) => {
                        self.teardown();
                        let _ = reply.send(());
                        return;
                    }
                    None => {
                        self.teardown();
                        return;
                    }
                },
                Some(kind) = self.activity.recv() => self.on_activity(kind),
                change = next_change(&mut self.changes) => match change {
                    Some(change) => self.on_session_change(change),
                    None => {
                        debug!("Auth provider closed its session notifications");
                        self.changes = None;
                    }
                },
                () = self.timer.elapsed() => {
                    info!(timeout_secs = self.timer.timeout().as_secs(), "Idle timeout reached");
                    self.force_logout().await;
                }
            }
        }
    }

    async fn sign_in(&mut self, credentials: Credentials) -> Result<Session, AuthError> {
        match self.auth.sign_in(&credentials).await {
            Ok(session) => {
                info!(user = %session.user_id, "Signed in");
                self.begin_countdown(session.clone());
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, email = %credentials.email, "Sign-in failed");
                Err(e)
            }
        }
    }

    async fn sign_out(&mut self) {
        info!("Signing out");
        self.timer.cancel();
        self.clear_last_activity();
        if let Err(e) = self.auth.sign_out().await {
            warn!(error = %e, "Sign-out request failed; continuing");
        }
        self.enter_anonymous(None);
    }

    fn on_activity(&mut self, kind: ActivityKind) {
        if self.listeners.is_none() {
            trace!(activity = %kind, "Activity ignored while signed out");
            return;
        }
        trace!(activity = %kind, "Activity");
        self.persist_now();
        self.timer.reset();
        self.publish_deadline();
    }

    fn on_session_change(&mut self, change: Option<Session>) {
        match change {
            Some(session) => {
                debug!(user = %session.user_id, "Session change: signed in");
                self.begin_countdown(session);
            }
            None => {
                if self.state.borrow().is_authenticated() {
                    info!("Session ended outside the supervisor");
                }
                self.timer.cancel();
                self.clear_last_activity();
                self.enter_anonymous(None);
            }
        }
    }

    /// Idle sign-out. Always ends `Anonymous`, whatever the provider says.
    async fn force_logout(&mut self) {
        self.timer.cancel();
        self.publish_deadline();
        self.clear_last_activity();
        if let Err(e) = self.auth.sign_out().await {
            warn!(error = %e, "Sign-out request failed during idle logout; continuing");
        }
        self.enter_anonymous(Some(SESSION_EXPIRED_REASON));
    }

    fn teardown(&mut self) {
        debug!("Session supervisor shutting down");
        self.timer.cancel();
        self.publish_deadline();
        self.listeners = None;
        if let Some(changes) = self.changes.take() {
            changes.unsubscribe();
        }
    }

    // =========================================================================
    // State transitions
    // =========================================================================

    fn begin_countdown(&mut self, session: Session) {
        self.persist_now();
        self.timer.reset();
        self.publish_deadline();
        self.enter_authenticated(session);
    }

    fn enter_authenticated(&mut self, session: Session) {
        if self.listeners.is_none() {
            self.listeners = Some(self.activity.register());
        }
        self.state.send_replace(AuthState::Authenticated(session));
    }

    fn enter_anonymous(&mut self, reason: Option<&str>) {
        self.timer.cancel();
        self.publish_deadline();
        self.listeners = None;
        if let Some(reason) = reason {
            self.notice.set(reason);
        }
        self.state.send_replace(AuthState::Anonymous);
    }

    fn publish_deadline(&self) {
        self.deadline.send_replace(self.timer.deadline());
    }

    // =========================================================================
    // Persisted last activity
    // =========================================================================

    fn read_last_activity(&self) -> Option<i64> {
        let raw = match self.store.get(LAST_ACTIVITY_KEY) {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(error = %e, "Failed to read last activity");
                return None;
            }
        };
        match raw.trim().parse::<i64>() {
            Ok(ms) if ms > 0 => Some(ms),
            _ => {
                warn!(value = %raw, "Ignoring invalid last activity value");
                None
            }
        }
    }

    fn persist_now(&self) {
        let now = self.clock.now_ms().to_string();
        if let Err(e) = self.store.set(LAST_ACTIVITY_KEY, &now) {
            warn!(error = %e, "Failed to record last activity");
        }
    }

    fn clear_last_activity(&self) {
        if let Err(e) = self.store.remove(LAST_ACTIVITY_KEY) {
            warn!(error = %e, "Failed to clear last activity");
        }
    }
}

/// Next session change, or never once unsubscribed.
async fn next_change(changes: &mut Option<SessionSubscription>) -> Option<Option<Session>> {
    match changes {
        Some(changes) => changes.recv().await,
        None => std::future::pending().await,
    }
}
