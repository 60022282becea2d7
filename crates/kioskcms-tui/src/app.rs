//! Application state for the kiosk CMS console.
//!
//! `App` holds the login form and screen state. Whether the user is signed in
//! is owned by the session supervisor; the app follows it on every tick, so an
//! idle sign-out sends the user back to the login form with the reason shown.

use std::time::Duration;

use crossterm::event::{Event, KeyEventKind, MouseEventKind};
use tracing::{error, info, warn};

use kioskcms_core::{ActivityKind, Config, Credentials, Session, SupervisorHandle};

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for email input.
/// 254 is the longest valid email address.
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

// ============================================================================
// UI State Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    LoggingIn,
    Console,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Email,
    Password,
    Button,
}

impl LoginFocus {
    pub fn next(&self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Email,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Button,
            LoginFocus::Password => LoginFocus::Email,
            LoginFocus::Button => LoginFocus::Password,
        }
    }
}

pub struct App {
    config: Config,
    supervisor: SupervisorHandle,

    pub state: AppState,
    pub demo_mode: bool,

    // Login form state
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    /// Why the last session ended, shown once on the login form
    pub logout_notice: Option<String>,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(config: Config, supervisor: SupervisorHandle, demo_mode: bool) -> Self {
        let login_email = std::env::var("KIOSKCMS_EMAIL")
            .ok()
            .or_else(|| config.last_email.clone())
            .unwrap_or_default();

        let mut app = Self {
            config,
            supervisor,
            state: AppState::LoggingIn,
            demo_mode,
            login_email,
            login_password: String::new(),
            login_focus: LoginFocus::Email,
            login_error: None,
            logout_notice: None,
            status_message: None,
        };
        if app.supervisor.is_authenticated() {
            app.state = AppState::Console;
        } else {
            app.start_login();
        }
        app
    }

    // =========================================================================
    // Session
    // =========================================================================

    pub fn session(&self) -> Option<Session> {
        self.supervisor.session()
    }

    pub fn time_remaining(&self) -> Option<Duration> {
        self.supervisor.time_remaining()
    }

    pub fn timeout(&self) -> Duration {
        self.supervisor.timeout()
    }

    /// Forward terminal input to the supervisor as user activity.
    pub fn report_activity(&self, event: &Event) {
        if let Some(kind) = activity_for(event) {
            self.supervisor.report_activity(kind);
        }
    }

    /// Follow the supervisor: redirect to the login form when the session is
    /// gone and to the console once signed in.
    pub fn sync_with_supervisor(&mut self) {
        let authenticated = self.supervisor.is_authenticated();
        match self.state {
            AppState::Console | AppState::ConfirmingQuit if !authenticated => {
                info!("Session ended, returning to login");
                self.start_login();
            }
            AppState::LoggingIn if authenticated => {
                self.state = AppState::Console;
            }
            _ => {}
        }

        if let Some(reason) = self.supervisor.take_logout_reason() {
            self.logout_notice = Some(reason);
        }
    }

    /// Attempt login with the credentials from the login form. Failures are
    /// left in `login_error` for the form to show.
    pub async fn attempt_login(&mut self) {
        let email = self.login_email.trim().to_string();
        let password = self.login_password.clone();

        if email.is_empty() || password.is_empty() {
            self.login_error = Some("Email and password required".to_string());
            return;
        }

        self.login_error = None;
        self.logout_notice = None;

        match self.supervisor.sign_in(Credentials::new(email.clone(), password)).await {
            Ok(session) => {
                self.config.last_email = Some(email);
                if !self.demo_mode {
                    if let Err(e) = self.config.save() {
                        warn!(error = %e, "Failed to save config");
                    }
                }

                self.login_password.clear();
                self.state = AppState::Console;
                self.status_message = Some(format!("Signed in as {}", session.display_name()));
                info!(user = %session.user_id, "Login successful");
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                // The provider's message is shown as-is
                self.login_error = Some(e.to_string());
            }
        }
    }

    pub async fn sign_out(&mut self) {
        if let Err(e) = self.supervisor.sign_out().await {
            error!(error = %e, "Sign-out failed");
        }
        self.status_message = None;
        self.start_login();
    }

    /// Start the login process (show login form)
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_email.is_empty() {
            LoginFocus::Email
        } else {
            LoginFocus::Password
        };
        self.login_error = None;
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Map a terminal event to the activity it represents, if any.
///
/// Terminals have no touch input, so `TouchStart` never comes from here.
pub fn activity_for(event: &Event) -> Option<ActivityKind> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(ActivityKind::KeyPress),
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => Some(ActivityKind::PointerMove),
            MouseEventKind::Down(_) => Some(ActivityKind::PointerPress),
            MouseEventKind::ScrollUp
            | MouseEventKind::ScrollDown
            | MouseEventKind::ScrollLeft
            | MouseEventKind::ScrollRight => Some(ActivityKind::Scroll),
            MouseEventKind::Up(_) => None,
        },
        _ => None,
    }
}

/// Format a countdown as `m:ss` (or `h:mm:ss` past an hour).
pub fn format_countdown(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Describe the configured timeout, e.g. `15 minutes`, `1 minute` or `1 min 30 s`.
pub fn format_timeout(timeout: Duration) -> String {
    let secs = timeout.as_secs();
    let (minutes, seconds) = (secs / 60, secs % 60);
    match (minutes, seconds) {
        (1, 0) => "1 minute".to_string(),
        (m, 0) => format!("{} minutes", m),
        (0, s) => format!("{} s", s),
        (m, s) => format!("{} min {} s", m, s),
    }
}

/// Check if a character is valid for text input (printable ASCII or Unicode, no control chars)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if an email character should be accepted
pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent};

    fn mouse(kind: MouseEventKind) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column: 3,
            row: 4,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn test_activity_for_keys() {
        let press = Event::Key(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE));
        assert_eq!(activity_for(&press), Some(ActivityKind::KeyPress));

        let mut release = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(activity_for(&Event::Key(release)), None);
    }

    #[test]
    fn test_activity_for_mouse() {
        assert_eq!(
            activity_for(&mouse(MouseEventKind::Moved)),
            Some(ActivityKind::PointerMove)
        );
        assert_eq!(
            activity_for(&mouse(MouseEventKind::Drag(MouseButton::Left))),
            Some(ActivityKind::PointerMove)
        );
        assert_eq!(
            activity_for(&mouse(MouseEventKind::Down(MouseButton::Right))),
            Some(ActivityKind::PointerPress)
        );
        assert_eq!(
            activity_for(&mouse(MouseEventKind::ScrollDown)),
            Some(ActivityKind::Scroll)
        );
        assert_eq!(activity_for(&mouse(MouseEventKind::Up(MouseButton::Left))), None);
    }

    #[test]
    fn test_activity_for_other_events() {
        assert_eq!(activity_for(&Event::Resize(80, 24)), None);
        assert_eq!(activity_for(&Event::FocusGained), None);
    }

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(Duration::from_secs(0)), "0:00");
        assert_eq!(format_countdown(Duration::from_secs(59)), "0:59");
        assert_eq!(format_countdown(Duration::from_secs(15 * 60)), "15:00");
        assert_eq!(format_countdown(Duration::from_millis(61_900)), "1:01");
        assert_eq!(format_countdown(Duration::from_secs(3600 + 125)), "1:02:05");
    }

    #[test]
    fn test_format_timeout() {
        assert_eq!(format_timeout(Duration::from_secs(60)), "1 minute");
        assert_eq!(format_timeout(Duration::from_secs(15 * 60)), "15 minutes");
        assert_eq!(format_timeout(Duration::from_secs(90)), "1 min 30 s");
        assert_eq!(format_timeout(Duration::from_secs(45)), "45 s");
    }

    #[test]
    fn test_login_focus_cycles() {
        assert_eq!(LoginFocus::Email.next(), LoginFocus::Password);
        assert_eq!(LoginFocus::Password.next(), LoginFocus::Button);
        assert_eq!(LoginFocus::Button.next(), LoginFocus::Email); // Wraps around
        assert_eq!(LoginFocus::Email.prev(), LoginFocus::Button); // Wraps around
        assert_eq!(LoginFocus::Button.prev(), LoginFocus::Password);
    }

    #[test]
    fn test_can_add_email_char() {
        assert!(can_add_email_char(0, 'a'));
        assert!(can_add_email_char(0, '@'));
        assert!(!can_add_email_char(0, ' '));
        assert!(!can_add_email_char(MAX_EMAIL_LENGTH, 'a'));
        assert!(!can_add_email_char(0, '\n'));
    }

    #[test]
    fn test_can_add_password_char() {
        assert!(can_add_password_char(0, 'a'));
        assert!(can_add_password_char(127, ' '));
        // Exceeds max length
        assert!(!can_add_password_char(128, 'a'));
        // Control characters rejected
        assert!(!can_add_password_char(0, '\x00'));
        assert!(!can_add_password_char(0, '\r'));
    }
}
