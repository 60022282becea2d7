//! Keyboard input handling for the TUI.
//!
//! Every key press has already been reported to the supervisor as activity
//! by the time it reaches here; this module only changes screen state.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{can_add_email_char, can_add_password_char, App, AppState, LoginFocus};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => handle_login_input(app, key).await,
        AppState::ConfirmingQuit => Ok(handle_quit_confirmation(app, key)),
        AppState::Console => {
            handle_console_input(app, key).await;
            Ok(false)
        }
        AppState::Quitting => Ok(true),
    }
}

async fn handle_console_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('o') => app.sign_out().await,
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Esc => app.status_message = None,
        _ => {}
    }
}

fn handle_quit_confirmation(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            app.state = AppState::Quitting;
            true
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.state = AppState::Console;
            false
        }
        _ => false,
    }
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = app.login_focus.next();
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = app.login_focus.prev();
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Email => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => app.attempt_login().await,
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Email => {
                app.login_email.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Email => {
                if can_add_email_char(app.login_email.chars().count(), c) {
                    app.login_email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crossterm::event::KeyModifiers;
    use kioskcms_core::{Config, MemoryAuthProvider, MemoryStore, SessionSupervisor};

    async fn demo_app() -> App {
        let auth = Arc::new(MemoryAuthProvider::new().with_account("admin@kiosk.local", "kiosk"));
        let supervisor = SessionSupervisor::new(Duration::from_secs(60), auth, Arc::new(MemoryStore::new()))
            .start()
            .await;
        let mut app = App::new(Config::default(), supervisor, true);
        app.login_email.clear();
        app.start_login();
        app
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_input(app, key(KeyCode::Char(c))).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_login_and_sign_out() {
        let mut app = demo_app().await;
        assert_eq!(app.state, AppState::LoggingIn);
        assert_eq!(app.login_focus, LoginFocus::Email);

        type_text(&mut app, "admin@kiosk.local").await;
        handle_input(&mut app, key(KeyCode::Tab)).await.unwrap();
        type_text(&mut app, "kiosk").await;
        handle_input(&mut app, key(KeyCode::Enter)).await.unwrap();

        assert_eq!(app.state, AppState::Console);
        assert!(app.login_password.is_empty());
        assert!(app.session().is_some());

        handle_input(&mut app, key(KeyCode::Char('o'))).await.unwrap();
        assert_eq!(app.state, AppState::LoggingIn);
        assert!(app.session().is_none());
    }

    #[tokio::test]
    async fn test_rejected_login_shows_provider_message() {
        let mut app = demo_app().await;
        type_text(&mut app, "admin@kiosk.local").await;
        handle_input(&mut app, key(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.login_focus, LoginFocus::Password);
        type_text(&mut app, "wrong").await;
        handle_input(&mut app, key(KeyCode::Enter)).await.unwrap();

        assert_eq!(app.state, AppState::LoggingIn);
        assert_eq!(app.login_error.as_deref(), Some("Invalid login credentials"));
    }

    #[tokio::test]
    async fn test_empty_login_stays_on_form() {
        let mut app = demo_app().await;
        app.login_focus = LoginFocus::Button;
        assert!(!handle_input(&mut app, key(KeyCode::Enter)).await.unwrap());

        assert_eq!(app.state, AppState::LoggingIn);
        assert_eq!(app.login_error.as_deref(), Some("Email and password required"));
        assert!(app.session().is_none());
    }

    #[tokio::test]
    async fn test_login_backspace_and_whitespace() {
        let mut app = demo_app().await;
        type_text(&mut app, "ab c").await;
        assert_eq!(app.login_email, "abc");
        handle_input(&mut app, key(KeyCode::Backspace)).await.unwrap();
        assert_eq!(app.login_email, "ab");
    }

    #[tokio::test]
    async fn test_quit_confirmation() {
        let mut app = demo_app().await;
        app.state = AppState::Console;

        handle_input(&mut app, key(KeyCode::Char('q'))).await.unwrap();
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(!handle_input(&mut app, key(KeyCode::Char('n'))).await.unwrap());
        assert_eq!(app.state, AppState::Console);

        handle_input(&mut app, key(KeyCode::Char('q'))).await.unwrap();
        assert!(handle_input(&mut app, key(KeyCode::Char('y'))).await.unwrap());
        assert_eq!(app.state, AppState::Quitting);
    }

    #[tokio::test]
    async fn test_escape_on_login_quits() {
        let mut app = demo_app().await;
        assert!(handle_input(&mut app, key(KeyCode::Esc)).await.unwrap());
    }
}
