//! Kiosk CMS admin console.
//!
//! A keyboard-driven terminal console that signs the admin out after a period
//! without input. Run with `--demo` to use a built-in account instead of the
//! hosted auth backend.

mod app;
mod ui;

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kioskcms_core::{
    AuthProvider, Config, FileStore, GoTrueAuth, KeyValueStore, MemoryAuthProvider, MemoryStore,
    SessionSupervisor,
};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file name inside the cache directory
const LOG_FILE: &str = "kioskcms.log";

/// Built-in account for `--demo`
const DEMO_EMAIL: &str = "admin@kiosk.local";
const DEMO_PASSWORD: &str = "kiosk";

/// Initialize the tracing subscriber for logging.
///
/// The terminal is owned by the UI, so logs go to a file in `log_dir`.
/// Use RUST_LOG to control the level (e.g. RUST_LOG=kioskcms_core=debug).
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE));
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let demo_mode = std::env::args().skip(1).any(|arg| arg == "--demo");

    let config = Config::load()?;
    let cache_dir = config.cache_dir()?;
    let _log_guard = init_tracing(&cache_dir)?;
    info!(demo = demo_mode, "Kiosk CMS console starting");

    let (auth, store): (Arc<dyn AuthProvider>, Arc<dyn KeyValueStore>) = if demo_mode {
        (
            Arc::new(MemoryAuthProvider::new().with_account(DEMO_EMAIL, DEMO_PASSWORD)),
            Arc::new(MemoryStore::new()),
        )
    } else {
        let auth = GoTrueAuth::from_config(&config).context(
            "Auth backend not configured. Set KIOSKCMS_BACKEND_URL and KIOSKCMS_ANON_KEY, or run with --demo",
        )?;
        (Arc::new(auth), Arc::new(FileStore::open(&cache_dir)?))
    };

    let timeout = config.session_timeout();
    info!(timeout_secs = timeout.as_secs(), "Idle timeout configured");
    let supervisor = SessionSupervisor::new(timeout, auth, store).start().await;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, supervisor.clone(), demo_mode);
    if demo_mode {
        app.login_email = DEMO_EMAIL.to_string();
        app.start_login();
        app.status_message = Some(format!("Demo mode: password is \"{}\"", DEMO_PASSWORD));
    }

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    supervisor.shutdown().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Kiosk CMS console shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| render(f, app))?;

        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            let event = event::read()?;
            app.report_activity(&event);

            if let Event::Key(key) = event {
                // Only handle key press events, not release
                if key.kind == KeyEventKind::Press {
                    // Handle Ctrl+C
                    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                        return Ok(());
                    }

                    if handle_input(app, key).await? {
                        return Ok(());
                    }
                }
            }
        }

        app.sync_with_supervisor();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
