//! Application configuration management.
//!
//! Configuration holds the auth backend location, the idle timeout and the
//! last email used to sign in. It is stored at `~/.config/kioskcms/config.json`;
//! environment variables (including a `.env` file loaded by the binary)
//! override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "kioskcms";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Idle timeout used when nothing is configured.
pub const DEFAULT_TIMEOUT_MINUTES: f64 = 15.0;

/// Shortest idle timeout accepted; smaller values are clamped up.
pub const MIN_TIMEOUT_MINUTES: f64 = 1.0;

/// Longest idle timeout accepted (one year); larger values are clamped down.
pub const MAX_TIMEOUT_MINUTES: f64 = 365.0 * 24.0 * 60.0;

pub const ENV_TIMEOUT_MINUTES: &str = "CMS_SESSION_TIMEOUT_MINUTES";
pub const ENV_BACKEND_URL: &str = "KIOSKCMS_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "KIOSKCMS_ANON_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub session_timeout_minutes: Option<String>,
    pub last_email: Option<String>,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend_url = Some(url);
        }
        if let Some(key) = lookup(ENV_ANON_KEY) {
            self.anon_key = Some(key);
        }
        if let Some(minutes) = lookup(ENV_TIMEOUT_MINUTES) {
            self.session_timeout_minutes = Some(minutes);
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// The idle timeout, read once by the supervisor at startup.
    pub fn session_timeout(&self) -> Duration {
        parse_timeout(self.session_timeout_minutes.as_deref())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

/// Turn a configured minutes value into the idle timeout.
///
/// Missing values use the 15 minute default, values below one minute are
/// clamped to one minute, values above a year are clamped to a year, and
/// values that are not a finite number fall back to the default with a
/// warning.
pub fn parse_timeout(raw: Option<&str>) -> Duration {
    let minutes = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => DEFAULT_TIMEOUT_MINUTES,
        Some(value) => match value.parse::<f64>() {
            Ok(m) if m.is_finite() => m,
            _ => {
                warn!(value = value, "Invalid session timeout, using default");
                DEFAULT_TIMEOUT_MINUTES
            }
        },
    };
    if minutes > MAX_TIMEOUT_MINUTES {
        warn!(minutes = minutes, max = MAX_TIMEOUT_MINUTES, "Session timeout too long, clamping");
    }
    Duration::from_secs_f64(minutes.clamp(MIN_TIMEOUT_MINUTES, MAX_TIMEOUT_MINUTES) * 60.0)
}
