use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// An authenticated session as handed out by an auth provider.
///
/// The supervisor only cares whether one exists; the tokens are for the
/// backend client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, email: Option<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email,
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Whether the access token has passed its expiry. Sessions without an
    /// expiry never expire on their own.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Utc::now() >= at).unwrap_or(false)
    }

    /// Name to show in the UI
    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.user_id)
    }
}

/// On-disk copy of the signed-in session so it outlives the process.
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(SESSION_FILE),
        }
    }

    /// Load the session from disk. Expired sessions are reported as absent.
    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        let session: Session = serde_json::from_str(&contents).context("Failed to parse session file")?;

        if session.is_expired() {
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
