use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::KeyValueStore;
use crate::error::StoreError;

/// Store file name in cache directory
const STORE_FILE: &str = "activity.json";

/// Key-value store backed by a single JSON object on disk.
///
/// Entries are held in memory and written through on every change, so a
/// value set before the process exits is visible to the next run.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open (or create) the store in `cache_dir`.
    ///
    /// A corrupt store file is discarded with a warning; losing the
    /// last-activity timestamp only means the next session starts a fresh
    /// countdown.
    pub fn open(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("Failed to create cache directory {}", cache_dir.display()))?;
        let path = cache_dir.join(STORE_FILE);

        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store file {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Discarding corrupt store file");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "Store opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    fn flush(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.lock()?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}
