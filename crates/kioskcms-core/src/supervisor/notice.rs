use std::sync::{Arc, Mutex, MutexGuard};

/// One-shot, in-memory message slot for telling the user why they were
/// signed out. Never persisted, so it does not survive a restart.
#[derive(Debug, Clone, Default)]
pub struct LogoutNotice {
    slot: Arc<Mutex<Option<String>>>,
}

impl LogoutNotice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, reason: impl Into<String>) {
        *self.slot() = Some(reason.into());
    }

    /// Take the reason for display; subsequent calls return `None`.
    pub fn take(&self) -> Option<String> {
        self.slot().take()
    }

    pub fn peek(&self) -> Option<String> {
        self.slot().clone()
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
