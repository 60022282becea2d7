use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Cap for deadlines that would overflow `Instant` (about 30 years out).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Single-shot idle countdown.
///
/// At most one deadline is pending at a time: `reset` and `arm_for` replace
/// it, `cancel` clears it. Cancelling an idle timer is a no-op.
#[derive(Debug)]
pub struct IdleTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl IdleTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Restart the full countdown from now.
    pub fn reset(&mut self) -> Instant {
        self.arm_for(self.timeout)
    }

    /// Restart the countdown with a custom remaining time, capped at
    /// `FAR_FUTURE`. A deadline `Instant` cannot represent fires at once.
    pub fn arm_for(&mut self, remaining: Duration) -> Instant {
        let now = Instant::now();
        let deadline = now.checked_add(remaining.min(FAR_FUTURE)).unwrap_or(now);
        self.deadline = Some(deadline);
        deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Completes once the pending deadline passes. Never completes while the
    /// timer is cancelled.
    pub async fn elapsed(&self) {
        match self.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
