use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// User input that counts as activity and restarts the idle countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    PointerMove,
    PointerPress,
    KeyPress,
    TouchStart,
    Scroll,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 5] = [
        ActivityKind::PointerMove,
        ActivityKind::PointerPress,
        ActivityKind::KeyPress,
        ActivityKind::TouchStart,
        ActivityKind::Scroll,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ActivityKind::PointerMove => "pointer-move",
            ActivityKind::PointerPress => "pointer-press",
            ActivityKind::KeyPress => "key-press",
            ActivityKind::TouchStart => "touch-start",
            ActivityKind::Scroll => "scroll",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handed to input sources; forwards activity to the supervisor while
/// listeners are registered and drops it otherwise.
#[derive(Debug, Clone)]
pub struct ActivityReporter {
    tx: mpsc::UnboundedSender<ActivityKind>,
    registered: Arc<AtomicBool>,
}

impl ActivityReporter {
    /// Report one activity signal. Returns whether it was delivered.
    pub fn report(&self, kind: ActivityKind) -> bool {
        if !self.is_listening() {
            return false;
        }
        self.tx.send(kind).is_ok()
    }

    pub fn is_listening(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }
}

/// Supervisor side of the activity channel.
#[derive(Debug)]
pub struct ActivityInbox {
    rx: mpsc::UnboundedReceiver<ActivityKind>,
    registered: Arc<AtomicBool>,
}

impl ActivityInbox {
    pub async fn recv(&mut self) -> Option<ActivityKind> {
        self.rx.recv().await
    }

    /// Start accepting activity. Held for as long as a session is active.
    pub fn register(&self) -> ActivityListeners {
        self.registered.store(true, Ordering::Release);
        ActivityListeners {
            registered: Arc::clone(&self.registered),
        }
    }
}

/// Registration guard for the activity listeners; dropping it unregisters.
#[derive(Debug)]
pub struct ActivityListeners {
    registered: Arc<AtomicBool>,
}

impl Drop for ActivityListeners {
    fn drop(&mut self) {
        self.registered.store(false, Ordering::Release);
    }
}

pub fn channel() -> (ActivityReporter, ActivityInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    let registered = Arc::new(AtomicBool::new(false));
    (
        ActivityReporter {
            tx,
            registered: Arc::clone(&registered),
        },
        ActivityInbox { rx, registered },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_dropped_until_registered() {
        let (reporter, mut inbox) = channel();
        assert!(!reporter.report(ActivityKind::KeyPress));

        let listeners = inbox.register();
        assert!(reporter.report(ActivityKind::Scroll));
        assert_eq!(inbox.recv().await, Some(ActivityKind::Scroll));

        drop(listeners);
        assert!(!reporter.is_listening());
        assert!(!reporter.report(ActivityKind::PointerMove));
    }

    #[tokio::test]
    async fn test_reports_arrive_in_order() {
        let (reporter, mut inbox) = channel();
        let _listeners = inbox.register();
        for kind in ActivityKind::ALL {
            assert!(reporter.clone().report(kind));
        }
        for kind in ActivityKind::ALL {
            assert_eq!(inbox.recv().await, Some(kind));
        }
    }

    #[test]
    fn test_report_after_inbox_dropped() {
        let (reporter, inbox) = channel();
        let listeners = inbox.register();
        drop(inbox);
        assert!(!reporter.report(ActivityKind::TouchStart));
        drop(listeners);
    }

    #[test]
    fn test_names() {
        let names: Vec<_> = ActivityKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            names,
            ["pointer-move", "pointer-press", "key-press", "touch-start", "scroll"]
        );
    }
}
