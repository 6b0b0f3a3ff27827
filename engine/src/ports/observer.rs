//! Observer extension point
//! Passive listeners invoked on lifecycle transitions. Observers get
//! copies of the event data only and must never reach back into the
//! program table; their failures are fully isolated from the engine.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A child process was spawned.
    Started,
    /// An instance was stopped by explicit operator action.
    Stopped,
    /// A child process exited spontaneously.
    Exited { exit_code: i32 },
    /// An instance exhausted its retry budget.
    Fatal,
    DaemonStarted,
    DaemonStopping,
}

impl EventKind {
    /// Stable wire name, used in alert payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Started => "process_started",
            EventKind::Stopped => "process_stopped",
            EventKind::Exited { .. } => "process_exited",
            EventKind::Fatal => "process_fatal",
            EventKind::DaemonStarted => "daemon_started",
            EventKind::DaemonStopping => "daemon_stopping",
        }
    }
}

/// One lifecycle event. Carries copies only.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub program: String,
    pub pid: Option<u32>,
    /// Seconds since the Unix epoch at emission time.
    pub at: u64,
}

impl Event {
    pub fn new(kind: EventKind, program: impl Into<String>, pid: Option<u32>) -> Self {
        let at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            kind,
            program: program.into(),
            pid,
            at,
        }
    }
}

/// Extension point for lifecycle notifications.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn on_event(&self, event: &Event);
}

/// Fan-out over the registered observers.
///
/// Each delivery runs on its own detached task, so a slow, failing or
/// panicking observer can never affect the control loop or the other
/// observers.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn Observer>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn emit(&self, event: Event) {
        for observer in &self.observers {
            let observer = observer.clone();
            let event = event.clone();
            tokio::spawn(async move {
                observer.on_event(&event).await;
            });
        }
    }
}
