//! Logging observer
//! Writes every lifecycle transition to the structured log.

use crate::ports::{Event, EventKind, Observer};
use async_trait::async_trait;
use tracing::{info, warn};

pub struct LogObserver;

#[async_trait]
impl Observer for LogObserver {
    async fn on_event(&self, event: &Event) {
        match event.kind {
            EventKind::Started => {
                info!(program = %event.program, pid = event.pid, "process started");
            }
            EventKind::Stopped => {
                info!(program = %event.program, pid = event.pid, "process stopped by operator");
            }
            EventKind::Exited { exit_code } => {
                info!(program = %event.program, pid = event.pid, exit_code, "process exited");
            }
            EventKind::Fatal => {
                warn!(program = %event.program, "process gave up after exhausting retries");
            }
            EventKind::DaemonStarted => info!(pid = event.pid, "daemon started"),
            EventKind::DaemonStopping => info!(pid = event.pid, "daemon stopping"),
        }
    }
}
