//! Alerting observer
//! Appends a JSON record per event to the alert file and optionally
//! POSTs it to a webhook. Strictly fire-and-forget: every failure is
//! swallowed here, nothing reaches the control loop.

use crate::ports::{Event, EventKind, Observer};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(1);

pub struct AlertObserver {
    file: PathBuf,
    webhook: Option<String>,
}

impl AlertObserver {
    pub fn new(file: impl Into<PathBuf>, webhook: Option<String>) -> Self {
        Self {
            file: file.into(),
            webhook,
        }
    }

    fn payload(event: &Event) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "timestamp": event.at,
            "event": event.kind.as_str(),
            "program": event.program,
            "pid": event.pid,
        });
        if let EventKind::Exited { exit_code } = event.kind {
            payload["exit_code"] = exit_code.into();
        }
        payload
    }
}

#[async_trait]
impl Observer for AlertObserver {
    async fn on_event(&self, event: &Event) {
        let line = Self::payload(event).to_string();
        let file = self.file.clone();
        let webhook = self.webhook.clone();

        // blocking file/network I/O stays off the async workers
        let _ = tokio::task::spawn_blocking(move || {
            match OpenOptions::new().create(true).append(true).open(&file) {
                Ok(mut f) => {
                    if let Err(e) = writeln!(f, "{}", line) {
                        debug!(error = %e, "alert file write failed");
                    }
                }
                Err(e) => debug!(error = %e, "alert file open failed"),
            }

            if let Some(url) = webhook {
                let result = ureq::post(&url)
                    .timeout(WEBHOOK_TIMEOUT)
                    .set("Content-Type", "application/json")
                    .send_string(&line);
                if let Err(e) = result {
                    debug!(error = %e, "webhook delivery failed");
                }
            }
        })
        .await;
    }
}
