//! Command dispatcher
//! Stateless translation between command lines and engine operations,
//! shared by the socket server and the interactive shell. Responses are
//! single lines (`OK ...` / `ERR ...`), with `status` allowed to span
//! several.

use crate::config;
use crate::supervisor::SupervisorHandle;
use std::fmt::Write as _;
use std::path::PathBuf;
use tracing::warn;

/// What a dispatched command asks of the surface that ran it.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Reply(String),
    /// Write the reply, then initiate supervisor shutdown.
    Shutdown(String),
}

impl Outcome {
    pub fn reply(&self) -> &str {
        match self {
            Outcome::Reply(s) | Outcome::Shutdown(s) => s,
        }
    }
}

#[derive(Clone)]
pub struct ControlSurface {
    handle: SupervisorHandle,
    /// Re-parsed on every `reload`; `None` disables the verb.
    config_path: Option<PathBuf>,
}

impl ControlSurface {
    pub fn new(handle: SupervisorHandle, config_path: Option<PathBuf>) -> Self {
        Self {
            handle,
            config_path,
        }
    }

    pub fn handle(&self) -> &SupervisorHandle {
        &self.handle
    }

    pub async fn dispatch(&self, line: &str) -> Outcome {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Outcome::Reply("ERR empty command".to_string());
        };
        let arg = parts.next();
        if parts.next().is_some() {
            return Outcome::Reply(format!("ERR too many arguments for '{}'", verb));
        }

        match (verb, arg) {
            ("status", None) => Outcome::Reply(self.status().await),
            ("start", Some(name)) => Outcome::Reply(match self.handle.start(name).await {
                Ok(()) => format!("OK started {}", name),
                Err(e) => format!("ERR {}", e),
            }),
            ("stop", Some(name)) => Outcome::Reply(match self.handle.stop(name).await {
                Ok(()) => format!("OK stopped {}", name),
                Err(e) => format!("ERR {}", e),
            }),
            ("restart", Some(name)) => Outcome::Reply(match self.handle.restart(name).await {
                Ok(()) => format!("OK restarted {}", name),
                Err(e) => format!("ERR {}", e),
            }),
            ("reload", None) => Outcome::Reply(self.reload().await),
            ("shutdown", None) => Outcome::Shutdown("OK shutdown".to_string()),
            ("start" | "stop" | "restart", None) => {
                Outcome::Reply(format!("ERR usage: {} <program>", verb))
            }
            ("status" | "reload" | "shutdown", Some(_)) => {
                Outcome::Reply(format!("ERR usage: {}", verb))
            }
            (other, _) => Outcome::Reply(format!("ERR unknown command '{}'", other)),
        }
    }

    async fn status(&self) -> String {
        match self.handle.status().await {
            Ok(statuses) if statuses.is_empty() => "OK no programs".to_string(),
            Ok(statuses) => {
                let mut out = String::new();
                for (i, s) in statuses.iter().enumerate() {
                    if i > 0 {
                        out.push('\n');
                    }
                    let _ = write!(out, "{} RUNNING {}/{}", s.name, s.running, s.desired);
                }
                out
            }
            Err(e) => format!("ERR {}", e),
        }
    }

    async fn reload(&self) -> String {
        let Some(path) = &self.config_path else {
            return "ERR no configuration file to reload".to_string();
        };
        let configs = match config::load_file(path) {
            Ok(configs) => configs,
            Err(e) => {
                warn!(error = %e, "reload failed");
                return format!("ERR reload failed: {}", e);
            }
        };
        match self.handle.apply_config(configs).await {
            Ok(_) => "OK reload done".to_string(),
            Err(e) => format!("ERR {}", e),
        }
    }
}
