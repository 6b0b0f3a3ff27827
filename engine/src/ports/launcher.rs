//! ProcessLauncher port
//! Interface between the supervision engine and the platform-specific
//! process launch mechanism. The engine only ever hands over a
//! `SpawnRecipe` value object, which keeps the restart-decision logic
//! testable against a fake launcher.

use crate::domain::{ProgramConfig, SupervisorError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

/// Everything a launcher needs to start one child process.
#[derive(Debug, Clone)]
pub struct SpawnRecipe {
    /// Owning program name, used for log/stream tagging only.
    pub program: String,
    /// Command line, executed through a shell.
    pub cmd: String,
    /// Append-mode redirection target; `None` means the stream is piped
    /// to the launcher's output forwarding.
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
    pub workingdir: Option<PathBuf>,
    pub umask: Option<u32>,
    pub env: HashMap<String, String>,
}

impl SpawnRecipe {
    pub fn from_config(config: &ProgramConfig) -> Self {
        Self {
            program: config.name.clone(),
            cmd: config.cmd.clone(),
            stdout: config.stdout.clone(),
            stderr: config.stderr.clone(),
            workingdir: config.workingdir.clone(),
            umask: config.umask,
            env: config.env.clone(),
        }
    }
}

/// Future resolving to the child's exit code once the OS reports it.
pub type ExitFuture = Pin<Box<dyn Future<Output = Result<i32, SupervisorError>> + Send>>;

/// A successfully launched child.
pub struct SpawnedChild {
    pub pid: u32,
    /// Awaited by a watcher task; never by the control loop itself.
    pub exit: ExitFuture,
}

impl std::fmt::Debug for SpawnedChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedChild").field("pid", &self.pid).finish()
    }
}

/// Port for launching and signaling OS processes.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Launch a child according to the recipe. Failures to set up the
    /// launch on the parent side are reported here; failures inside the
    /// child surface only through the exit future.
    async fn spawn(&self, recipe: SpawnRecipe) -> Result<SpawnedChild, SupervisorError>;

    /// Deliver a signal to a pid.
    fn signal(&self, pid: u32, signal: i32) -> Result<(), SupervisorError>;

    /// Best-effort liveness probe, used by the stop-grace escalation.
    fn is_alive(&self, pid: u32) -> bool;
}
