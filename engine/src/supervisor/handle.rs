//! Cloneable handle over the control loop's command queue.
//! The only way for control surfaces (socket listener, interactive
//! shell, signal tasks) to reach the program table.

use crate::domain::{ProgramConfig, Result, SupervisorError};
use crate::supervisor::command::{Command, ProgramStatus, ReloadSummary};
use tokio::sync::{mpsc, oneshot};

#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Command>,
}

impl SupervisorHandle {
    pub(crate) fn new(tx: mpsc::Sender<Command>) -> Self {
        Self { tx }
    }

    async fn submit<R>(
        &self,
        command: Command,
        reply: oneshot::Receiver<R>,
    ) -> Result<R> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SupervisorError::NotRunning)?;
        reply.await.map_err(|_| SupervisorError::NotRunning)
    }

    /// Replica counts for every program, sorted by name.
    pub async fn status(&self) -> Result<Vec<ProgramStatus>> {
        let (tx, rx) = oneshot::channel();
        self.submit(Command::Status { reply: tx }, rx).await
    }

    pub async fn start(&self, name: impl Into<String>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.submit(
            Command::Start {
                name: name.into(),
                reply: tx,
            },
            rx,
        )
        .await?
    }

    pub async fn stop(&self, name: impl Into<String>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.submit(
            Command::Stop {
                name: name.into(),
                reply: tx,
            },
            rx,
        )
        .await?
    }

    pub async fn restart(&self, name: impl Into<String>) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.submit(
            Command::Restart {
                name: name.into(),
                reply: tx,
            },
            rx,
        )
        .await?
    }

    /// Reconcile the program table against a freshly parsed descriptor
    /// list. Also used for the initial load: reconciling an empty table
    /// adds and autostarts everything.
    pub async fn apply_config(&self, programs: Vec<ProgramConfig>) -> Result<ReloadSummary> {
        let (tx, rx) = oneshot::channel();
        self.submit(
            Command::ApplyConfig {
                programs,
                reply: tx,
            },
            rx,
        )
        .await
    }

    /// Stop every program and terminate the control loop. Resolves once
    /// the children have been stopped (or forcibly killed after their
    /// grace period).
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.submit(Command::Shutdown { reply: tx }, rx).await
    }
}
