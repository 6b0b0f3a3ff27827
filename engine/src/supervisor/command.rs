//! Commands accepted by the control loop and their reply shapes.
//! Control surfaces never touch the program table; every mutation is a
//! message through this channel, answered over a oneshot.

use crate::domain::{ProgramConfig, Result};
use tokio::sync::oneshot;

/// One line of `status` output: replica counts for a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramStatus {
    pub name: String,
    pub running: usize,
    pub desired: usize,
}

/// What a reconciliation did.
#[derive(Debug, Clone, Default)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub replaced: Vec<String>,
    /// Descriptors that failed structural validation; the rest of the
    /// reload proceeds without them.
    pub rejected: Vec<String>,
    pub unchanged: usize,
}

impl ReloadSummary {
    /// True when the reload touched nothing (the idempotent case).
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.replaced.is_empty()
            && self.rejected.is_empty()
    }
}

pub(crate) enum Command {
    Status {
        reply: oneshot::Sender<Vec<ProgramStatus>>,
    },
    Start {
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Restart {
        name: String,
        reply: oneshot::Sender<Result<()>>,
    },
    ApplyConfig {
        programs: Vec<ProgramConfig>,
        reply: oneshot::Sender<ReloadSummary>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}
