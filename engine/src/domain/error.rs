//! Engine-level errors
//! These represent supervision failures, not child-process failures:
//! anything that happens inside a child is observable only through its
//! exit code and timing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("program '{0}' not found")]
    ProgramNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to spawn process: {0}")]
    Spawn(String),

    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("supervisor is not running")]
    NotRunning,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
