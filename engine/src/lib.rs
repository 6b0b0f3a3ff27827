//! Single-host process supervisor engine.
//!
//! Launches configured child programs, keeps them alive according to
//! their restart policies, exposes live status and reconciles config
//! reloads. The control loop in [`supervisor`] owns all state; control
//! surfaces reach it through a [`SupervisorHandle`], and child exits
//! arrive over a queue fed by per-child watcher tasks.

pub mod bootstrap;
pub mod config;
pub mod control;
pub mod domain;
pub mod launcher;
pub mod observers;
pub mod ports;
pub mod supervisor;

pub use domain::{
    Instance, InstanceState, Program, ProgramConfig, RestartPolicy, StopReason, SupervisorError,
};
pub use ports::{Event, EventKind, Observer, ObserverSet, ProcessLauncher, SpawnRecipe, SpawnedChild};
pub use supervisor::{ProgramStatus, ReloadSummary, Supervisor, SupervisorHandle};

/// Default control socket path.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/svd.sock";
