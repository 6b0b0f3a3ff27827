//! Process instance
//! One slot of a program's replica set, tracking the actual OS process
//! occupying it (if any).

use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle state of an instance.
///
/// There are only two recorded states. "Starting" and "stopping" are
/// transient conditions derived from the start timestamp and the signal
/// sent, not tracked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceState {
    #[default]
    Stopped,
    Running,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Stopped => write!(f, "stopped"),
            InstanceState::Running => write!(f, "running"),
        }
    }
}

/// Why an instance is stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// Never stopped, or stopped by a spontaneous exit.
    #[default]
    None,
    /// Stopped by an explicit operator action.
    User,
    /// Retry budget exhausted; no auto-restart until an explicit start
    /// or a config reload replaces the instance.
    Fatal,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::None => write!(f, "none"),
            StopReason::User => write!(f, "user"),
            StopReason::Fatal => write!(f, "fatal"),
        }
    }
}

/// One process slot of a program.
///
/// Instances are positional within their program and never outlive a
/// config replacement: a reload that changes the program's config
/// discards the old instances and allocates fresh ones.
#[derive(Debug, Clone, Default)]
pub struct Instance {
    pid: Option<u32>,
    state: InstanceState,
    exit_code: Option<i32>,
    started_at: Option<Instant>,
    retry_count: u32,
    stop_reason: StopReason,
}

impl Instance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn stop_reason(&self) -> StopReason {
        self.stop_reason
    }

    pub fn is_running(&self) -> bool {
        self.state == InstanceState::Running
    }

    /// Time the current (or last) process has been alive.
    ///
    /// The start timestamp survives an exit so the restart decision can
    /// compare uptime against the configured start window; it is only
    /// replaced by the next start.
    pub fn alive_time(&self) -> Duration {
        self.started_at
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO)
    }

    /// Record a successful spawn: pid and start time, prior exit code
    /// cleared. The retry counter is deliberately left untouched; it is
    /// only advanced by the restart-decision path.
    pub fn mark_started(&mut self, pid: u32) {
        self.pid = Some(pid);
        self.state = InstanceState::Running;
        self.exit_code = None;
        self.started_at = Some(Instant::now());
        self.stop_reason = StopReason::None;
    }

    /// Record an observed OS exit.
    pub fn mark_exited(&mut self, exit_code: i32) {
        self.pid = None;
        self.state = InstanceState::Stopped;
        self.exit_code = Some(exit_code);
    }

    /// Record an explicit operator stop. Optimistic: the instance is
    /// stopped immediately, without waiting for the exit notification.
    pub fn mark_stopped_by_user(&mut self) {
        self.pid = None;
        self.state = InstanceState::Stopped;
        self.stop_reason = StopReason::User;
    }

    /// Mark the instance fatal: the retry budget is exhausted.
    pub fn mark_fatal(&mut self) {
        self.state = InstanceState::Stopped;
        self.stop_reason = StopReason::Fatal;
    }

    /// Consume one attempt of the retry budget.
    pub fn record_retry(&mut self) {
        self.retry_count += 1;
    }
}
