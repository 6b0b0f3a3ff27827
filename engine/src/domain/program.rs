//! Program: a named desired-state unit
//! Immutable configuration plus the positional replica set of instances.

use crate::domain::{Instance, RestartPolicy, SupervisorError};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable program descriptor.
///
/// Produced by the configuration loader; the engine only checks
/// structural invariants (`validate`) and otherwise trusts the shape.
/// Identity is the name; a reload replaces the whole struct atomically
/// per program.
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    pub name: String,
    /// Command line, run through `/bin/sh -c` so shell syntax works.
    pub cmd: String,
    pub numprocs: usize,
    pub autostart: bool,
    pub autorestart: RestartPolicy,
    /// Exit codes considered expected. Non-empty; defaults to `[0]`.
    pub exitcodes: Vec<i32>,
    /// Shared retry budget per instance across all restart causes.
    pub startretries: u32,
    /// Minimum uptime below which a disallowed exit counts as a
    /// startup failure.
    pub starttime: Duration,
    pub stopsignal: i32,
    /// Grace period between the stop signal and the SIGKILL escalation.
    pub stoptime: Duration,
    /// Append-mode redirection target; `None` pipes the stream to the
    /// log-streaming observer.
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
    pub workingdir: Option<PathBuf>,
    pub umask: Option<u32>,
    /// Environment overlay merged over the inherited environment.
    pub env: HashMap<String, String>,
}

impl ProgramConfig {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            numprocs: 1,
            autostart: false,
            autorestart: RestartPolicy::default(),
            exitcodes: vec![0],
            startretries: 3,
            starttime: Duration::from_secs(1),
            stopsignal: libc::SIGTERM,
            stoptime: Duration::from_secs(10),
            stdout: None,
            stderr: None,
            workingdir: None,
            umask: None,
            env: HashMap::new(),
        }
    }

    pub fn numprocs(mut self, n: usize) -> Self {
        self.numprocs = n;
        self
    }

    pub fn autostart(mut self, on: bool) -> Self {
        self.autostart = on;
        self
    }

    pub fn autorestart(mut self, policy: RestartPolicy) -> Self {
        self.autorestart = policy;
        self
    }

    pub fn exitcodes(mut self, codes: Vec<i32>) -> Self {
        self.exitcodes = codes;
        self
    }

    pub fn startretries(mut self, retries: u32) -> Self {
        self.startretries = retries;
        self
    }

    pub fn starttime(mut self, t: Duration) -> Self {
        self.starttime = t;
        self
    }

    pub fn stopsignal(mut self, signal: i32) -> Self {
        self.stopsignal = signal;
        self
    }

    pub fn stoptime(mut self, t: Duration) -> Self {
        self.stoptime = t;
        self
    }

    pub fn stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    pub fn stderr(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr = Some(path.into());
        self
    }

    pub fn workingdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workingdir = Some(dir.into());
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Structural invariants the engine insists on even for descriptors
    /// coming from a trusted loader.
    pub fn validate(&self) -> Result<(), SupervisorError> {
        if self.name.is_empty() || self.name.contains(char::is_whitespace) {
            return Err(SupervisorError::InvalidConfiguration(format!(
                "invalid program name '{}'",
                self.name
            )));
        }
        if self.cmd.is_empty() {
            return Err(SupervisorError::InvalidConfiguration(format!(
                "program '{}' has an empty command",
                self.name
            )));
        }
        if self.exitcodes.is_empty() {
            return Err(SupervisorError::InvalidConfiguration(format!(
                "program '{}' has an empty exit-code set",
                self.name
            )));
        }
        Ok(())
    }

    pub fn is_exit_code_allowed(&self, code: i32) -> bool {
        self.exitcodes.contains(&code)
    }

    /// Equality used by the reload reconciler to decide whether a
    /// program must be bounced. Environment, working directory and
    /// umask are deliberately not compared: changing only those does
    /// not replace running instances (use an explicit restart).
    pub fn reload_equal(&self, other: &ProgramConfig) -> bool {
        self.cmd == other.cmd
            && self.autorestart == other.autorestart
            && self.autostart == other.autostart
            && self.numprocs == other.numprocs
            && self.stdout == other.stdout
            && self.stderr == other.stderr
    }
}

/// A named program: its immutable config plus the positional instance
/// list, always exactly `numprocs` long.
#[derive(Debug)]
pub struct Program {
    config: ProgramConfig,
    instances: Vec<Instance>,
    /// Gates `start` and autostart only; the restart-decision algorithm
    /// never consults it.
    disabled: bool,
}

impl Program {
    pub fn new(config: ProgramConfig) -> Self {
        let instances = (0..config.numprocs).map(|_| Instance::new()).collect();
        Self {
            config,
            instances,
            disabled: false,
        }
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instances_mut(&mut self) -> &mut [Instance] {
        &mut self.instances
    }

    pub fn desired(&self) -> usize {
        self.config.numprocs
    }

    pub fn running_count(&self) -> usize {
        self.instances.iter().filter(|i| i.is_running()).count()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }
}
