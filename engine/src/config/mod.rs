//! Configuration loading from YAML
//!
//! One file, a `programs:` map keyed by program name. The loader owns
//! defaulting, signal-name resolution and umask parsing; the engine
//! only ever sees the finished `ProgramConfig` descriptors.

use crate::domain::{ProgramConfig, RestartPolicy, Result, SupervisorError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Top-level configuration structure.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    programs: HashMap<String, RawProgram>,
}

/// One program entry as written in YAML.
#[derive(Debug, Deserialize, Clone)]
struct RawProgram {
    cmd: String,

    #[serde(default = "default_numprocs")]
    numprocs: usize,

    #[serde(default)]
    autostart: bool,

    #[serde(default)]
    autorestart: Option<String>,

    #[serde(default)]
    exitcodes: Option<ExitCodes>,

    #[serde(default = "default_startretries")]
    startretries: u32,

    /// Seconds of uptime required before a disallowed exit stops being
    /// a startup failure.
    #[serde(default = "default_starttime")]
    starttime: u64,

    #[serde(default)]
    stopsignal: Option<SignalSpec>,

    /// Seconds of grace between the stop signal and SIGKILL.
    #[serde(default = "default_stoptime")]
    stoptime: u64,

    #[serde(default)]
    stdout: Option<String>,

    #[serde(default)]
    stderr: Option<String>,

    #[serde(default)]
    workingdir: Option<String>,

    #[serde(default)]
    umask: Option<UmaskSpec>,

    #[serde(default)]
    env: HashMap<String, String>,
}

fn default_numprocs() -> usize {
    1
}

fn default_startretries() -> u32 {
    3
}

fn default_starttime() -> u64 {
    1
}

fn default_stoptime() -> u64 {
    10
}

/// `exitcodes: 0` and `exitcodes: [0, 2]` are both accepted.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
enum ExitCodes {
    One(i32),
    Many(Vec<i32>),
}

impl ExitCodes {
    fn into_vec(self) -> Vec<i32> {
        match self {
            ExitCodes::One(code) => vec![code],
            ExitCodes::Many(codes) => codes,
        }
    }
}

/// `stopsignal: TERM`, `stopsignal: SIGTERM` or a raw number.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
enum SignalSpec {
    Name(String),
    Number(i32),
}

impl SignalSpec {
    fn resolve(&self) -> Result<i32> {
        match self {
            SignalSpec::Number(n) => Ok(*n),
            SignalSpec::Name(name) => {
                let stripped = name.trim().to_uppercase();
                let stripped = stripped.strip_prefix("SIG").unwrap_or(&stripped);
                match stripped {
                    "TERM" => Ok(libc::SIGTERM),
                    "INT" => Ok(libc::SIGINT),
                    "QUIT" => Ok(libc::SIGQUIT),
                    "HUP" => Ok(libc::SIGHUP),
                    "USR1" => Ok(libc::SIGUSR1),
                    "USR2" => Ok(libc::SIGUSR2),
                    "KILL" => Ok(libc::SIGKILL),
                    other => Err(SupervisorError::InvalidConfiguration(format!(
                        "unknown stop signal '{}'",
                        other
                    ))),
                }
            }
        }
    }
}

/// `umask: "022"` (octal string) or a raw integer already in octal
/// form as YAML parses it.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
enum UmaskSpec {
    Text(String),
    Raw(u32),
}

impl UmaskSpec {
    fn resolve(&self) -> Result<u32> {
        match self {
            UmaskSpec::Raw(n) => Ok(*n),
            UmaskSpec::Text(s) => u32::from_str_radix(s.trim(), 8).map_err(|_| {
                SupervisorError::InvalidConfiguration(format!("invalid umask '{}'", s))
            }),
        }
    }
}

impl RawProgram {
    fn into_config(self, name: String) -> Result<ProgramConfig> {
        let autorestart = match self.autorestart.as_deref() {
            None => RestartPolicy::default(),
            Some(s) => RestartPolicy::parse(s).ok_or_else(|| {
                SupervisorError::InvalidConfiguration(format!(
                    "unknown autorestart policy '{}'",
                    s
                ))
            })?,
        };

        let mut config = ProgramConfig::new(name, self.cmd);
        config.numprocs = self.numprocs;
        config.autostart = self.autostart;
        config.autorestart = autorestart;
        if let Some(codes) = self.exitcodes {
            config.exitcodes = codes.into_vec();
        }
        config.startretries = self.startretries;
        config.starttime = Duration::from_secs(self.starttime);
        if let Some(signal) = &self.stopsignal {
            config.stopsignal = signal.resolve()?;
        }
        config.stoptime = Duration::from_secs(self.stoptime);
        config.stdout = self.stdout.map(Into::into);
        config.stderr = self.stderr.map(Into::into);
        config.workingdir = self.workingdir.map(Into::into);
        if let Some(umask) = &self.umask {
            config.umask = Some(umask.resolve()?);
        }
        config.env = self.env;

        config.validate()?;
        Ok(config)
    }
}

/// Parse a configuration file into program descriptors, sorted by name.
///
/// File-level problems (unreadable file, YAML syntax) fail the whole
/// load; a bad individual entry fails only that program and is logged.
pub fn load_file(path: impl AsRef<Path>) -> Result<Vec<ProgramConfig>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    load_str(&text)
}

/// Same as [`load_file`], from an in-memory document.
pub fn load_str(text: &str) -> Result<Vec<ProgramConfig>> {
    let file: ConfigFile = serde_yaml::from_str(text)
        .map_err(|e| SupervisorError::InvalidConfiguration(e.to_string()))?;

    let mut configs = Vec::new();
    for (name, raw) in file.programs {
        match raw.into_config(name.clone()) {
            Ok(config) => configs.push(config),
            Err(e) => {
                warn!(program = %name, error = %e, "skipping invalid program entry");
            }
        }
    }
    configs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(configs)
}
