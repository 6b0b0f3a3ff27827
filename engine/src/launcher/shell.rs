//! Shell launcher
//! Real implementation of the ProcessLauncher port: runs each program's
//! command line through `/bin/sh -c` with the recipe's redirections,
//! working directory, umask and environment overlay applied.

use crate::domain::{Result, SupervisorError};
use crate::launcher::stream;
use crate::ports::{ProcessLauncher, SpawnRecipe, SpawnedChild};
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

pub struct ShellLauncher {
    /// Pipe unredirected child output through the log stream instead of
    /// discarding it.
    stream_output: bool,
}

impl ShellLauncher {
    pub fn new(stream_output: bool) -> Self {
        Self { stream_output }
    }

    /// Open an append-mode redirection target, or pick the piped/null
    /// fallback for unredirected streams.
    fn output_target(&self, path: Option<&Path>) -> Result<Stdio> {
        match path {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| {
                        SupervisorError::Spawn(format!(
                            "failed to open redirection target '{}': {}",
                            path.display(),
                            e
                        ))
                    })?;
                Ok(Stdio::from(file))
            }
            None if self.stream_output => Ok(Stdio::piped()),
            None => Ok(Stdio::null()),
        }
    }
}

impl Default for ShellLauncher {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ProcessLauncher for ShellLauncher {
    async fn spawn(&self, recipe: SpawnRecipe) -> Result<SpawnedChild> {
        let mut command = Command::new("/bin/sh");
        command.arg("-c").arg(&recipe.cmd);
        command.stdin(Stdio::null());
        command.stdout(self.output_target(recipe.stdout.as_deref())?);
        command.stderr(self.output_target(recipe.stderr.as_deref())?);
        if let Some(dir) = &recipe.workingdir {
            command.current_dir(dir);
        }
        command.envs(&recipe.env);
        if let Some(mask) = recipe.umask {
            // applied in the child between fork and exec
            unsafe {
                command.pre_exec(move || {
                    libc::umask(mask as libc::mode_t);
                    Ok(())
                });
            }
        }

        let mut child = command
            .spawn()
            .map_err(|e| SupervisorError::Spawn(format!("'{}': {}", recipe.cmd, e)))?;
        let pid = child
            .id()
            .ok_or_else(|| SupervisorError::Spawn(format!("'{}': no pid", recipe.cmd)))?;

        if let Some(stdout) = child.stdout.take() {
            stream::forward_lines(recipe.program.clone(), pid, "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            stream::forward_lines(recipe.program.clone(), pid, "stderr", stderr);
        }

        let exit = Box::pin(async move {
            let status = child.wait().await.map_err(SupervisorError::Io)?;
            Ok(exit_code_of(status))
        });
        Ok(SpawnedChild { pid, exit })
    }

    fn signal(&self, pid: u32, signal: i32) -> Result<()> {
        debug!(pid, signal, "delivering signal");
        let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
        if rc == 0 {
            Ok(())
        } else {
            Err(SupervisorError::Signal {
                pid,
                source: std::io::Error::last_os_error(),
            })
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }
}

/// Map an exit status to the code the restart decision sees. Death by
/// signal uses the conventional 128+signo encoding.
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    match status.code() {
        Some(code) => code,
        None => 128 + status.signal().unwrap_or(0),
    }
}
