//! Daemonization
//! Classic double fork + setsid, stdio redirected to the daemon log,
//! pidfile for operators, flock-held lockfile against double starts.

use crate::domain::{Result, SupervisorError};
use std::fs::OpenOptions;
use std::io::Write as _;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

/// Holds the lockfile descriptor open for the daemon's lifetime; the
/// lock dies with the process.
pub struct LockGuard {
    _file: std::fs::File,
    fd: RawFd,
}

impl LockGuard {
    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

/// Take the single-instance lock, failing fast if another daemon holds
/// it.
pub fn acquire_lock(path: &Path) -> Result<LockGuard> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)?;
    let fd = file.as_raw_fd();
    let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        return Err(SupervisorError::InvalidConfiguration(format!(
            "another daemon already holds the lock at '{}'",
            path.display()
        )));
    }
    Ok(LockGuard { _file: file, fd })
}

/// Detach into the background and write the pidfile.
///
/// Both intermediate parents `_exit` immediately; only the grandchild
/// returns. Must be called before any threads (or the tokio runtime)
/// exist.
pub fn daemonize(pidfile: &Path, logfile: &Path) -> Result<()> {
    fork_and_exit_parent()?;

    if unsafe { libc::setsid() } < 0 {
        return Err(SupervisorError::Io(std::io::Error::last_os_error()));
    }

    fork_and_exit_parent()?;
    unsafe { libc::umask(0) };

    redirect_stdio(logfile)?;

    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(pidfile)?;
    write!(f, "{}", std::process::id())?;
    Ok(())
}

pub fn remove_pidfile(pidfile: &Path) {
    let _ = std::fs::remove_file(pidfile);
}

fn fork_and_exit_parent() -> Result<()> {
    match unsafe { libc::fork() } {
        -1 => Err(SupervisorError::Io(std::io::Error::last_os_error())),
        0 => Ok(()),
        _ => unsafe { libc::_exit(0) },
    }
}

/// Point stdin at /dev/null and stdout/stderr at the daemon log.
fn redirect_stdio(logfile: &Path) -> Result<()> {
    if let Some(parent) = logfile.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let log = OpenOptions::new().create(true).append(true).open(logfile)?;
    let devnull = OpenOptions::new().read(true).open("/dev/null")?;

    unsafe {
        if libc::dup2(devnull.as_raw_fd(), libc::STDIN_FILENO) < 0
            || libc::dup2(log.as_raw_fd(), libc::STDOUT_FILENO) < 0
            || libc::dup2(log.as_raw_fd(), libc::STDERR_FILENO) < 0
        {
            return Err(SupervisorError::Io(std::io::Error::last_os_error()));
        }
    }
    Ok(())
}
