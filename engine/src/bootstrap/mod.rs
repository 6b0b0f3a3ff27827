//! Process-lifecycle bootstrapping for the daemon binary: detaching
//! from the terminal, the pidfile and the single-instance lock. All of
//! this must run before the async runtime is built.

mod daemon;

pub use daemon::{acquire_lock, daemonize, remove_pidfile, LockGuard};
