//! Supervision engine
//! Owns the program table and performs every state transition. Child
//! exits are delivered by per-child watcher tasks into a bounded queue;
//! the watchers never mutate anything themselves. Commands arrive over
//! the handle's queue. Both are drained by the single control loop, so
//! the table is never observed half-updated.

use crate::domain::{
    respawn_wanted, Program, ProgramConfig, Result, SupervisorError,
};
use crate::ports::{Event, EventKind, ObserverSet, ProcessLauncher, SpawnRecipe};
use crate::supervisor::command::{Command, ProgramStatus, ReloadSummary};
use crate::supervisor::handle::SupervisorHandle;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Queue capacities. Exit events are tiny; commands are rare.
const EXIT_QUEUE_CAPACITY: usize = 1024;
const COMMAND_QUEUE_CAPACITY: usize = 64;

/// How often the shutdown path re-probes surviving children.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One reaped child, as enqueued by its watcher task.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExitEvent {
    pub pid: u32,
    pub exit_code: i32,
}

pub struct Supervisor {
    programs: HashMap<String, Program>,
    /// Pids stopped by explicit operator action. A pid is inserted
    /// before its stop signal is sent, so the exit notification that
    /// follows can never be misread as a crash.
    manual_stops: HashSet<u32>,
    launcher: Arc<dyn ProcessLauncher>,
    observers: ObserverSet,
    exit_tx: mpsc::Sender<ExitEvent>,
    exit_rx: mpsc::Receiver<ExitEvent>,
    cmd_rx: mpsc::Receiver<Command>,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(
        launcher: Arc<dyn ProcessLauncher>,
        observers: ObserverSet,
    ) -> (Self, SupervisorHandle) {
        let (exit_tx, exit_rx) = mpsc::channel(EXIT_QUEUE_CAPACITY);
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let supervisor = Self {
            programs: HashMap::new(),
            manual_stops: HashSet::new(),
            launcher,
            observers,
            exit_tx,
            exit_rx,
            cmd_rx,
            shutdown: CancellationToken::new(),
        };
        let handle = SupervisorHandle::new(cmd_tx);
        (supervisor, handle)
    }

    /// Token cancelled once shutdown has completed; control surfaces
    /// watch it to wind down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The control loop. Runs until shutdown.
    pub async fn run(mut self) {
        info!("supervisor started");
        self.observers.emit(Event::new(
            EventKind::DaemonStarted,
            "svd",
            Some(std::process::id()),
        ));

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(cmd) = self.cmd_rx.recv() => self.handle_command(cmd).await,
                Some(ev) = self.exit_rx.recv() => self.handle_exit(ev).await,
                else => break,
            }
        }

        info!("supervisor stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Status { reply } => {
                let _ = reply.send(self.op_status());
            }
            Command::Start { name, reply } => {
                let _ = reply.send(self.op_start(&name).await);
            }
            Command::Stop { name, reply } => {
                let _ = reply.send(self.op_stop(&name));
            }
            Command::Restart { name, reply } => {
                let result = match self.op_stop(&name) {
                    Ok(()) => self.op_start(&name).await,
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            Command::ApplyConfig { programs, reply } => {
                let _ = reply.send(self.op_apply_config(programs).await);
            }
            Command::Shutdown { reply } => {
                self.op_shutdown().await;
                let _ = reply.send(());
            }
        }
    }

    // ===== Queries =====

    fn op_status(&self) -> Vec<ProgramStatus> {
        let mut statuses: Vec<ProgramStatus> = self
            .programs
            .values()
            .map(|p| ProgramStatus {
                name: p.config().name.clone(),
                running: p.running_count(),
                desired: p.desired(),
            })
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    fn find_instance(&self, pid: u32) -> Option<(String, usize)> {
        for (name, program) in &self.programs {
            for (idx, inst) in program.instances().iter().enumerate() {
                if inst.pid() == Some(pid) {
                    return Some((name.clone(), idx));
                }
            }
        }
        None
    }

    // ===== Start / stop =====

    /// Spawn every stopped instance of a program. User-initiated, so
    /// the retry budget is not consumed here.
    async fn op_start(&mut self, name: &str) -> Result<()> {
        let count = match self.programs.get_mut(name) {
            Some(program) => {
                program.set_disabled(false);
                program.instances().len()
            }
            None => return Err(SupervisorError::ProgramNotFound(name.to_string())),
        };

        for idx in 0..count {
            let stopped = self
                .programs
                .get(name)
                .map(|p| !p.instances()[idx].is_running())
                .unwrap_or(false);
            if stopped {
                self.spawn_instance(name, idx).await?;
            }
        }
        Ok(())
    }

    /// Stop every running instance of a program. Optimistic: instances
    /// are marked stopped immediately; the later exit notification is
    /// absorbed via the manual-stop set. Also disables the program so a
    /// reload does not resurrect it behind the operator's back.
    fn op_stop(&mut self, name: &str) -> Result<()> {
        let program = self
            .programs
            .get_mut(name)
            .ok_or_else(|| SupervisorError::ProgramNotFound(name.to_string()))?;
        program.set_disabled(true);
        let stopsignal = program.config().stopsignal;
        let grace = program.config().stoptime;

        let mut stopped = Vec::new();
        for inst in program.instances_mut() {
            if !inst.is_running() {
                continue;
            }
            let Some(pid) = inst.pid() else { continue };

            // Mark before signaling: an exit notification that lands
            // between the signal and this bookkeeping must still be
            // recognized as a manual stop.
            self.manual_stops.insert(pid);
            if let Err(e) = self.launcher.signal(pid, stopsignal) {
                debug!(pid, error = %e, "stop signal not delivered (process may have exited)");
            }
            inst.mark_stopped_by_user();
            stopped.push(pid);
        }

        for pid in stopped {
            info!(program = %name, pid, "stopped");
            self.observers
                .emit(Event::new(EventKind::Stopped, name, Some(pid)));
            self.escalate_after_grace(pid, grace);
        }
        Ok(())
    }

    /// SIGKILL a child that outlives its stop-grace period.
    fn escalate_after_grace(&self, pid: u32, grace: Duration) {
        let launcher = Arc::clone(&self.launcher);
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if launcher.is_alive(pid) {
                warn!(pid, "grace period expired, escalating to SIGKILL");
                let _ = launcher.signal(pid, libc::SIGKILL);
            }
        });
    }

    /// Launch one instance and register its exit watcher.
    async fn spawn_instance(&mut self, name: &str, idx: usize) -> Result<()> {
        let recipe = {
            let program = self
                .programs
                .get(name)
                .ok_or_else(|| SupervisorError::ProgramNotFound(name.to_string()))?;
            SpawnRecipe::from_config(program.config())
        };

        let child = self.launcher.spawn(recipe).await?;
        let pid = child.pid;

        // A recycled pid must not inherit a stale manual-stop marker.
        self.manual_stops.remove(&pid);
        if let Some(program) = self.programs.get_mut(name) {
            program.instances_mut()[idx].mark_started(pid);
        }
        info!(program = %name, pid, "started");
        self.observers
            .emit(Event::new(EventKind::Started, name, Some(pid)));

        let exit_tx = self.exit_tx.clone();
        let exit = child.exit;
        tokio::spawn(async move {
            let exit_code = exit.await.unwrap_or(1);
            let _ = exit_tx.send(ExitEvent { pid, exit_code }).await;
        });
        Ok(())
    }

    // ===== Exit handling & restart decision =====

    async fn handle_exit(&mut self, ev: ExitEvent) {
        if self.manual_stops.remove(&ev.pid) {
            debug!(
                pid = ev.pid,
                exit_code = ev.exit_code,
                "exit of manually stopped pid absorbed"
            );
            return;
        }

        let Some((name, idx)) = self.find_instance(ev.pid) else {
            debug!(
                pid = ev.pid,
                exit_code = ev.exit_code,
                "exit for unknown pid discarded"
            );
            return;
        };

        let (policy, exit_allowed, within_start_window) = {
            let Some(program) = self.programs.get_mut(&name) else {
                return;
            };
            let starttime = program.config().starttime;
            let exit_allowed = program.config().is_exit_code_allowed(ev.exit_code);
            let policy = program.config().autorestart;

            let inst = &mut program.instances_mut()[idx];
            inst.mark_exited(ev.exit_code);
            let alive = inst.alive_time();
            debug!(
                program = %name,
                pid = ev.pid,
                exit_code = ev.exit_code,
                alive_secs = alive.as_secs_f64(),
                "instance exited"
            );
            (policy, exit_allowed, alive < starttime)
        };

        self.observers.emit(Event::new(
            EventKind::Exited {
                exit_code: ev.exit_code,
            },
            &name,
            Some(ev.pid),
        ));

        if respawn_wanted(policy, exit_allowed, within_start_window) {
            self.respawn_with_budget(&name, idx).await;
        }
    }

    /// Respawn an instance, charging the shared retry budget. Once the
    /// budget is spent the instance goes fatal and stays down until an
    /// explicit start or a config replacement.
    async fn respawn_with_budget(&mut self, name: &str, idx: usize) {
        loop {
            let Some(program) = self.programs.get_mut(name) else {
                return;
            };
            let budget = program.config().startretries;
            let inst = &mut program.instances_mut()[idx];

            if inst.retry_count() >= budget {
                inst.mark_fatal();
                warn!(
                    program = %name,
                    retries = inst.retry_count(),
                    "retry budget exhausted, giving up"
                );
                self.observers.emit(Event::new(EventKind::Fatal, name, None));
                return;
            }
            inst.record_retry();
            let attempt = inst.retry_count();
            info!(program = %name, attempt, max = budget, "respawning");

            match self.spawn_instance(name, idx).await {
                Ok(()) => return,
                Err(e) => {
                    warn!(program = %name, error = %e, "respawn attempt failed");
                    // charge the next attempt against the same budget
                }
            }
        }
    }

    // ===== Reconciliation =====

    /// Diff the live table against a freshly parsed descriptor list and
    /// converge: stop and drop removed programs, bounce changed ones
    /// with a fresh instance list, add new ones. Unchanged programs are
    /// left strictly alone.
    async fn op_apply_config(&mut self, programs: Vec<ProgramConfig>) -> ReloadSummary {
        let mut summary = ReloadSummary::default();

        let mut incoming: HashMap<String, ProgramConfig> = HashMap::new();
        for config in programs {
            if let Err(e) = config.validate() {
                warn!(program = %config.name, error = %e, "rejecting program descriptor");
                summary.rejected.push(config.name.clone());
                continue;
            }
            incoming.insert(config.name.clone(), config);
        }

        let mut existing: Vec<String> = self.programs.keys().cloned().collect();
        existing.sort();
        for name in existing {
            if !incoming.contains_key(&name) {
                info!(program = %name, "removing program");
                let _ = self.op_stop(&name);
                self.programs.remove(&name);
                summary.removed.push(name);
            }
        }

        let mut names: Vec<String> = incoming.keys().cloned().collect();
        names.sort();
        for name in names {
            let Some(config) = incoming.remove(&name) else {
                continue;
            };
            let autostart = config.autostart;

            match self.programs.get(&name) {
                Some(program) if program.config().reload_equal(&config) => {
                    // Untouched, even if its instances are down: a
                    // reload never heals a program whose config did not
                    // change.
                    summary.unchanged += 1;
                }
                Some(program) => {
                    // an operator stop survives the replacement: the
                    // fresh instances exist but are not auto-started
                    let was_disabled = program.is_disabled();
                    info!(program = %name, "config changed, replacing");
                    let _ = self.op_stop(&name);
                    let mut replacement = Program::new(config);
                    replacement.set_disabled(was_disabled);
                    self.programs.insert(name.clone(), replacement);
                    summary.replaced.push(name.clone());
                    if autostart && !was_disabled {
                        if let Err(e) = self.op_start(&name).await {
                            warn!(program = %name, error = %e, "autostart failed after reload");
                        }
                    }
                }
                None => {
                    info!(program = %name, "adding program");
                    self.programs.insert(name.clone(), Program::new(config));
                    summary.added.push(name.clone());
                    if autostart {
                        if let Err(e) = self.op_start(&name).await {
                            warn!(program = %name, error = %e, "autostart failed");
                        }
                    }
                }
            }
        }

        info!(
            added = summary.added.len(),
            removed = summary.removed.len(),
            replaced = summary.replaced.len(),
            unchanged = summary.unchanged,
            "reload reconciled"
        );
        summary
    }

    // ===== Shutdown =====

    /// Stop everything, wait out a bounded grace, SIGKILL stragglers,
    /// then cancel the shutdown token. Safe to call repeatedly.
    async fn op_shutdown(&mut self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        info!("shutdown requested, stopping all programs");

        let mut names: Vec<String> = self.programs.keys().cloned().collect();
        names.sort();

        let mut survivors: Vec<u32> = Vec::new();
        let mut max_grace = Duration::ZERO;
        for name in &names {
            if let Some(program) = self.programs.get(name) {
                for inst in program.instances() {
                    if let Some(pid) = inst.pid() {
                        survivors.push(pid);
                    }
                }
                max_grace = max_grace.max(program.config().stoptime);
            }
            let _ = self.op_stop(name);
        }

        let deadline = Instant::now() + max_grace;
        while !survivors.is_empty() && Instant::now() < deadline {
            survivors.retain(|pid| self.launcher.is_alive(*pid));
            if survivors.is_empty() {
                break;
            }
            tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
        }
        for pid in survivors {
            if self.launcher.is_alive(pid) {
                warn!(pid, "child ignored stop signal, sending SIGKILL");
                let _ = self.launcher.signal(pid, libc::SIGKILL);
            }
        }

        self.observers.emit(Event::new(
            EventKind::DaemonStopping,
            "svd",
            Some(std::process::id()),
        ));
        self.shutdown.cancel();
    }
}
