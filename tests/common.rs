//! Shared test utilities for the end-to-end tests.
//!
//! Tests drive a real supervisor (control loop, queues, watcher tasks)
//! in-process. Most scenarios use [`ScriptedLauncher`], whose children
//! exit exactly when the script says so; the spawn-path tests use the
//! real shell launcher instead.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use sv_engine::{
    Event, Observer, ObserverSet, ProcessLauncher, SpawnRecipe, SpawnedChild, Supervisor,
    SupervisorError, SupervisorHandle,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// What the next spawned child of a program should do.
#[derive(Debug, Clone, Copy)]
pub enum ExitPlan {
    /// Exit on its own with the given code after the delay.
    ExitWith { delay: Duration, code: i32 },
    /// Run until a signal arrives.
    RunUntilSignaled,
    /// Fail on the parent side before any child exists.
    FailSpawn,
}

impl ExitPlan {
    pub fn exit_with(delay_ms: u64, code: i32) -> Self {
        ExitPlan::ExitWith {
            delay: Duration::from_millis(delay_ms),
            code,
        }
    }
}

/// Launcher whose children behave exactly as scripted, per program.
/// Programs without a script run until signaled.
pub struct ScriptedLauncher {
    next_pid: AtomicU32,
    spawned: AtomicUsize,
    plans: Mutex<HashMap<String, VecDeque<ExitPlan>>>,
    alive: Arc<Mutex<HashSet<u32>>>,
    signal_txs: Arc<Mutex<HashMap<u32, oneshot::Sender<i32>>>>,
    signals: Mutex<Vec<(u32, i32)>>,
    pids: Mutex<HashMap<String, Vec<u32>>>,
}

impl ScriptedLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_pid: AtomicU32::new(1000),
            spawned: AtomicUsize::new(0),
            plans: Mutex::new(HashMap::new()),
            alive: Arc::new(Mutex::new(HashSet::new())),
            signal_txs: Arc::new(Mutex::new(HashMap::new())),
            signals: Mutex::new(Vec::new()),
            pids: Mutex::new(HashMap::new()),
        })
    }

    pub fn plan(&self, program: &str, plans: Vec<ExitPlan>) {
        self.plans
            .lock()
            .unwrap()
            .entry(program.to_string())
            .or_default()
            .extend(plans);
    }

    pub fn spawn_count(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub fn signals(&self) -> Vec<(u32, i32)> {
        self.signals.lock().unwrap().clone()
    }

    pub fn pids_of(&self, program: &str) -> Vec<u32> {
        self.pids
            .lock()
            .unwrap()
            .get(program)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProcessLauncher for ScriptedLauncher {
    async fn spawn(&self, recipe: SpawnRecipe) -> Result<SpawnedChild, SupervisorError> {
        let plan = self
            .plans
            .lock()
            .unwrap()
            .get_mut(&recipe.program)
            .and_then(|q| q.pop_front())
            .unwrap_or(ExitPlan::RunUntilSignaled);

        if let ExitPlan::FailSpawn = plan {
            return Err(SupervisorError::Spawn("scripted spawn failure".to_string()));
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.spawned.fetch_add(1, Ordering::SeqCst);
        self.alive.lock().unwrap().insert(pid);
        self.pids
            .lock()
            .unwrap()
            .entry(recipe.program.clone())
            .or_default()
            .push(pid);

        let alive = Arc::clone(&self.alive);
        let exit: sv_engine::ports::ExitFuture = match plan {
            ExitPlan::ExitWith { delay, code } => Box::pin(async move {
                tokio::time::sleep(delay).await;
                alive.lock().unwrap().remove(&pid);
                Ok(code)
            }),
            ExitPlan::RunUntilSignaled => {
                let (tx, rx) = oneshot::channel();
                self.signal_txs.lock().unwrap().insert(pid, tx);
                Box::pin(async move {
                    match rx.await {
                        Ok(code) => {
                            alive.lock().unwrap().remove(&pid);
                            Ok(code)
                        }
                        // launcher dropped mid-test; never resolves
                        Err(_) => std::future::pending().await,
                    }
                })
            }
            ExitPlan::FailSpawn => unreachable!(),
        };

        Ok(SpawnedChild { pid, exit })
    }

    fn signal(&self, pid: u32, signal: i32) -> Result<(), SupervisorError> {
        self.signals.lock().unwrap().push((pid, signal));
        if signal != 0 {
            if let Some(tx) = self.signal_txs.lock().unwrap().remove(&pid) {
                let _ = tx.send(128 + signal);
            }
        }
        Ok(())
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }
}

/// Observer that records every event, for asserting on lifecycle flows.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind_name: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind.as_str() == kind_name)
            .count()
    }
}

#[async_trait]
impl Observer for RecordingObserver {
    async fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Spawn a running supervisor around the given launcher.
pub fn run_supervisor(
    launcher: Arc<dyn ProcessLauncher>,
    observers: ObserverSet,
) -> (SupervisorHandle, CancellationToken) {
    let (supervisor, handle) = Supervisor::new(launcher, observers);
    let shutdown = supervisor.shutdown_token();
    tokio::spawn(supervisor.run());
    (handle, shutdown)
}

/// Poll a condition until it holds or the timeout elapses.
pub async fn wait_for<F>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Poll `status` until a program shows the expected running count.
pub async fn wait_for_running(
    handle: &SupervisorHandle,
    program: &str,
    running: usize,
    timeout: Duration,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(statuses) = handle.status().await {
            if statuses
                .iter()
                .any(|s| s.name == program && s.running == running)
            {
                return true;
            }
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Events observers see, by wire name.
pub const STARTED: &str = "process_started";
pub const STOPPED: &str = "process_stopped";
pub const EXITED: &str = "process_exited";
pub const FATAL: &str = "process_fatal";
