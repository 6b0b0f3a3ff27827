//! svd: the supervisor daemon.
//!
//! Loads the program descriptors, runs the supervision engine and the
//! Unix-socket control surface. Foreground mode keeps the terminal and
//! offers the interactive shell; otherwise the process detaches.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sv_engine::control::{ControlSurface, InteractiveShell, SocketServer};
use sv_engine::launcher::ShellLauncher;
use sv_engine::observers::{AlertObserver, LogObserver};
use sv_engine::{bootstrap, config, ObserverSet, Supervisor};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "svd", about = "process supervisor daemon", version)]
struct Args {
    /// Program descriptor file (YAML).
    config: PathBuf,

    /// Stay in the foreground with the interactive shell instead of
    /// detaching.
    #[arg(long)]
    foreground: bool,

    /// Control socket path.
    #[arg(long, default_value = sv_engine::DEFAULT_SOCKET_PATH)]
    socket: PathBuf,

    /// Alert file (JSON lines). Enables the alerting observer.
    #[arg(long)]
    alerts: Option<PathBuf>,

    /// Webhook URL alerts are POSTed to.
    #[arg(long)]
    webhook: Option<String>,

    /// Pidfile written after daemonizing.
    #[arg(long, default_value = "/tmp/svd.pid")]
    pidfile: PathBuf,

    /// Single-instance lockfile.
    #[arg(long, default_value = "/tmp/svd.lock")]
    lockfile: PathBuf,

    /// Daemon log file (stdout/stderr once detached).
    #[arg(long, default_value = "/tmp/svd.log")]
    logfile: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _lock = bootstrap::acquire_lock(&args.lockfile)?;
    if !args.foreground {
        // must happen before the runtime spins up any threads
        bootstrap::daemonize(&args.pidfile, &args.logfile)?;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(&args));

    if !args.foreground {
        bootstrap::remove_pidfile(&args.pidfile);
    }
    result
}

async fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let configs = config::load_file(&args.config)?;
    info!(
        config = %args.config.display(),
        programs = configs.len(),
        "configuration loaded"
    );

    let mut observers = ObserverSet::new();
    observers.push(Arc::new(LogObserver));
    if args.alerts.is_some() || args.webhook.is_some() {
        let alert_file = args
            .alerts
            .clone()
            .unwrap_or_else(|| PathBuf::from("/tmp/svd_alerts.log"));
        observers.push(Arc::new(AlertObserver::new(alert_file, args.webhook.clone())));
    }

    let launcher = Arc::new(ShellLauncher::default());
    let (supervisor, handle) = Supervisor::new(launcher, observers);
    let shutdown = supervisor.shutdown_token();
    let supervisor_task = tokio::spawn(supervisor.run());

    // initial load is just a reconciliation against an empty table
    handle.apply_config(configs).await?;

    let surface = ControlSurface::new(handle.clone(), Some(args.config.clone()));
    let server = SocketServer::new(&args.socket, surface.clone(), shutdown.clone());
    let server_task = tokio::spawn(server.serve());

    // SIGHUP asks for a reload; the handler itself only re-parses the
    // file and queues the descriptor list
    {
        let surface = surface.clone();
        let shutdown = shutdown.clone();
        let mut hup = signal(SignalKind::hangup())?;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = hup.recv() => {
                        if received.is_none() {
                            break;
                        }
                        info!("SIGHUP received, reloading configuration");
                        let reply = surface.dispatch("reload").await;
                        info!(result = %reply.reply(), "reload finished");
                    }
                }
            }
        });
    }

    // SIGTERM/SIGINT stop everything
    {
        let handle = handle.clone();
        let shutdown = shutdown.clone();
        let mut term = signal(SignalKind::terminate())?;
        let mut int = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = term.recv() => info!("SIGTERM received"),
                _ = int.recv() => info!("SIGINT received"),
            }
            if let Err(e) = handle.shutdown().await {
                warn!(error = %e, "shutdown request failed");
            }
        });
    }

    if args.foreground {
        InteractiveShell::new(surface, shutdown.clone()).run().await;
    } else {
        shutdown.cancelled().await;
    }

    if let Err(e) = supervisor_task.await {
        error!(error = %e, "supervisor task failed");
    }
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "socket server failed"),
        Err(e) => error!(error = %e, "socket server task failed"),
    }
    info!("svd exiting");
    Ok(())
}
