//! Unix-socket control server
//! One connection per command: read a single line, dispatch, write the
//! reply, close. The listener winds down when the supervisor's shutdown
//! token fires.

use crate::control::dispatcher::{ControlSurface, Outcome};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest accepted request line; anything bigger is junk.
const MAX_LINE_LEN: usize = 1024;

pub struct SocketServer {
    path: PathBuf,
    surface: ControlSurface,
    shutdown: CancellationToken,
}

impl SocketServer {
    pub fn new(
        path: impl Into<PathBuf>,
        surface: ControlSurface,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            path: path.into(),
            surface,
            shutdown,
        }
    }

    pub async fn serve(self) -> io::Result<()> {
        let listener = bind(&self.path)?;
        info!(socket = %self.path.display(), "control socket listening");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let surface = self.surface.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, surface).await {
                                    debug!(error = %e, "control connection failed");
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
            }
        }

        info!(socket = %self.path.display(), "control socket closed");
        let _ = std::fs::remove_file(&self.path);
        Ok(())
    }
}

fn bind(path: &Path) -> io::Result<UnixListener> {
    if path.exists() {
        info!(socket = %path.display(), "removing stale socket file");
        std::fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let listener = UnixListener::bind(path)?;

    // owner and group only
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o660);
        std::fs::set_permissions(path, permissions)?;
    }
    Ok(listener)
}

async fn handle_connection(stream: UnixStream, surface: ControlSurface) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut line = String::new();
    let mut reader = BufReader::new(read_half).take(MAX_LINE_LEN as u64);
    reader.read_line(&mut line).await?;
    let line = line.trim();
    debug!(command = %line, "control command received");

    let outcome = surface.dispatch(line).await;
    write_half.write_all(outcome.reply().as_bytes()).await?;
    write_half.write_all(b"\n").await?;
    write_half.flush().await?;

    // the reply is on the wire before the supervisor starts tearing
    // children down
    if let Outcome::Shutdown(_) = outcome {
        let _ = surface.handle().shutdown().await;
    }
    Ok(())
}
