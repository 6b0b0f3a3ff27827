//! Interactive control shell
//! Foreground-mode front end: a line prompt over stdin speaking the
//! same verbs as the socket, plus `exit`.

use crate::control::dispatcher::{ControlSurface, Outcome};
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const PROMPT: &str = "svd> ";

pub struct InteractiveShell {
    surface: ControlSurface,
    shutdown: CancellationToken,
}

impl InteractiveShell {
    pub fn new(surface: ControlSurface, shutdown: CancellationToken) -> Self {
        Self { surface, shutdown }
    }

    /// Read-dispatch-print until `exit`, `shutdown`, EOF, or an
    /// out-of-band shutdown (socket `shutdown`, SIGTERM).
    pub async fn run(self) {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        loop {
            print!("{}", PROMPT);
            let _ = std::io::stdout().flush();

            let line = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    println!();
                    break;
                }
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                // EOF (ctrl-D) behaves like exit
                Ok(None) => {
                    println!();
                    let _ = self.surface.handle().shutdown().await;
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "stdin read failed");
                    break;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "exit" {
                let _ = self.surface.handle().shutdown().await;
                break;
            }

            match self.surface.dispatch(line).await {
                Outcome::Reply(reply) => println!("{}", reply),
                Outcome::Shutdown(reply) => {
                    println!("{}", reply);
                    let _ = self.surface.handle().shutdown().await;
                    break;
                }
            }
        }
    }
}
