//! svctl: remote control client for the supervisor daemon.
//!
//! Speaks the line protocol over the daemon's Unix socket: one
//! connection per command, one request line, one (possibly multi-line)
//! reply.

mod formatters;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

#[derive(Parser, Debug)]
#[command(name = "svctl", about = "supervisor control client", version)]
struct Cli {
    /// Daemon control socket.
    #[arg(long, env = "SVD_SOCKET", default_value = "/tmp/svd.sock")]
    socket: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replica counts for every program.
    Status,
    /// Start all stopped instances of a program.
    Start { name: String },
    /// Stop all running instances of a program.
    Stop { name: String },
    /// Stop then start a program.
    Restart { name: String },
    /// Re-read the configuration file and reconcile.
    Reload,
    /// Stop every program and terminate the daemon.
    Shutdown,
}

impl Command {
    fn wire_line(&self) -> String {
        match self {
            Command::Status => "status".to_string(),
            Command::Start { name } => format!("start {}", name),
            Command::Stop { name } => format!("stop {}", name),
            Command::Restart { name } => format!("restart {}", name),
            Command::Reload => "reload".to_string(),
            Command::Shutdown => "shutdown".to_string(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let response = match send(&cli.socket, &cli.command.wire_line()).await {
        Ok(response) => response,
        Err(e) => {
            eprintln!(
                "{} cannot reach daemon at {}: {}",
                "error:".red().bold(),
                cli.socket.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    let mut failed = false;
    for line in response.lines() {
        if line.starts_with("ERR") {
            failed = true;
        }
        println!("{}", formatters::format_line(line));
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn send(socket: &PathBuf, line: &str) -> std::io::Result<String> {
    let mut stream = UnixStream::connect(socket).await?;
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\n").await?;

    let mut response = String::new();
    stream.read_to_string(&mut response).await?;
    Ok(response.trim_end().to_string())
}
