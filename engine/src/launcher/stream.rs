//! Child output streaming
//! Forwards a piped child stream into the log, one line at a time. The
//! task lives on the pipe alone: it ends at EOF and survives the owning
//! instance (or its whole program) disappearing.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::info;

pub(crate) fn forward_lines<R>(program: String, pid: u32, channel: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        // repeated identical lines are forwarded as-is; suppressing
        // them would drop legitimate output
        while let Ok(Some(line)) = lines.next_line().await {
            info!(target: "child", program = %program, pid, channel, "{}", line);
        }
    });
}
