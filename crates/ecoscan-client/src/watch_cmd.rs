//! `ecoscan watch`: keep the queue watcher running and drive connectivity
//! from stdin.
//!
//! Each input line is one of `online`, `offline`, `status`, or `quit`.
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::info;

use crate::connectivity::ConnectivityObserver;
use crate::context::AppContext;
use crate::queue::QueueWatcher;

/// A parsed stdin command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchInput {
    Online,
    Offline,
    Status,
    Quit,
}

impl WatchInput {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "online" | "up" => Some(Self::Online),
            "offline" | "down" => Some(Self::Offline),
            "status" => Some(Self::Status),
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Run the watcher until stdin closes, `quit`, or Ctrl-C.
pub async fn run(ctx: &AppContext, user_id: &str) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = QueueWatcher::new(ctx.queue.clone(), user_id).spawn(ctx.network.subscribe(), shutdown_rx);

    info!(user_id = %user_id, "Queue watcher started");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let mut out = io::stdout();
        match WatchInput::parse(&line) {
            Some(WatchInput::Online) => {
                ctx.network.set_connected(true);
            }
            Some(WatchInput::Offline) => {
                ctx.network.set_connected(false);
            }
            Some(WatchInput::Status) => {
                let state = if ctx.network.is_connected() { "online" } else { "offline" };
                writeln!(out, "{state}, {} scans queued", ctx.queue.count().await?)?;
            }
            Some(WatchInput::Quit) => break,
            None if line.trim().is_empty() => {}
            None => writeln!(out, "Unknown command: {} (online, offline, status, quit)", line.trim())?,
        }
    }

    let _ = shutdown_tx.send(true);
    handle.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(WatchInput::parse(" Online\n"), Some(WatchInput::Online));
        assert_eq!(WatchInput::parse("down"), Some(WatchInput::Offline));
        assert_eq!(WatchInput::parse("quit"), Some(WatchInput::Quit));
        assert_eq!(WatchInput::parse("dance"), None);
    }
}
