//! Queue subcommands: count, list, stats, clear, remove.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};

use chrono::Local;

use crate::queue::OfflineQueue;

/// Queue subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum QueueAction {
    /// Number of scans waiting to sync.
    Count,
    /// List queued scans, oldest first.
    List {
        /// Print entries as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Summary of queue age.
    Stats,
    /// Drop every queued scan.
    Clear,
    /// Drop one queued scan by id.
    Remove {
        /// Queue entry id, as shown by `queue list`.
        id: String,
    },
}

/// Execute a queue subcommand.
pub async fn run(action: QueueAction, queue: &OfflineQueue) -> anyhow::Result<()> {
    let mut out = io::stdout();
    match action {
        QueueAction::Count => {
            writeln!(out, "{}", queue.count().await?)?;
        }
        QueueAction::List { json } => {
            let entries = queue.list().await?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
            } else if entries.is_empty() {
                writeln!(out, "Queue is empty")?;
            } else {
                writeln!(out, "{:<24} {:<20} {:<16} {:>6}  QUEUED", "ID", "BARCODE", "MATERIAL", "POINTS")?;
                for e in &entries {
                    writeln!(
                        out,
                        "{:<24} {:<20} {:<16} {:>6}  {}",
                        e.id,
                        e.scan.barcode,
                        e.scan.material_type,
                        e.scan.points,
                        e.queued_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
                    )?;
                }
            }
        }
        QueueAction::Stats => {
            let stats = queue.stats().await?;
            writeln!(out, "Total:     {}", stats.total)?;
            writeln!(out, "Today:     {}", stats.today)?;
            writeln!(out, "This week: {}", stats.this_week)?;
            if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
                writeln!(out, "Oldest:    {}", oldest.with_timezone(&Local).format("%Y-%m-%d %H:%M"))?;
                writeln!(out, "Newest:    {}", newest.with_timezone(&Local).format("%Y-%m-%d %H:%M"))?;
            }
        }
        QueueAction::Clear => {
            queue.clear().await?;
            writeln!(out, "Queue cleared")?;
        }
        QueueAction::Remove { id } => {
            if queue.remove(&id).await? {
                writeln!(out, "Removed {id}")?;
            } else {
                anyhow::bail!("No queued scan with id {id}");
            }
        }
    }
    Ok(())
}
