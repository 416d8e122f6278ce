//! `ecoscan profile`: account totals and achievements.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};

use crate::connectivity::ConnectivityObserver;
use crate::context::AppContext;
use crate::recorder::account::ensure_account;
use crate::recorder::achievements::CATALOG;

/// Show the account for `user_id`, creating it on first use.
pub async fn run(ctx: &AppContext, user_id: &str, display_name: Option<&str>) -> anyhow::Result<()> {
    let mut out = io::stdout();
    let queued = ctx.queue.count().await?;

    if !ctx.network.is_connected() {
        writeln!(out, "Offline: profile unavailable ({queued} scans waiting to sync)")?;
        return Ok(());
    }

    let account = ensure_account(&ctx.remote, user_id, display_name).await?;
    let name = account.display_name.as_deref().unwrap_or(user_id);

    writeln!(out, "{name}")?;
    writeln!(out, "  Points:  {} ({} to spend)", account.points, account.balance())?;
    writeln!(out, "  Level:   {}", account.level)?;
    writeln!(out, "  Scans:   {}", account.total_scans)?;
    if let Some(last) = &account.last_scan_date {
        writeln!(out, "  Last:    {last}")?;
    }
    if queued > 0 {
        writeln!(out, "  Pending: {queued} queued scans")?;
    }

    writeln!(out, "Achievements:")?;
    for a in &CATALOG {
        let mark = if account.achievements.iter().any(|id| id == a.id) {
            "x"
        } else {
            " "
        };
        writeln!(out, "  [{mark}] {:<16} {}", a.name, a.description)?;
    }
    Ok(())
}
