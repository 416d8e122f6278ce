//! `ecoscan leaderboard` and `ecoscan stats`.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};

use chrono::{Local, TimeZone};
use ecoscan_core::db::unix_timestamp_millis;

use crate::connectivity::ConnectivityObserver;
use crate::context::AppContext;
use crate::stats::{leaderboard, user_scans, user_stats};

/// Show the top `limit` users by points.
pub async fn run_leaderboard(ctx: &AppContext, user_id: &str, limit: usize) -> anyhow::Result<()> {
    if !ctx.network.is_connected() {
        anyhow::bail!("Leaderboard needs a connection");
    }
    let mut out = io::stdout();
    let board = leaderboard(&ctx.remote, limit).await?;
    if board.is_empty() {
        writeln!(out, "No users yet")?;
        return Ok(());
    }

    writeln!(out, "{:>4}  {:<24} {:>8} {:>6} {:>6}", "RANK", "USER", "POINTS", "LEVEL", "SCANS")?;
    for (rank, entry) in board.iter().enumerate() {
        let marker = if entry.user_id == user_id { "*" } else { " " };
        writeln!(
            out,
            "{:>4}{marker} {:<24} {:>8} {:>6} {:>6}",
            rank + 1,
            entry.display_name.as_deref().unwrap_or(&entry.user_id),
            entry.points,
            entry.level,
            entry.total_scans
        )?;
    }
    Ok(())
}

/// Show statistics and the `recent` latest scans for `user_id`.
pub async fn run_stats(ctx: &AppContext, user_id: &str, recent: usize, json: bool) -> anyhow::Result<()> {
    if !ctx.network.is_connected() {
        anyhow::bail!("Statistics need a connection");
    }
    let mut out = io::stdout();
    let stats = user_stats(&ctx.remote, user_id, unix_timestamp_millis()).await?;
    let scans = user_scans(&ctx.remote, user_id, recent).await?;

    if json {
        let doc = serde_json::json!({"stats": stats, "recentScans": scans});
        writeln!(out, "{}", serde_json::to_string_pretty(&doc)?)?;
        return Ok(());
    }

    writeln!(out, "Points:     {} ({} to spend)", stats.total_points, stats.balance)?;
    writeln!(out, "Level:      {}", stats.level)?;
    writeln!(out, "Scans:      {} ({} this week, {} this month)", stats.total_scans, stats.scans_this_week, stats.scans_this_month)?;
    writeln!(out, "Average:    {} points per scan", stats.average_points_per_scan)?;
    let m = stats.material_breakdown;
    writeln!(
        out,
        "Materials:  plastic {}, glass {}, aluminum {}, paper {}",
        m.plastic, m.glass, m.aluminum, m.paper
    )?;

    if !scans.is_empty() {
        writeln!(out, "Recent scans:")?;
        for s in &scans {
            let when = s
                .record
                .timestamp
                .and_then(|ms| Local.timestamp_millis_opt(ms).single())
                .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
            writeln!(
                out,
                "  {when:<16} {:<20} {:<16} {:>4}",
                s.barcode, s.record.material_type, s.record.points
            )?;
        }
    }
    Ok(())
}
