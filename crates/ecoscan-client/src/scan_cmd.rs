//! `ecoscan scan` and `ecoscan drain`.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};

use ecoscan_core::{GeoPoint, Material, ScanInput};

use crate::context::AppContext;
use crate::pipeline::{QueueReason, SubmitError, SubmitOutcome};
use crate::queue::QueueError;
use crate::recorder::{RecordOutcome, ScanError};

/// Arguments for a single scan.
#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// Barcode read from the item.
    pub barcode: String,

    /// Material category: plastic, glass, aluminum, or paper.
    #[arg(long, short)]
    pub material: Material,

    /// Scan latitude. Defaults to the campus centre.
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Scan longitude. Defaults to the campus centre.
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,
}

/// Submit one scan through the pipeline.
pub async fn scan(ctx: &AppContext, user_id: &str, args: ScanArgs) -> anyhow::Result<()> {
    let location = match (args.lat, args.lon) {
        (Some(lat), Some(lon)) => GeoPoint::new(lat, lon),
        _ => ctx.config.campus.centre(),
    };
    let input = ScanInput::for_material(args.barcode, args.material, location);

    let mut out = io::stdout();
    match ctx.pipeline.submit(user_id, input).await {
        Ok(SubmitOutcome::Recorded(outcome)) => print_recorded(&mut out, &outcome)?,
        Ok(SubmitOutcome::Queued { queue_id, reason }) => {
            let why = match reason {
                QueueReason::Offline => "offline",
                QueueReason::RemoteFailure => "remote store unavailable",
            };
            writeln!(out, "Scan saved offline ({why}), queue id {queue_id}")?;
            writeln!(out, "It will sync when you're back online.")?;
        }
        Err(SubmitError::Scan(ScanError::Duplicate { barcode })) => {
            anyhow::bail!("Item {barcode} has already been recycled");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Drain the offline queue now.
pub async fn drain(ctx: &AppContext, user_id: &str) -> anyhow::Result<()> {
    let mut out = io::stdout();
    let report = match ctx.queue.drain(user_id).await {
        Ok(report) => report,
        Err(QueueError::Offline { queued }) => {
            writeln!(out, "Offline: {queued} scans stay queued")?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if report.is_noop() {
        writeln!(out, "Queue is empty")?;
        return Ok(());
    }

    writeln!(
        out,
        "Synced {}/{} scans, {} points awarded",
        report.processed,
        report.total,
        report.points_awarded()
    )?;
    if report.failed > 0 {
        writeln!(out, "{} scans failed and stay queued", report.failed)?;
    }
    if report.discarded > 0 {
        writeln!(out, "{} already-recorded scans dropped", report.discarded)?;
    }
    for scan in &report.successful_scans {
        writeln!(
            out,
            "  {:<20} +{:<3} {}",
            scan.entry.scan.barcode, scan.outcome.points, scan.entry.scan.material_type
        )?;
    }
    Ok(())
}

fn print_recorded(out: &mut impl Write, outcome: &RecordOutcome) -> io::Result<()> {
    writeln!(
        out,
        "+{} points for {} (total {}, level {}, {} scans)",
        outcome.points,
        outcome.barcode,
        outcome.new_total_points,
        outcome.new_level,
        outcome.new_total_scans
    )?;
    for id in &outcome.new_achievements {
        let title = crate::recorder::achievements::find(id).map_or(id.as_str(), |a| a.name);
        writeln!(out, "Achievement unlocked: {title}")?;
    }
    Ok(())
}
