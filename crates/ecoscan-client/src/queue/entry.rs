//! Queue entry and report types.

use chrono::{DateTime, Duration, Local, Utc};
use ecoscan_core::ScanInput;
use serde::{Deserialize, Serialize};

use crate::recorder::RecordOutcome;

/// Random characters appended to the enqueue timestamp in entry ids.
const ID_SUFFIX_LEN: usize = 9;

/// A scan waiting in the offline queue.
///
/// The id is local to the device and unrelated to the barcode, so the same
/// barcode can be queued more than once until it is replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub id: String,
    #[serde(flatten)]
    pub scan: ScanInput,
    pub queued_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(scan: ScanInput) -> Self {
        let queued_at = Utc::now();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!(
                "{}{}",
                queued_at.timestamp_millis(),
                &suffix[..ID_SUFFIX_LEN]
            ),
            scan,
            queued_at,
        }
    }
}

/// A queued scan that was replayed successfully.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedScan {
    #[serde(flatten)]
    pub entry: QueueEntry,
    pub processed_at: DateTime<Utc>,
    pub outcome: RecordOutcome,
}

/// Outcome of one drain.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Entries recorded and removed from the queue.
    pub processed: usize,
    /// Entries that failed and remain queued.
    pub failed: usize,
    /// Duplicate entries dropped under [`super::DuplicatePolicy::Discard`].
    pub discarded: usize,
    /// Entries whose barcode was already recorded, whatever the policy.
    pub duplicates: usize,
    /// Queue length when the drain started.
    pub total: usize,
    pub successful_scans: Vec<ProcessedScan>,
}

impl DrainReport {
    pub const fn is_noop(&self) -> bool {
        self.total == 0
    }

    /// Points awarded across all processed entries.
    pub fn points_awarded(&self) -> u64 {
        self.successful_scans.iter().map(|s| s.outcome.points).sum()
    }
}

/// Read-side summary of the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total: usize,
    /// Entries queued on the current local calendar day.
    pub today: usize,
    /// Entries queued within the last seven days.
    pub this_week: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

impl QueueStats {
    pub fn from_entries(entries: &[QueueEntry], now: DateTime<Local>) -> Self {
        let today = now.date_naive();
        let week_ago = now.with_timezone(&Utc) - Duration::days(7);

        Self {
            total: entries.len(),
            today: entries
                .iter()
                .filter(|e| e.queued_at.with_timezone(&Local).date_naive() == today)
                .count(),
            this_week: entries.iter().filter(|e| e.queued_at >= week_ago).count(),
            oldest: entries.iter().map(|e| e.queued_at).min(),
            newest: entries.iter().map(|e| e.queued_at).max(),
        }
    }
}
