//! Scan recording against the remote store.
//!
//! A scan is accepted at most once per barcode; the presence of
//! `scans/{barcode}` is the only duplicate signal. Accepted scans add the
//! item's points to the user's account and recompute level and scan count.

pub mod account;
pub mod achievements;
mod scan_recorder;

use serde::Serialize;

use crate::remote::RemoteError;

pub use account::{AccountTotals, ScanRecord, UserAccount};
pub use scan_recorder::ScanRecorder;

/// Scan recording errors.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The barcode already has a scan record.
    #[error("This item has already been recycled (barcode {barcode})")]
    Duplicate { barcode: String },

    #[error("Invalid scan: {0}")]
    InvalidInput(String),

    /// The remote store failed before the scan record was written.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The scan record was written but the account update failed.
    #[error("Scan {barcode} recorded but points were not awarded: {source}")]
    AwardIncomplete {
        barcode: String,
        #[source]
        source: RemoteError,
    },
}

impl ScanError {
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// Whether replaying the same scan later could succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl From<ecoscan_core::Error> for ScanError {
    fn from(e: ecoscan_core::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

/// Result of a successfully recorded scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcome {
    pub barcode: String,
    /// Points awarded for this scan.
    pub points: u64,
    pub new_total_points: u64,
    pub new_level: u64,
    pub new_total_scans: u64,
    /// Achievement ids earned by this scan.
    pub new_achievements: Vec<String>,
}

/// Remote path of the scan record for `barcode`.
pub fn scan_path(barcode: &str) -> String {
    format!("scans/{barcode}")
}

/// Remote path of the account document for `user_id`.
pub fn user_path(user_id: &str) -> String {
    format!("users/{user_id}")
}
