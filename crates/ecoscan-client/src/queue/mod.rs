//! Offline scan queue.
//!
//! Scans captured while the device is offline are kept in device storage
//! and replayed through the [`ScanRecorder`](crate::recorder::ScanRecorder)
//! once connectivity returns. Successfully replayed entries are removed;
//! failed ones stay queued for the next drain.

mod entry;
mod manager;
mod watcher;

pub use ecoscan_core::config::DuplicatePolicy;
pub use entry::{DrainReport, ProcessedScan, QueueEntry, QueueStats};
pub use manager::OfflineQueue;
pub use watcher::QueueWatcher;

use crate::local::LocalStoreError;

/// Queue operation errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// No network at drain time; the queue was left untouched.
    #[error("No internet connection ({queued} scans queued)")]
    Offline { queued: usize },

    #[error(transparent)]
    Storage(#[from] LocalStoreError),

    /// The persisted list could not be decoded. It is left as-is.
    #[error("Queue data is corrupt: {0}")]
    Corrupt(String),

    #[error("Invalid scan: {0}")]
    InvalidInput(String),
}

impl From<ecoscan_core::Error> for QueueError {
    fn from(e: ecoscan_core::Error) -> Self {
        Self::InvalidInput(e.to_string())
    }
}
