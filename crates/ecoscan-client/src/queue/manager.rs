//! Offline queue manager.
//!
//! The whole queue is one JSON list stored under a single key and always
//! read and written as a whole. Every read-modify-write of that list holds
//! `list_lock`; drains are additionally serialized by `drain_lock`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Local, Utc};
use ecoscan_core::ScanInput;
use ecoscan_core::config::{DuplicatePolicy, QueueConfig};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::connectivity::ConnectivityObserver;
use crate::local::LocalStore;
use crate::recorder::ScanRecorder;

use super::{DrainReport, ProcessedScan, QueueEntry, QueueError, QueueStats};

/// Device-local queue of scans awaiting upload.
pub struct OfflineQueue {
    store: Arc<dyn LocalStore>,
    recorder: ScanRecorder,
    connectivity: Arc<dyn ConnectivityObserver>,
    storage_key: String,
    duplicate_policy: DuplicatePolicy,
    list_lock: Mutex<()>,
    drain_lock: Mutex<()>,
}

impl OfflineQueue {
    pub fn new(
        store: Arc<dyn LocalStore>,
        recorder: ScanRecorder,
        connectivity: Arc<dyn ConnectivityObserver>,
    ) -> Self {
        Self::with_config(store, recorder, connectivity, &QueueConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn LocalStore>,
        recorder: ScanRecorder,
        connectivity: Arc<dyn ConnectivityObserver>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            store,
            recorder,
            connectivity,
            storage_key: config.storage_key.clone(),
            duplicate_policy: config.duplicate_policy,
            list_lock: Mutex::new(()),
            drain_lock: Mutex::new(()),
        }
    }

    pub const fn recorder(&self) -> &ScanRecorder {
        &self.recorder
    }

    /// Append a scan to the queue. Returns the new entry's id.
    #[instrument(skip(self, scan), fields(barcode = %scan.barcode))]
    pub async fn enqueue(&self, scan: ScanInput) -> Result<String, QueueError> {
        scan.validate()?;
        let entry = QueueEntry::new(scan);
        let id = entry.id.clone();

        let _guard = self.list_lock.lock().await;
        let mut entries = self.load().await?;
        entries.push(entry);
        self.persist(&entries).await?;

        info!(queue_id = %id, queued = entries.len(), "Scan added to offline queue");
        Ok(id)
    }

    /// All queued entries in insertion order.
    pub async fn list(&self) -> Result<Vec<QueueEntry>, QueueError> {
        let _guard = self.list_lock.lock().await;
        self.load().await
    }

    pub async fn count(&self) -> Result<usize, QueueError> {
        Ok(self.list().await?.len())
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        let entries = self.list().await?;
        Ok(QueueStats::from_entries(&entries, Local::now()))
    }

    /// Drop every queued entry.
    pub async fn clear(&self) -> Result<(), QueueError> {
        let _guard = self.list_lock.lock().await;
        self.store.delete(&self.storage_key).await?;
        info!("Offline queue cleared");
        Ok(())
    }

    /// Drop one entry by id. Returns whether it was queued.
    pub async fn remove(&self, queue_id: &str) -> Result<bool, QueueError> {
        let _guard = self.list_lock.lock().await;
        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|e| e.id != queue_id);
        if entries.len() == before {
            return Ok(false);
        }
        self.persist(&entries).await?;
        info!(queue_id = %queue_id, "Removed entry from offline queue");
        Ok(true)
    }

    /// Replay every queued scan for `user_id`, in insertion order.
    ///
    /// An empty queue returns an empty report without touching storage. When
    /// offline nothing is attempted and [`QueueError::Offline`] is returned.
    /// Otherwise successful entries are removed, failures stay queued, and
    /// duplicates follow the configured [`DuplicatePolicy`]. Entries enqueued
    /// while the drain runs are kept.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn drain(&self, user_id: &str) -> Result<DrainReport, QueueError> {
        let _drain = self.drain_lock.lock().await;

        let snapshot = {
            let _guard = self.list_lock.lock().await;
            self.load().await?
        };
        if snapshot.is_empty() {
            debug!("No items in queue");
            return Ok(DrainReport::default());
        }

        if !self.connectivity.is_connected() {
            warn!(queued = snapshot.len(), "Cannot drain queue while offline");
            return Err(QueueError::Offline {
                queued: snapshot.len(),
            });
        }

        info!(count = snapshot.len(), "Processing queued scans");

        let mut report = DrainReport {
            total: snapshot.len(),
            ..DrainReport::default()
        };
        let mut finished: HashSet<String> = HashSet::new();

        for entry in snapshot {
            match self.recorder.record(user_id, &entry.scan).await {
                Ok(outcome) => {
                    debug!(queue_id = %entry.id, "Processed queued scan");
                    report.processed += 1;
                    finished.insert(entry.id.clone());
                    report.successful_scans.push(ProcessedScan {
                        entry,
                        processed_at: Utc::now(),
                        outcome,
                    });
                }
                Err(e) if e.is_duplicate() => {
                    report.duplicates += 1;
                    match self.duplicate_policy {
                        DuplicatePolicy::Discard => {
                            info!(queue_id = %entry.id, barcode = %entry.scan.barcode, "Discarding already-recorded queued scan");
                            report.discarded += 1;
                            finished.insert(entry.id);
                        }
                        DuplicatePolicy::Retain => {
                            warn!(queue_id = %entry.id, barcode = %entry.scan.barcode, "Queued scan already recorded, keeping it queued");
                            report.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(queue_id = %entry.id, error = %e, "Failed to process queued scan");
                    report.failed += 1;
                }
            }
        }

        {
            let _guard = self.list_lock.lock().await;
            let mut remaining = self.load().await?;
            remaining.retain(|e| !finished.contains(&e.id));
            self.persist(&remaining).await?;
        }

        if report.failed > 0 {
            warn!(
                total = report.total,
                processed = report.processed,
                failed = report.failed,
                "Queue drain incomplete, failed scans retained for next drain"
            );
        } else {
            info!(
                total = report.total,
                processed = report.processed,
                discarded = report.discarded,
                "Queue drained successfully"
            );
        }

        Ok(report)
    }

    /// Drain only when online and something is queued.
    pub async fn check_and_drain(&self, user_id: &str) -> Result<DrainReport, QueueError> {
        if !self.connectivity.is_connected() {
            return Ok(DrainReport::default());
        }
        if self.count().await? == 0 {
            return Ok(DrainReport::default());
        }
        self.drain(user_id).await
    }

    async fn load(&self) -> Result<Vec<QueueEntry>, QueueError> {
        match self.store.read(&self.storage_key).await? {
            Some(json) => {
                serde_json::from_str(&json).map_err(|e| QueueError::Corrupt(e.to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn persist(&self, entries: &[QueueEntry]) -> Result<(), QueueError> {
        let json =
            serde_json::to_string(entries).map_err(|e| QueueError::Corrupt(e.to_string()))?;
        self.store.write(&self.storage_key, &json).await?;
        Ok(())
    }
}
