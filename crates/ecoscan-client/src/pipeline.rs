//! Scan submission: geofence, then record online or queue offline.

use std::sync::Arc;

use ecoscan_core::{CampusBoundary, ScanInput, geo};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::connectivity::ConnectivityObserver;
use crate::queue::{OfflineQueue, QueueError};
use crate::recorder::{RecordOutcome, ScanError};

/// Why a scan went to the offline queue instead of the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReason {
    Offline,
    /// Online, but the remote store failed; the scan is retried on next drain.
    RemoteFailure,
}

/// Result of submitting one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Recorded(RecordOutcome),
    Queued { queue_id: String, reason: QueueReason },
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The scan location lies outside the campus boundary.
    #[error("Location is {distance_m:.0} m from campus, outside the {radius_m:.0} m boundary")]
    OffCampus { distance_m: f64, radius_m: f64 },

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Entry point for freshly captured scans.
pub struct ScanPipeline {
    campus: CampusBoundary,
    queue: Arc<OfflineQueue>,
    connectivity: Arc<dyn ConnectivityObserver>,
}

impl ScanPipeline {
    pub fn new(
        campus: CampusBoundary,
        queue: Arc<OfflineQueue>,
        connectivity: Arc<dyn ConnectivityObserver>,
    ) -> Self {
        Self {
            campus,
            queue,
            connectivity,
        }
    }

    pub const fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    /// Submit a scan for `user_id`.
    ///
    /// Off-campus scans are rejected. Offline scans are queued. Online scans
    /// are recorded directly; if the remote store fails before the scan
    /// record exists they are queued. Duplicates, invalid input, and awards
    /// that failed after the record was written are returned to the caller.
    #[instrument(skip(self, scan), fields(user_id = %user_id, barcode = %scan.barcode))]
    pub async fn submit(
        &self,
        user_id: &str,
        scan: ScanInput,
    ) -> Result<SubmitOutcome, SubmitError> {
        if !self.campus.contains(scan.location) {
            let distance_m = geo::distance_m(self.campus.centre(), scan.location);
            warn!(distance_m, "Scan rejected outside campus boundary");
            return Err(SubmitError::OffCampus {
                distance_m,
                radius_m: self.campus.radius_m,
            });
        }

        if !self.connectivity.is_connected() {
            let queue_id = self.queue.enqueue(scan).await?;
            return Ok(SubmitOutcome::Queued {
                queue_id,
                reason: QueueReason::Offline,
            });
        }

        match self.queue.recorder().record(user_id, &scan).await {
            Ok(outcome) => {
                info!(points = outcome.points, total = outcome.new_total_points, "Scan recorded");
                Ok(SubmitOutcome::Recorded(outcome))
            }
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Remote store failed, queueing scan");
                let queue_id = self.queue.enqueue(scan).await?;
                Ok(SubmitOutcome::Queued {
                    queue_id,
                    reason: QueueReason::RemoteFailure,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityMonitor;
    use crate::local::MemoryLocalStore;
    use crate::recorder::ScanRecorder;
    use crate::remote::MemoryRemoteStore;
    use ecoscan_core::{GeoPoint, Material};

    struct Setup {
        pipeline: ScanPipeline,
        remote: MemoryRemoteStore,
        network: ConnectivityMonitor,
    }

    fn setup() -> Setup {
        let remote = MemoryRemoteStore::new();
        let network = ConnectivityMonitor::new(true);
        let queue = Arc::new(OfflineQueue::new(
            Arc::new(MemoryLocalStore::new()),
            ScanRecorder::new(Arc::new(remote.clone())),
            Arc::new(network.clone()),
        ));
        Setup {
            pipeline: ScanPipeline::new(CampusBoundary::default(), queue, Arc::new(network.clone())),
            remote,
            network,
        }
    }

    fn on_campus(barcode: &str) -> ScanInput {
        ScanInput::for_material(barcode, Material::Aluminum, CampusBoundary::default().centre())
    }

    #[tokio::test]
    async fn records_online_scan() {
        let s = setup();
        let outcome = s.pipeline.submit("u1", on_campus("A")).await.unwrap();
        match outcome {
            SubmitOutcome::Recorded(r) => assert_eq!(r.new_total_points, 7),
            other => panic!("expected recorded, got {other:?}"),
        }
        assert_eq!(s.pipeline.queue().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn queues_offline_scan() {
        let s = setup();
        s.network.set_connected(false);
        let outcome = s.pipeline.submit("u1", on_campus("A")).await.unwrap();
        assert!(matches!(
            outcome,
            SubmitOutcome::Queued { reason: QueueReason::Offline, .. }
        ));
        assert_eq!(s.pipeline.queue().count().await.unwrap(), 1);
        assert!(s.remote.document("scans/A").await.is_none());
    }

    #[tokio::test]
    async fn queues_when_remote_fails() {
        let s = setup();
        s.remote.set_available(false).await;
        let outcome = s.pipeline.submit("u1", on_campus("A")).await.unwrap();
        assert!(matches!(
            outcome,
            SubmitOutcome::Queued { reason: QueueReason::RemoteFailure, .. }
        ));
        assert_eq!(s.pipeline.queue().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_off_campus() {
        let s = setup();
        let far = ScanInput::for_material("A", Material::Paper, GeoPoint::new(-33.9249, 18.4241));
        let err = s.pipeline.submit("u1", far).await.unwrap_err();
        assert!(matches!(err, SubmitError::OffCampus { .. }));
        assert_eq!(s.pipeline.queue().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_is_not_queued() {
        let s = setup();
        s.pipeline.submit("u1", on_campus("A")).await.unwrap();
        let err = s.pipeline.submit("u2", on_campus("A")).await.unwrap_err();
        assert!(matches!(err, SubmitError::Scan(ScanError::Duplicate { .. })));
        assert_eq!(s.pipeline.queue().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_award_after_record_is_not_queued() {
        let s = setup();
        s.remote.fail_writes_to("users/u1").await;
        let err = s.pipeline.submit("u1", on_campus("A")).await.unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Scan(ScanError::AwardIncomplete { .. })
        ));
        assert_eq!(s.pipeline.queue().count().await.unwrap(), 0);
    }
}
