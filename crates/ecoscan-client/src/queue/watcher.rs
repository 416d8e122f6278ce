//! Drains the offline queue when connectivity returns.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{OfflineQueue, QueueError};

/// Background task that drains the queue for one signed-in user.
///
/// Runs one drain on start, then one whenever a connectivity update reports
/// the device online.
pub struct QueueWatcher {
    queue: Arc<OfflineQueue>,
    user_id: String,
}

impl QueueWatcher {
    pub fn new(queue: Arc<OfflineQueue>, user_id: impl Into<String>) -> Self {
        Self {
            queue,
            user_id: user_id.into(),
        }
    }

    /// Run until `shutdown` flips to true or the connectivity source goes away.
    pub async fn run(
        self,
        mut connectivity: watch::Receiver<bool>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        if *shutdown.borrow() {
            return;
        }
        self.sync_once().await;

        loop {
            tokio::select! {
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        info!("Connectivity source closed, stopping queue watcher");
                        return;
                    }
                    // Changes between wakeups coalesce, so an offline blip may
                    // surface only as online again.
                    if *connectivity.borrow_and_update() {
                        self.sync_once().await;
                    }
                }
                _ = shutdown.changed() => {
                    info!("Queue watcher shutting down");
                    return;
                }
            }
        }
    }

    /// Spawn [`QueueWatcher::run`] on the current runtime.
    pub fn spawn(
        self,
        connectivity: watch::Receiver<bool>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(connectivity, shutdown))
    }

    async fn sync_once(&self) {
        match self.queue.check_and_drain(&self.user_id).await {
            Ok(report) if report.is_noop() => {}
            Ok(report) => info!(
                processed = report.processed,
                failed = report.failed,
                points = report.points_awarded(),
                "Synced offline scans"
            ),
            Err(QueueError::Offline { queued }) => {
                info!(queued, "Connection dropped before queue sync");
            }
            Err(e) => warn!(error = %e, "Offline queue sync failed"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::connectivity::{ConnectivityMonitor, ConnectivityObserver};
    use crate::local::MemoryLocalStore;
    use crate::recorder::ScanRecorder;
    use crate::remote::MemoryRemoteStore;
    use ecoscan_core::{GeoPoint, Material, ScanInput};
    use std::time::Duration;

    fn setup(online: bool) -> (Arc<OfflineQueue>, MemoryRemoteStore, ConnectivityMonitor) {
        let remote = MemoryRemoteStore::new();
        let network = ConnectivityMonitor::new(online);
        let queue = Arc::new(OfflineQueue::new(
            Arc::new(MemoryLocalStore::new()),
            ScanRecorder::new(Arc::new(remote.clone())),
            Arc::new(network.clone()),
        ));
        (queue, remote, network)
    }

    fn scan(barcode: &str) -> ScanInput {
        ScanInput::for_material(barcode, Material::Glass, GeoPoint::default())
    }

    async fn wait_until_empty(queue: &OfflineQueue) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while queue.count().await.unwrap() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("queue was not drained");
    }

    #[tokio::test]
    async fn drains_on_start_when_online() {
        let (queue, remote, network) = setup(true);
        queue.enqueue(scan("A")).await.unwrap();

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = QueueWatcher::new(Arc::clone(&queue), "u1").spawn(network.subscribe(), stop_rx);

        wait_until_empty(&queue).await;
        assert_eq!(remote.document("users/u1").await.unwrap()["points"], 10);

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn drains_when_connection_returns() {
        let (queue, remote, network) = setup(false);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = QueueWatcher::new(Arc::clone(&queue), "u1").spawn(network.subscribe(), stop_rx);

        queue.enqueue(scan("A")).await.unwrap();
        queue.enqueue(scan("B")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(queue.count().await.unwrap(), 2);

        network.set_connected(true);
        wait_until_empty(&queue).await;
        assert_eq!(remote.document("users/u1").await.unwrap()["points"], 20);

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_connectivity_source_closes() {
        let (queue, _remote, _network) = setup(true);
        let (tx, rx) = watch::channel(true);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let handle = QueueWatcher::new(queue, "u1").spawn(rx, stop_rx);

        drop(tx);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("watcher did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn drains_after_brief_disconnect() {
        let (queue, remote, network) = setup(true);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = QueueWatcher::new(Arc::clone(&queue), "u1").spawn(network.subscribe(), stop_rx);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Offline and back before the watcher gets to run: it may only see
        // the final online state.
        network.set_connected(false);
        queue.enqueue(scan("A")).await.unwrap();
        network.set_connected(true);

        wait_until_empty(&queue).await;
        assert_eq!(remote.document("users/u1").await.unwrap()["points"], 10);

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
