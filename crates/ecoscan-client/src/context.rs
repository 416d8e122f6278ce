//! Wiring of stores, queue, and pipeline for the `ecoscan` binary.

use std::sync::Arc;

use anyhow::Context as _;
use ecoscan_core::Config;
use tracing::info;

use crate::connectivity::ConnectivityMonitor;
use crate::local::SqliteLocalStore;
use crate::pipeline::ScanPipeline;
use crate::queue::OfflineQueue;
use crate::recorder::ScanRecorder;
use crate::remote::SqliteRemoteStore;
use crate::storage::Database;

/// Everything a subcommand needs.
pub struct AppContext {
    pub config: Config,
    pub network: ConnectivityMonitor,
    pub remote: SqliteRemoteStore,
    pub queue: Arc<OfflineQueue>,
    pub pipeline: ScanPipeline,
    remote_db: Database,
    device_db: Database,
}

impl AppContext {
    /// Open both databases and build the component graph.
    pub async fn open(config: Config, online: bool) -> anyhow::Result<Self> {
        let remote_path = config
            .storage
            .remote_db()
            .context("Cannot determine remote database path")?;
        let device_path = config
            .storage
            .device_db()
            .context("Cannot determine device database path")?;

        info!(path = %remote_path.display(), "Opening remote database");
        let remote_db = Database::open(&remote_path).await?;
        info!(path = %device_path.display(), "Opening device database");
        let device_db = Database::open(&device_path).await?;

        Ok(Self::from_databases(config, online, remote_db, device_db))
    }

    /// Build the component graph over already-open databases.
    pub fn from_databases(
        config: Config,
        online: bool,
        remote_db: Database,
        device_db: Database,
    ) -> Self {
        let network = ConnectivityMonitor::new(online);
        let remote = SqliteRemoteStore::new(remote_db.clone());
        let recorder = ScanRecorder::new(Arc::new(remote.clone()))
            .with_cas_retries(config.recorder.cas_retries);
        let queue = Arc::new(OfflineQueue::with_config(
            Arc::new(SqliteLocalStore::new(device_db.clone())),
            recorder,
            Arc::new(network.clone()),
            &config.queue,
        ));
        let pipeline = ScanPipeline::new(config.campus, Arc::clone(&queue), Arc::new(network.clone()));

        Self {
            config,
            network,
            remote,
            queue,
            pipeline,
            remote_db,
            device_db,
        }
    }

    pub async fn close(&self) {
        self.device_db.close().await;
        self.remote_db.close().await;
    }
}
