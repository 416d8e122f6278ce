//! In-memory remote store.
//!
//! Backs tests and embedding. Outages and per-path write failures can be
//! simulated to exercise retry paths.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use ecoscan_core::db::unix_timestamp_millis;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{RemoteError, RemoteStore, merge_fields, resolve_server_values};

#[derive(Default)]
struct Faults {
    offline: bool,
    failing_paths: HashSet<String>,
    failing_prefixes: HashSet<String>,
}

/// Thread-safe in-memory document store.
#[derive(Clone)]
pub struct MemoryRemoteStore {
    documents: Arc<RwLock<HashMap<String, Value>>>,
    faults: Arc<RwLock<Faults>>,
    compare_and_set: bool,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            faults: Arc::new(RwLock::new(Faults::default())),
            compare_and_set: true,
        }
    }

    /// A store that only offers plain get/set/update.
    pub fn without_compare_and_set() -> Self {
        Self {
            compare_and_set: false,
            ..Self::new()
        }
    }

    /// Simulate the store going away (`false`) or coming back (`true`).
    pub async fn set_available(&self, available: bool) {
        self.faults.write().await.offline = !available;
    }

    /// Make every write to `path` fail until [`Self::clear_faults`].
    pub async fn fail_writes_to(&self, path: impl Into<String>) {
        self.faults.write().await.failing_paths.insert(path.into());
    }

    /// Make every write under `prefix` fail until [`Self::clear_faults`].
    pub async fn fail_writes_under(&self, prefix: impl Into<String>) {
        self.faults.write().await.failing_prefixes.insert(prefix.into());
    }

    pub async fn clear_faults(&self) {
        *self.faults.write().await = Faults::default();
    }

    /// Read a document directly, ignoring simulated faults.
    pub async fn document(&self, path: &str) -> Option<Value> {
        self.documents.read().await.get(path).cloned()
    }

    /// Number of stored documents whose path starts with `prefix`.
    pub async fn count_prefix(&self, prefix: &str) -> usize {
        self.documents
            .read()
            .await
            .keys()
            .filter(|p| p.starts_with(prefix))
            .count()
    }

    async fn check_read(&self) -> Result<(), RemoteError> {
        if self.faults.read().await.offline {
            return Err(RemoteError::Unavailable("store offline".into()));
        }
        Ok(())
    }

    async fn check_write(&self, path: &str) -> Result<(), RemoteError> {
        let faults = self.faults.read().await;
        if faults.offline {
            return Err(RemoteError::Unavailable("store offline".into()));
        }
        if faults.failing_paths.contains(path)
            || faults.failing_prefixes.iter().any(|p| path.starts_with(p.as_str()))
        {
            return Err(RemoteError::Unavailable(format!("write to {path} failed")));
        }
        Ok(())
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError> {
        self.check_read().await?;
        Ok(self.documents.read().await.get(path).cloned())
    }

    async fn set(&self, path: &str, mut value: Value) -> Result<(), RemoteError> {
        self.check_write(path).await?;
        resolve_server_values(&mut value, unix_timestamp_millis());
        self.documents.write().await.insert(path.to_string(), value);
        Ok(())
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), RemoteError> {
        self.check_write(path).await?;
        let mut docs = self.documents.write().await;
        let mut merged = merge_fields(docs.remove(path), fields);
        resolve_server_values(&mut merged, unix_timestamp_millis());
        docs.insert(path.to_string(), merged);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, RemoteError> {
        self.check_read().await?;
        let mut found: Vec<(String, Value)> = self
            .documents
            .read()
            .await
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, value)| (path.clone(), value.clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    fn supports_compare_and_set(&self) -> bool {
        self.compare_and_set
    }

    async fn compare_and_set(
        &self,
        path: &str,
        expected: Option<&Value>,
        mut value: Value,
    ) -> Result<bool, RemoteError> {
        if !self.compare_and_set {
            return Err(RemoteError::Unsupported("compare_and_set"));
        }
        self.check_write(path).await?;

        let mut docs = self.documents.write().await;
        if docs.get(path) != expected {
            return Ok(false);
        }
        resolve_server_values(&mut value, unix_timestamp_millis());
        docs.insert(path.to_string(), value);
        Ok(true)
    }
}
