//! Device-local persistent storage.
//!
//! A string key/value contract; the offline queue keeps its whole list
//! serialized under a single key.

mod memory;
mod sqlite;

use async_trait::async_trait;

pub use memory::MemoryLocalStore;
pub use sqlite::SqliteLocalStore;

/// Local storage errors.
#[derive(Debug, thiserror::Error)]
pub enum LocalStoreError {
    #[error("Local storage error: {0}")]
    Storage(String),
}

impl From<ecoscan_core::db::DatabaseError> for LocalStoreError {
    fn from(e: ecoscan_core::db::DatabaseError) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Persistent string storage owned by the device.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<String>, LocalStoreError>;

    async fn write(&self, key: &str, value: &str) -> Result<(), LocalStoreError>;

    async fn delete(&self, key: &str) -> Result<(), LocalStoreError>;
}
