//! `SQLite`-backed local store.

use async_trait::async_trait;

use crate::storage::Database;

use super::{LocalStore, LocalStoreError};

/// [`LocalStore`] persisted in the device database's `kv_store` table.
#[derive(Clone)]
pub struct SqliteLocalStore {
    db: Database,
}

impl SqliteLocalStore {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn read(&self, key: &str) -> Result<Option<String>, LocalStoreError> {
        Ok(self.db.kv_get(key).await?)
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        self.db.kv_put(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), LocalStoreError> {
        self.db.kv_delete(key).await?;
        Ok(())
    }
}
