//! `SQLite`-backed remote store.
//!
//! A local stand-in for the hosted database, used by the CLI. Documents are
//! stored as canonical JSON text, which lets conditional writes compare the
//! stored text directly.

use async_trait::async_trait;
use ecoscan_core::db::unix_timestamp_millis;
use serde_json::{Map, Value};
use tracing::debug;

use crate::storage::Database;

use super::{RemoteError, RemoteStore, merge_fields, resolve_server_values};

/// Merge attempts before an update gives up under contention.
const MAX_MERGE_ATTEMPTS: u32 = 16;

/// Remote store persisted in the `documents` table.
#[derive(Clone)]
pub struct SqliteRemoteStore {
    db: Database,
}

impl SqliteRemoteStore {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    fn encode(mut value: Value) -> Result<String, RemoteError> {
        resolve_server_values(&mut value, unix_timestamp_millis());
        Ok(serde_json::to_string(&value)?)
    }
}

#[async_trait]
impl RemoteStore for SqliteRemoteStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError> {
        match self.db.get_document(path).await? {
            Some(row) => Ok(Some(serde_json::from_str(&row.value)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), RemoteError> {
        let encoded = Self::encode(value)?;
        self.db.put_document(path, &encoded).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, RemoteError> {
        self.db
            .list_documents(prefix)
            .await?
            .into_iter()
            .map(|row| Ok((row.path, serde_json::from_str(&row.value)?)))
            .collect()
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), RemoteError> {
        for attempt in 0..MAX_MERGE_ATTEMPTS {
            let current = self.db.get_document(path).await?;
            let current_value = current
                .as_ref()
                .map(|row| serde_json::from_str::<Value>(&row.value))
                .transpose()?;
            let encoded = Self::encode(merge_fields(current_value, fields.clone()))?;

            let written = match &current {
                Some(row) => {
                    self.db
                        .replace_document_if_equal(path, &row.value, &encoded)
                        .await?
                }
                None => self.db.insert_document_if_absent(path, &encoded).await?,
            };
            if written {
                return Ok(());
            }
            debug!(path = %path, attempt, "Concurrent write during merge, retrying");
        }

        Err(RemoteError::Contention {
            path: path.to_string(),
            attempts: MAX_MERGE_ATTEMPTS,
        })
    }

    fn supports_compare_and_set(&self) -> bool {
        true
    }

    async fn compare_and_set(
        &self,
        path: &str,
        expected: Option<&Value>,
        value: Value,
    ) -> Result<bool, RemoteError> {
        let encoded = Self::encode(value)?;
        let written = match expected {
            Some(expected) => {
                let expected = serde_json::to_string(expected)?;
                self.db
                    .replace_document_if_equal(path, &expected, &encoded)
                    .await?
            }
            None => self.db.insert_document_if_absent(path, &encoded).await?,
        };
        Ok(written)
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::remote::server_timestamp;
    use serde_json::json;

    async fn store() -> SqliteRemoteStore {
        SqliteRemoteStore::new(Database::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn set_then_get() {
        let store = store().await;
        store
            .set("scans/A", json!({"points": 5, "timestamp": server_timestamp()}))
            .await
            .unwrap();

        let doc = store.get("scans/A").await.unwrap().unwrap();
        assert_eq!(doc["points"], 5);
        assert!(doc["timestamp"].is_i64());
        assert!(store.get("scans/B").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_and_creates() {
        let store = store().await;
        let mut fields = Map::new();
        fields.insert("points".into(), json!(5));
        store.update("users/u1", fields).await.unwrap();

        let mut fields = Map::new();
        fields.insert("level".into(), json!(1));
        store.update("users/u1", fields).await.unwrap();

        assert_eq!(
            store.get("users/u1").await.unwrap().unwrap(),
            json!({"points": 5, "level": 1})
        );
    }

    #[tokio::test]
    async fn compare_and_set_against_read_value() {
        let store = store().await;
        assert!(store.compare_and_set("users/u1", None, json!({"points": 1.5, "b": [1, 2]})).await.unwrap());
        assert!(!store.compare_and_set("users/u1", None, json!({})).await.unwrap());

        let current = store.get("users/u1").await.unwrap().unwrap();
        assert!(store
            .compare_and_set("users/u1", Some(&current), json!({"points": 3}))
            .await
            .unwrap());
        assert!(!store
            .compare_and_set("users/u1", Some(&current), json!({"points": 4}))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn list_by_prefix() {
        let store = store().await;
        store.set("users/b", json!({"points": 2})).await.unwrap();
        store.set("users/a", json!({"points": 1})).await.unwrap();
        store.set("scans/x", json!({})).await.unwrap();

        let users = store.list("users/").await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].0, "users/a");
    }
}
