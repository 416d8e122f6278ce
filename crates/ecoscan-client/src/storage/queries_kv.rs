//! Key/value queries backing device-local persistent storage.

use ecoscan_core::db::{DatabaseError, unix_timestamp};

use super::db::Database;
use super::models::KvRow;

impl Database {
    /// Read a value by key.
    pub async fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let row = sqlx::query_as::<_, KvRow>("SELECT * FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|r| r.value))
    }

    /// Write a value, replacing any previous one.
    pub async fn kv_put(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Delete a key. Returns whether a row was removed.
    pub async fn kv_delete(&self, key: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
