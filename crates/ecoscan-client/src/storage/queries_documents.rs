//! Document queries backing the `SQLite` remote store.

use ecoscan_core::db::{DatabaseError, unix_timestamp_millis};

use super::db::Database;
use super::models::DocumentRow;

impl Database {
    /// Get a document by path.
    pub async fn get_document(&self, path: &str) -> Result<Option<DocumentRow>, DatabaseError> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE path = ?")
            .bind(path)
            .fetch_optional(self.pool())
            .await?;

        Ok(row)
    }

    /// Insert or overwrite a document.
    pub async fn put_document(&self, path: &str, value: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO documents (path, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(path)
        .bind(value)
        .bind(unix_timestamp_millis())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Insert a document only if the path is free. Returns whether it was written.
    pub async fn insert_document_if_absent(
        &self,
        path: &str,
        value: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO documents (path, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(path) DO NOTHING",
        )
        .bind(path)
        .bind(value)
        .bind(unix_timestamp_millis())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace a document only if its stored text still equals `expected`.
    /// Returns whether it was written.
    pub async fn replace_document_if_equal(
        &self,
        path: &str,
        expected: &str,
        value: &str,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE documents SET value = ?, updated_at = ? WHERE path = ? AND value = ?",
        )
        .bind(value)
        .bind(unix_timestamp_millis())
        .bind(path)
        .bind(expected)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List documents whose path starts with `prefix`, ordered by path.
    pub async fn list_documents(&self, prefix: &str) -> Result<Vec<DocumentRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE substr(path, 1, length(?)) = ? ORDER BY path",
        )
        .bind(prefix)
        .bind(prefix)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
