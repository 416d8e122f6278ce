//! Remote document store.
//!
//! The hosted database is reached only through [`RemoteStore`]: read, write
//! and merge a JSON document by path, plus an optional conditional write.
//! Paths are opaque keys such as `scans/{barcode}` or `users/{user_id}`.

mod memory;
mod sqlite;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use memory::MemoryRemoteStore;
pub use sqlite::SqliteRemoteStore;

/// Key of the server-value sentinel object.
const SERVER_VALUE_KEY: &str = ".sv";

/// Remote store errors.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote storage error: {0}")]
    Storage(String),

    #[error("Remote serialization error: {0}")]
    Serialization(String),

    #[error("Unsupported remote operation: {0}")]
    Unsupported(&'static str),

    #[error("Write contention on {path} after {attempts} attempts")]
    Contention { path: String, attempts: u32 },
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<ecoscan_core::db::DatabaseError> for RemoteError {
    fn from(e: ecoscan_core::db::DatabaseError) -> Self {
        Self::Storage(e.to_string())
    }
}

/// Minimal document-store contract used by the recorder and reward services.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read the document at `path`.
    async fn get(&self, path: &str) -> Result<Option<Value>, RemoteError>;

    /// Write `value` at `path`, replacing any existing document.
    async fn set(&self, path: &str, value: Value) -> Result<(), RemoteError>;

    /// Merge `fields` into the document at `path`, creating it if absent.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<(), RemoteError>;

    /// Paths and documents under `prefix`, ordered by path.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, Value)>, RemoteError>;

    /// Whether [`RemoteStore::compare_and_set`] is available.
    fn supports_compare_and_set(&self) -> bool {
        false
    }

    /// Write `value` at `path` only if the current document equals
    /// `expected` (`None` meaning absent). Returns whether it was written.
    async fn compare_and_set(
        &self,
        _path: &str,
        _expected: Option<&Value>,
        _value: Value,
    ) -> Result<bool, RemoteError> {
        Err(RemoteError::Unsupported("compare_and_set"))
    }
}

/// Placeholder the store replaces with its own clock (milliseconds) on write.
pub fn server_timestamp() -> Value {
    let mut sentinel = Map::new();
    sentinel.insert(SERVER_VALUE_KEY.to_string(), Value::from("timestamp"));
    Value::Object(sentinel)
}

/// Replace every server-timestamp placeholder inside `value` with `now_ms`.
pub(crate) fn resolve_server_values(value: &mut Value, now_ms: i64) {
    match value {
        Value::Object(map) => {
            if map.len() == 1
                && map.get(SERVER_VALUE_KEY).and_then(Value::as_str) == Some("timestamp")
            {
                *value = Value::from(now_ms);
                return;
            }
            for v in map.values_mut() {
                resolve_server_values(v, now_ms);
            }
        }
        Value::Array(items) => {
            for v in items {
                resolve_server_values(v, now_ms);
            }
        }
        _ => {}
    }
}

/// Shallow merge of `fields` into `current`. Non-object documents are replaced.
pub(crate) fn merge_fields(current: Option<Value>, fields: Map<String, Value>) -> Value {
    match current {
        Some(Value::Object(mut map)) => {
            map.extend(fields);
            Value::Object(map)
        }
        _ => Value::Object(fields),
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_server_timestamps() {
        let mut value = json!({
            "a": server_timestamp(),
            "b": {"c": server_timestamp(), "d": 1},
            "e": [server_timestamp()],
        });
        resolve_server_values(&mut value, 42);
        assert_eq!(value, json!({"a": 42, "b": {"c": 42, "d": 1}, "e": [42]}));
    }

    #[test]
    fn leaves_lookalike_objects_alone() {
        let mut value = json!({".sv": "increment", "x": 1});
        let before = value.clone();
        resolve_server_values(&mut value, 42);
        assert_eq!(value, before);
    }

    #[test]
    fn merge_keeps_untouched_fields() {
        let mut fields = Map::new();
        fields.insert("points".into(), json!(10));
        let merged = merge_fields(Some(json!({"points": 5, "name": "ann"})), fields);
        assert_eq!(merged, json!({"points": 10, "name": "ann"}));
    }

    #[test]
    fn merge_into_absent_creates_object() {
        let mut fields = Map::new();
        fields.insert("level".into(), json!(1));
        assert_eq!(merge_fields(None, fields), json!({"level": 1}));
    }
}
