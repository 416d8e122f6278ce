//! Remote document shapes for scan records and user accounts.

use ecoscan_core::{GeoPoint, ScanInput, level_for_points};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::remote::{RemoteError, RemoteStore, merge_fields, server_timestamp};

use super::user_path;

/// Document stored at `scans/{barcode}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub user_id: String,
    pub material_type: String,
    pub points: u64,
    pub location: GeoPoint,
    /// Server-assigned creation time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub validated: bool,
}

impl ScanRecord {
    pub fn new(user_id: &str, scan: &ScanInput) -> Self {
        Self {
            user_id: user_id.to_string(),
            material_type: scan.material_type.clone(),
            points: scan.points,
            location: scan.location,
            timestamp: None,
            validated: true,
        }
    }

    /// Document to write, with the creation time left to the server.
    pub fn to_document(&self) -> Result<Value, RemoteError> {
        let mut doc = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut doc {
            map.insert("timestamp".into(), server_timestamp());
        }
        Ok(doc)
    }
}

/// Document stored at `users/{user_id}`. Missing fields read as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub points: u64,
    #[serde(default = "first_level")]
    pub level: u64,
    #[serde(default)]
    pub total_scans: u64,
    /// Points exchanged for rewards; `points` itself stays cumulative.
    #[serde(default)]
    pub points_spent: u64,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scan_date: Option<String>,
}

const fn first_level() -> u64 {
    1
}

impl Default for UserAccount {
    fn default() -> Self {
        Self {
            display_name: None,
            points: 0,
            level: first_level(),
            total_scans: 0,
            points_spent: 0,
            achievements: Vec::new(),
            last_scan_date: None,
        }
    }
}

/// Account counters after a scan was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountTotals {
    pub points: u64,
    pub level: u64,
    pub total_scans: u64,
}

impl UserAccount {
    /// Parse an account document; an absent document is a fresh account.
    pub fn from_document(doc: Option<&Value>) -> Result<Self, RemoteError> {
        match doc {
            Some(Value::Null) | None => Ok(Self::default()),
            Some(doc) => Ok(serde_json::from_value(doc.clone())?),
        }
    }

    /// Points still available to spend on rewards.
    pub const fn balance(&self) -> u64 {
        self.points.saturating_sub(self.points_spent)
    }

    /// Counters after awarding `points` for one more scan.
    pub const fn after_scan(&self, points: u64) -> AccountTotals {
        let new_points = self.points.saturating_add(points);
        AccountTotals {
            points: new_points,
            level: level_for_points(new_points),
            total_scans: self.total_scans.saturating_add(1),
        }
    }
}

impl AccountTotals {
    /// Fields merged into the account document.
    pub fn to_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("points".into(), Value::from(self.points));
        fields.insert("level".into(), Value::from(self.level));
        fields.insert("totalScans".into(), Value::from(self.total_scans));
        fields.insert(
            "lastScanDate".into(),
            Value::from(chrono::Utc::now().to_rfc3339()),
        );
        fields.insert("updatedAt".into(), server_timestamp());
        fields
    }
}

/// Read the account for `user_id`, if one exists.
pub async fn load_account(
    remote: &dyn RemoteStore,
    user_id: &str,
) -> Result<Option<UserAccount>, RemoteError> {
    match remote.get(&user_path(user_id)).await? {
        Some(doc) => Ok(Some(UserAccount::from_document(Some(&doc))?)),
        None => Ok(None),
    }
}

/// Create the account document for `user_id` unless it already exists.
pub async fn ensure_account(
    remote: &dyn RemoteStore,
    user_id: &str,
    display_name: Option<&str>,
) -> Result<UserAccount, RemoteError> {
    let path = user_path(user_id);
    let account = UserAccount {
        display_name: display_name.map(str::to_string),
        ..UserAccount::default()
    };
    let mut doc = serde_json::to_value(&account)?;
    if let Value::Object(map) = &mut doc {
        map.insert("createdAt".into(), server_timestamp());
        map.insert("updatedAt".into(), server_timestamp());
    }

    if remote.supports_compare_and_set() {
        if remote.compare_and_set(&path, None, doc).await? {
            info!(user_id = %user_id, "User account created");
            return Ok(account);
        }
    } else if remote.get(&path).await?.is_none() {
        remote.set(&path, doc).await?;
        info!(user_id = %user_id, "User account created");
        return Ok(account);
    }

    // Lost the race or the account existed already.
    load_account(remote, user_id)
        .await?
        .ok_or_else(|| RemoteError::Storage(format!("account {user_id} vanished")))
}

/// Read-modify-write of the account for `user_id`.
///
/// `change` sees the current account and returns the fields to merge plus a
/// value handed back on success, or an error that aborts without writing.
/// With `compare_and_set` the write only lands if the document is unchanged
/// since the read, retrying up to `attempts` times; otherwise it is a plain
/// read then update.
pub async fn modify_account<T, E>(
    remote: &dyn RemoteStore,
    user_id: &str,
    attempts: u32,
    mut change: impl FnMut(&UserAccount) -> Result<(Map<String, Value>, T), E>,
) -> Result<T, E>
where
    E: From<RemoteError>,
{
    let path = user_path(user_id);

    if !remote.supports_compare_and_set() {
        let current = remote.get(&path).await?;
        let account = UserAccount::from_document(current.as_ref())?;
        let (fields, out) = change(&account)?;
        remote.update(&path, fields).await?;
        return Ok(out);
    }

    for attempt in 0..attempts.max(1) {
        let current = remote.get(&path).await?;
        let account = UserAccount::from_document(current.as_ref())?;
        let (fields, out) = change(&account)?;
        let next = merge_fields(current.clone(), fields);

        if remote.compare_and_set(&path, current.as_ref(), next).await? {
            return Ok(out);
        }
        debug!(attempt, user_id = %user_id, "Account changed concurrently, retrying");
    }

    Err(RemoteError::Contention {
        path,
        attempts: attempts.max(1),
    }
    .into())
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteStore;
    use serde_json::json;

    #[test]
    fn missing_fields_read_as_fresh_account() {
        let account = UserAccount::from_document(Some(&json!({"displayName": "ann"}))).unwrap();
        assert_eq!(account.points, 0);
        assert_eq!(account.level, 1);
        assert_eq!(account.total_scans, 0);
        assert_eq!(account.display_name.as_deref(), Some("ann"));
        assert_eq!(account.balance(), 0);
    }

    #[test]
    fn balance_excludes_spent_points() {
        let account = UserAccount::from_document(Some(&json!({"points": 700, "pointsSpent": 500}))).unwrap();
        assert_eq!(account.balance(), 200);
        assert_eq!(account.points, 700);
    }

    #[test]
    fn after_scan_recomputes_level() {
        let account = UserAccount {
            points: 95,
            total_scans: 19,
            ..UserAccount::default()
        };
        let totals = account.after_scan(10);
        assert_eq!(totals.points, 105);
        assert_eq!(totals.level, 2);
        assert_eq!(totals.total_scans, 20);
    }

    #[test]
    fn scan_record_document_asks_for_server_time() {
        let scan = ScanInput::for_material(
            "A",
            ecoscan_core::Material::Plastic,
            GeoPoint::new(1.0, 2.0),
        );
        let doc = ScanRecord::new("u1", &scan).to_document().unwrap();
        assert_eq!(doc["userId"], "u1");
        assert_eq!(doc["validated"], true);
        assert_eq!(doc["timestamp"], server_timestamp());
    }

    #[tokio::test]
    async fn ensure_account_is_idempotent() {
        let remote = MemoryRemoteStore::new();
        let first = ensure_account(&remote, "u1", Some("ann")).await.unwrap();
        assert_eq!(first.points, 0);

        remote
            .update("users/u1", AccountTotals { points: 40, level: 1, total_scans: 4 }.to_fields())
            .await
            .unwrap();

        let second = ensure_account(&remote, "u1", Some("someone else")).await.unwrap();
        assert_eq!(second.points, 40);
        assert_eq!(second.display_name.as_deref(), Some("ann"));
    }

    #[tokio::test]
    async fn ensure_account_without_compare_and_set() {
        let remote = MemoryRemoteStore::without_compare_and_set();
        ensure_account(&remote, "u1", None).await.unwrap();
        let doc = remote.document("users/u1").await.unwrap();
        assert_eq!(doc["level"], 1);
        assert!(doc["createdAt"].is_i64());
    }
}
