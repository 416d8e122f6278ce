//! Read-side views over the remote store: leaderboard, scan history and
//! per-user statistics.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::recorder::{ScanRecord, UserAccount, user_path};
use crate::remote::{RemoteError, RemoteStore};

const USERS_PREFIX: &str = "users/";
const SCANS_PREFIX: &str = "scans/";

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub display_name: Option<String>,
    pub points: u64,
    pub level: u64,
    pub total_scans: u64,
}

/// Top `limit` accounts by cumulative points; ties go to the lower user id.
pub async fn leaderboard(
    remote: &dyn RemoteStore,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, RemoteError> {
    let mut entries: Vec<LeaderboardEntry> = remote
        .list(USERS_PREFIX)
        .await?
        .into_iter()
        .filter_map(|(path, doc)| {
            let user_id = path.strip_prefix(USERS_PREFIX)?;
            if user_id.contains('/') {
                return None;
            }
            match UserAccount::from_document(Some(&doc)) {
                Ok(account) => Some(LeaderboardEntry {
                    user_id: user_id.to_string(),
                    display_name: account.display_name,
                    points: account.points,
                    level: account.level,
                    total_scans: account.total_scans,
                }),
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping unreadable account");
                    None
                }
            }
        })
        .collect();

    entries.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.user_id.cmp(&b.user_id)));
    entries.truncate(limit);
    Ok(entries)
}

/// A recorded scan with its barcode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanHistoryEntry {
    pub barcode: String,
    #[serde(flatten)]
    pub record: ScanRecord,
}

async fn scans_of(
    remote: &dyn RemoteStore,
    user_id: &str,
) -> Result<Vec<ScanHistoryEntry>, RemoteError> {
    let owned_by = |doc: &Value| doc.get("userId").and_then(Value::as_str) == Some(user_id);

    let mut scans = Vec::new();
    for (path, doc) in remote.list(SCANS_PREFIX).await? {
        if !owned_by(&doc) {
            continue;
        }
        let Some(barcode) = path.strip_prefix(SCANS_PREFIX) else {
            continue;
        };
        match serde_json::from_value::<ScanRecord>(doc) {
            Ok(record) => scans.push(ScanHistoryEntry {
                barcode: barcode.to_string(),
                record,
            }),
            Err(e) => warn!(path = %path, error = %e, "Skipping unreadable scan record"),
        }
    }
    // Newest first; records without a timestamp sort last.
    scans.sort_by(|a, b| b.record.timestamp.cmp(&a.record.timestamp));
    Ok(scans)
}

/// The `limit` most recent scans recorded for `user_id`.
pub async fn user_scans(
    remote: &dyn RemoteStore,
    user_id: &str,
    limit: usize,
) -> Result<Vec<ScanHistoryEntry>, RemoteError> {
    let mut scans = scans_of(remote, user_id).await?;
    scans.truncate(limit);
    Ok(scans)
}

/// Scan counts per material family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaterialBreakdown {
    pub plastic: u64,
    pub glass: u64,
    pub aluminum: u64,
    pub paper: u64,
}

impl MaterialBreakdown {
    /// Count one scan by its `materialType` label. Unknown labels are ignored.
    fn add(&mut self, material_type: &str) {
        let label = material_type.to_ascii_lowercase();
        let slot = if label.contains("plastic") {
            &mut self.plastic
        } else if label.contains("glass") {
            &mut self.glass
        } else if label.contains("alumin") {
            &mut self.aluminum
        } else if label.contains("paper") || label.contains("cardboard") {
            &mut self.paper
        } else {
            return;
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_scans: u64,
    pub total_points: u64,
    pub level: u64,
    pub balance: u64,
    pub achievements: Vec<String>,
    pub material_breakdown: MaterialBreakdown,
    pub scans_this_week: u64,
    pub scans_this_month: u64,
    pub points_from_scans: u64,
    pub average_points_per_scan: u64,
}

/// Account totals plus a breakdown of the user's scan records, with the
/// recent-activity windows measured back from `now_ms`.
pub async fn user_stats(
    remote: &dyn RemoteStore,
    user_id: &str,
    now_ms: i64,
) -> Result<UserStats, RemoteError> {
    let doc = remote.get(&user_path(user_id)).await?;
    let account = UserAccount::from_document(doc.as_ref())?;
    let scans = scans_of(remote, user_id).await?;

    let week_start = now_ms - 7 * DAY_MS;
    let month_start = now_ms - 30 * DAY_MS;

    let mut breakdown = MaterialBreakdown::default();
    let mut points_from_scans = 0u64;
    let mut scans_this_week = 0u64;
    let mut scans_this_month = 0u64;
    for scan in &scans {
        breakdown.add(&scan.record.material_type);
        points_from_scans = points_from_scans.saturating_add(scan.record.points);
        if let Some(ts) = scan.record.timestamp {
            if ts > week_start {
                scans_this_week += 1;
            }
            if ts > month_start {
                scans_this_month += 1;
            }
        }
    }

    let average_points_per_scan = if account.total_scans > 0 {
        (points_from_scans + account.total_scans / 2) / account.total_scans
    } else {
        0
    };

    Ok(UserStats {
        total_scans: account.total_scans,
        total_points: account.points,
        level: account.level,
        balance: account.balance(),
        achievements: account.achievements,
        material_breakdown: breakdown,
        scans_this_week,
        scans_this_month,
        points_from_scans,
        average_points_per_scan,
    })
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteStore;
    use serde_json::json;

    fn scan_doc(user: &str, material: &str, points: u64, timestamp: i64) -> Value {
        json!({
            "userId": user,
            "materialType": material,
            "points": points,
            "location": {"latitude": 0.0, "longitude": 0.0},
            "timestamp": timestamp,
            "validated": true,
        })
    }

    #[tokio::test]
    async fn leaderboard_orders_by_points_then_id() {
        let remote = MemoryRemoteStore::new();
        remote.set("users/carol", json!({"points": 50, "level": 1})).await.unwrap();
        remote.set("users/bob", json!({"points": 120, "level": 2, "totalScans": 12})).await.unwrap();
        remote.set("users/alice", json!({"points": 120, "level": 2, "displayName": "Alice"})).await.unwrap();
        remote.set("users/dan", json!({})).await.unwrap();

        let board = leaderboard(&remote, 3).await.unwrap();
        let ids: Vec<&str> = board.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(ids, ["alice", "bob", "carol"]);
        assert_eq!(board[0].display_name.as_deref(), Some("Alice"));
        assert_eq!(board[1].total_scans, 12);
    }

    #[tokio::test]
    async fn leaderboard_skips_unreadable_accounts() {
        let remote = MemoryRemoteStore::new();
        remote.set("users/ok", json!({"points": 5})).await.unwrap();
        remote.set("users/bad", json!({"points": "lots"})).await.unwrap();

        let board = leaderboard(&remote, 10).await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].user_id, "ok");
    }

    #[tokio::test]
    async fn user_scans_newest_first_and_limited() {
        let remote = MemoryRemoteStore::new();
        remote.set("scans/A", scan_doc("u1", "Plastic Bottle", 5, 1_000)).await.unwrap();
        remote.set("scans/B", scan_doc("u1", "Glass Bottle", 10, 3_000)).await.unwrap();
        remote.set("scans/C", scan_doc("u1", "Aluminum Can", 7, 2_000)).await.unwrap();
        remote.set("scans/D", scan_doc("u2", "Paper/Cardboard", 3, 4_000)).await.unwrap();

        let scans = user_scans(&remote, "u1", 2).await.unwrap();
        let barcodes: Vec<&str> = scans.iter().map(|s| s.barcode.as_str()).collect();
        assert_eq!(barcodes, ["B", "C"]);
    }

    #[tokio::test]
    async fn stats_break_down_materials_and_windows() {
        let remote = MemoryRemoteStore::new();
        let now = 100 * DAY_MS;
        remote
            .set("users/u1", json!({"points": 600, "level": 7, "totalScans": 4, "pointsSpent": 500}))
            .await
            .unwrap();
        remote.set("scans/A", scan_doc("u1", "Plastic Bottle", 5, now - DAY_MS)).await.unwrap();
        remote.set("scans/B", scan_doc("u1", "Glass Bottle", 10, now - 10 * DAY_MS)).await.unwrap();
        remote.set("scans/C", scan_doc("u1", "Paper/Cardboard", 3, now - 40 * DAY_MS)).await.unwrap();
        remote.set("scans/D", scan_doc("u1", "Plastic Bottle", 5, now - 2 * DAY_MS)).await.unwrap();
        remote.set("scans/E", scan_doc("u2", "Aluminum Can", 7, now)).await.unwrap();

        let stats = user_stats(&remote, "u1", now).await.unwrap();
        assert_eq!(
            stats.material_breakdown,
            MaterialBreakdown { plastic: 2, glass: 1, aluminum: 0, paper: 1 }
        );
        assert_eq!(stats.scans_this_week, 2);
        assert_eq!(stats.scans_this_month, 3);
        assert_eq!(stats.points_from_scans, 23);
        assert_eq!(stats.average_points_per_scan, 6);
        assert_eq!(stats.total_points, 600);
        assert_eq!(stats.balance, 100);
    }

    #[tokio::test]
    async fn stats_for_unknown_user_are_empty() {
        let remote = MemoryRemoteStore::new();
        let stats = user_stats(&remote, "nobody", 0).await.unwrap();
        assert_eq!(stats.total_scans, 0);
        assert_eq!(stats.level, 1);
        assert_eq!(stats.average_points_per_scan, 0);
    }
}
