//! Scan recorder: duplicate check, scan record creation, account update.

use std::sync::Arc;

use ecoscan_core::ScanInput;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::remote::{RemoteError, RemoteStore};

use super::account::{AccountTotals, ScanRecord, modify_account};
use super::{RecordOutcome, ScanError, achievements, scan_path};

/// Default number of conditional account-update attempts.
const DEFAULT_CAS_RETRIES: u32 = 5;

/// Turns validated scans into point awards on the remote store.
///
/// When the store offers `compare_and_set`, the scan record is created with
/// a create-if-absent write and the account with a conditional replace, so
/// concurrent scans of one barcode, or by one user, cannot double-award or
/// lose updates. Otherwise it falls back to read-then-write.
#[derive(Clone)]
pub struct ScanRecorder {
    remote: Arc<dyn RemoteStore>,
    cas_retries: u32,
}

impl ScanRecorder {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            cas_retries: DEFAULT_CAS_RETRIES,
        }
    }

    /// Override how many conditional account updates are attempted.
    #[must_use]
    pub fn with_cas_retries(mut self, retries: u32) -> Self {
        self.cas_retries = retries.max(1);
        self
    }

    pub fn remote(&self) -> &dyn RemoteStore {
        self.remote.as_ref()
    }

    /// Record `scan` for `user_id`.
    ///
    /// Fails with [`ScanError::Duplicate`] without mutating anything when
    /// the barcode already has a scan record. A failure after the scan record
    /// exists is [`ScanError::AwardIncomplete`], which replaying cannot fix.
    #[instrument(skip(self, scan), fields(user_id = %user_id, barcode = %scan.barcode))]
    pub async fn record(&self, user_id: &str, scan: &ScanInput) -> Result<RecordOutcome, ScanError> {
        if user_id.trim().is_empty() || user_id.contains('/') {
            return Err(ScanError::InvalidInput(format!("invalid user id: {user_id:?}")));
        }
        scan.validate()?;

        self.create_scan_record(user_id, scan).await?;
        let (totals, new_achievements) = self
            .apply_to_account(user_id, scan.points)
            .await
            .map_err(|source| {
                warn!(error = %source, "Scan recorded but account update failed");
                ScanError::AwardIncomplete {
                    barcode: scan.barcode.clone(),
                    source,
                }
            })?;

        info!(
            points = scan.points,
            total_points = totals.points,
            level = totals.level,
            total_scans = totals.total_scans,
            "Scan recorded"
        );

        Ok(RecordOutcome {
            barcode: scan.barcode.clone(),
            points: scan.points,
            new_total_points: totals.points,
            new_level: totals.level,
            new_total_scans: totals.total_scans,
            new_achievements,
        })
    }

    async fn create_scan_record(&self, user_id: &str, scan: &ScanInput) -> Result<(), ScanError> {
        let path = scan_path(&scan.barcode);
        let doc = ScanRecord::new(user_id, scan).to_document()?;

        let created = if self.remote.supports_compare_and_set() {
            self.remote.compare_and_set(&path, None, doc).await?
        } else if self.remote.get(&path).await?.is_some() {
            false
        } else {
            self.remote.set(&path, doc).await?;
            true
        };

        if !created {
            info!("Duplicate scan rejected");
            return Err(ScanError::Duplicate {
                barcode: scan.barcode.clone(),
            });
        }
        Ok(())
    }

    /// Award `points`, one scan, and any achievements they unlock, in a
    /// single account write.
    async fn apply_to_account(
        &self,
        user_id: &str,
        points: u64,
    ) -> Result<(AccountTotals, Vec<String>), RemoteError> {
        modify_account(self.remote(), user_id, self.cas_retries, |account| {
            let totals = account.after_scan(points);
            let (new, all) = achievements::award(&account.achievements, &totals);
            let mut fields = totals.to_fields();
            if !new.is_empty() {
                fields.insert("achievements".into(), Value::from(all));
            }
            Ok::<_, RemoteError>((fields, (totals, new)))
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::recorder::UserAccount;
    use crate::remote::MemoryRemoteStore;
    use ecoscan_core::{GeoPoint, Material};

    fn scan(barcode: &str, points: u64) -> ScanInput {
        ScanInput {
            barcode: barcode.into(),
            material_type: Material::Plastic.display_name().into(),
            points,
            location: GeoPoint::new(-26.1844, 28.0287),
        }
    }

    fn recorder(remote: &MemoryRemoteStore) -> ScanRecorder {
        ScanRecorder::new(Arc::new(remote.clone()))
    }

    #[tokio::test]
    async fn records_scan_and_updates_account() {
        let remote = MemoryRemoteStore::new();
        let outcome = recorder(&remote).record("u1", &scan("A", 5)).await.unwrap();

        assert_eq!(outcome.points, 5);
        assert_eq!(outcome.new_total_points, 5);
        assert_eq!(outcome.new_level, 1);
        assert_eq!(outcome.new_total_scans, 1);
        assert_eq!(outcome.new_achievements, vec!["first_scan"]);

        let record = remote.document("scans/A").await.unwrap();
        assert_eq!(record["userId"], "u1");
        assert!(record["timestamp"].is_i64());

        let user = remote.document("users/u1").await.unwrap();
        assert_eq!(user["points"], 5);
        assert_eq!(user["totalScans"], 1);
    }

    #[tokio::test]
    async fn second_scan_of_same_barcode_is_duplicate() {
        for remote in [MemoryRemoteStore::new(), MemoryRemoteStore::without_compare_and_set()] {
            let recorder = recorder(&remote);
            recorder.record("u1", &scan("A", 5)).await.unwrap();

            let err = recorder.record("u2", &scan("A", 5)).await.unwrap_err();
            assert!(err.is_duplicate());
            assert!(!err.is_retryable());

            assert_eq!(remote.count_prefix("scans/").await, 1);
            assert_eq!(remote.document("users/u1").await.unwrap()["points"], 5);
            assert!(remote.document("users/u2").await.is_none());
        }
    }

    #[tokio::test]
    async fn level_follows_points() {
        let remote = MemoryRemoteStore::new();
        let recorder = recorder(&remote);
        for i in 0..10 {
            recorder.record("u1", &scan(&format!("G{i}"), 10)).await.unwrap();
        }
        let account = UserAccount::from_document(remote.document("users/u1").await.as_ref()).unwrap();
        assert_eq!(account.points, 100);
        assert_eq!(account.level, 2);
        assert_eq!(account.total_scans, 10);
        assert!(account.achievements.contains(&"ten_scans".to_string()));
    }

    #[tokio::test]
    async fn concurrent_scans_by_one_user_do_not_lose_points() {
        let remote = MemoryRemoteStore::new();
        let recorder = recorder(&remote);

        let mut handles = Vec::new();
        for i in 0..8 {
            let recorder = recorder.clone().with_cas_retries(64);
            handles.push(tokio::spawn(async move {
                recorder.record("u1", &scan(&format!("C{i}"), 5)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let user = remote.document("users/u1").await.unwrap();
        assert_eq!(user["points"], 40);
        assert_eq!(user["totalScans"], 8);
    }

    #[tokio::test]
    async fn concurrent_scans_earn_each_achievement_once() {
        let remote = MemoryRemoteStore::new();
        let recorder = recorder(&remote).with_cas_retries(64);

        let (scan_x, scan_y) = (scan("X", 5), scan("Y", 5));
        let (a, b) = tokio::join!(
            recorder.record("u1", &scan_x),
            recorder.record("u1", &scan_y),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let first_scan_reports = [&a, &b]
            .iter()
            .filter(|o| o.new_achievements.contains(&"first_scan".to_string()))
            .count();
        assert_eq!(first_scan_reports, 1);

        let user = remote.document("users/u1").await.unwrap();
        assert_eq!(user["achievements"], serde_json::json!(["first_scan"]));
    }

    #[tokio::test]
    async fn account_failure_after_record_is_not_retryable() {
        let remote = MemoryRemoteStore::new();
        remote.fail_writes_to("users/u1").await;

        let err = recorder(&remote).record("u1", &scan("A", 5)).await.unwrap_err();
        assert!(matches!(err, ScanError::AwardIncomplete { .. }));
        assert!(!err.is_retryable());
        assert!(remote.document("scans/A").await.is_some());
    }

    #[tokio::test]
    async fn remote_failure_is_retryable() {
        let remote = MemoryRemoteStore::new();
        remote.set_available(false).await;

        let err = recorder(&remote).record("u1", &scan("A", 5)).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(remote.document("scans/A").await.is_none());
    }

    #[tokio::test]
    async fn rejects_invalid_input() {
        let remote = MemoryRemoteStore::new();
        let recorder = recorder(&remote);
        assert!(matches!(
            recorder.record("", &scan("A", 5)).await,
            Err(ScanError::InvalidInput(_))
        ));
        assert!(matches!(
            recorder.record("u1", &scan("A", 0)).await,
            Err(ScanError::InvalidInput(_))
        ));
        assert_eq!(remote.count_prefix("").await, 0);
    }
}
