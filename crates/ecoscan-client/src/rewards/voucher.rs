//! Voucher issue and redemption; documents stored at `vouchers/{id}`.

use chrono::{DateTime, Duration, Utc};
use ecoscan_core::db::unix_timestamp_millis;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, instrument, warn};

use crate::recorder::account::modify_account;
use crate::remote::{RemoteError, RemoteStore, merge_fields, server_timestamp};

use super::{RewardError, load_reward};

const VOUCHERS_PREFIX: &str = "vouchers/";

/// How long an issued voucher stays valid.
const VOUCHER_VALIDITY_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoucherStatus {
    Active,
    Redeemed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub id: String,
    pub user_id: String,
    pub reward_id: String,
    pub reward_name: String,
    #[serde(default)]
    pub reward_description: String,
    pub voucher_code: String,
    pub points_cost: u64,
    pub status: VoucherStatus,
    /// Server-assigned issue time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_by: Option<String>,
}

impl Voucher {
    fn to_document(&self) -> Result<Value, RemoteError> {
        let mut doc = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut doc {
            map.insert("createdAt".into(), server_timestamp());
        }
        Ok(doc)
    }
}

/// A successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    pub voucher: Voucher,
    /// Spendable points left after the redemption.
    pub balance: u64,
}

fn voucher_path(voucher_id: &str) -> String {
    format!("{VOUCHERS_PREFIX}{voucher_id}")
}

/// `ADV-<issue time, hex>-<6 random chars>`, upper case.
fn generate_code(now_ms: i64) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("ADV-{now_ms:X}-{}", random[..6].to_ascii_uppercase())
}

/// Spend `reward_id`'s cost from `user_id`'s balance and issue a voucher.
///
/// The balance check and the spend are one conditional account write, so
/// concurrent redemptions cannot overdraw. If the voucher cannot be written
/// the spend is refunded.
#[instrument(skip(remote), fields(user_id = %user_id, reward_id = %reward_id))]
pub async fn redeem(
    remote: &dyn RemoteStore,
    user_id: &str,
    reward_id: &str,
    cas_retries: u32,
) -> Result<Redemption, RewardError> {
    if user_id.trim().is_empty() || user_id.contains('/') {
        return Err(RewardError::InvalidUser(user_id.to_string()));
    }
    let reward = load_reward(remote, reward_id).await?;
    if !reward.is_available() {
        return Err(RewardError::Unavailable(reward_id.to_string()));
    }
    let cost = reward.points;

    let now = Utc::now();
    let voucher = Voucher {
        id: uuid::Uuid::new_v4().simple().to_string(),
        user_id: user_id.to_string(),
        reward_id: reward_id.to_string(),
        reward_name: reward.name,
        reward_description: reward.description,
        voucher_code: generate_code(now.timestamp_millis()),
        points_cost: cost,
        status: VoucherStatus::Active,
        created_at: None,
        expires_at: now + Duration::days(VOUCHER_VALIDITY_DAYS),
        redeemed_at: None,
        redeemed_by: None,
    };
    let doc = voucher.to_document()?;

    let balance = modify_account(remote, user_id, cas_retries, |account| {
        let available = account.balance();
        if available < cost {
            return Err(RewardError::InsufficientPoints {
                available,
                required: cost,
            });
        }
        let mut fields = Map::new();
        fields.insert(
            "pointsSpent".into(),
            Value::from(account.points_spent.saturating_add(cost)),
        );
        fields.insert("updatedAt".into(), server_timestamp());
        Ok((fields, available - cost))
    })
    .await?;

    if let Err(e) = remote.set(&voucher_path(&voucher.id), doc).await {
        warn!(error = %e, "Voucher write failed, refunding");
        refund(remote, user_id, cost, cas_retries).await;
        return Err(e.into());
    }

    info!(
        voucher_id = %voucher.id,
        points_cost = cost,
        balance,
        "Reward redeemed"
    );
    Ok(Redemption { voucher, balance })
}

async fn refund(remote: &dyn RemoteStore, user_id: &str, cost: u64, cas_retries: u32) {
    let result = modify_account(remote, user_id, cas_retries, |account| {
        let mut fields = Map::new();
        fields.insert(
            "pointsSpent".into(),
            Value::from(account.points_spent.saturating_sub(cost)),
        );
        fields.insert("updatedAt".into(), server_timestamp());
        Ok::<_, RemoteError>((fields, ()))
    })
    .await;
    if let Err(e) = result {
        error!(user_id = %user_id, cost, error = %e, "Refund after failed redemption did not apply");
    }
}

/// Vouchers issued to `user_id`, newest first.
pub async fn user_vouchers(
    remote: &dyn RemoteStore,
    user_id: &str,
) -> Result<Vec<Voucher>, RemoteError> {
    let mut vouchers = Vec::new();
    for (path, doc) in remote.list(VOUCHERS_PREFIX).await? {
        if doc.get("userId").and_then(Value::as_str) != Some(user_id) {
            continue;
        }
        match serde_json::from_value::<Voucher>(doc) {
            Ok(voucher) => vouchers.push(voucher),
            Err(e) => warn!(path = %path, error = %e, "Skipping unreadable voucher"),
        }
    }
    vouchers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(vouchers)
}

/// Mark the voucher with `code` as used at `now` by `redeemed_by`.
///
/// A voucher can be used once; two concurrent uses of one code resolve to a
/// single success when the store offers `compare_and_set`.
#[instrument(skip(remote, now))]
pub async fn use_voucher(
    remote: &dyn RemoteStore,
    code: &str,
    redeemed_by: &str,
    now: DateTime<Utc>,
) -> Result<Voucher, RewardError> {
    let found = remote
        .list(VOUCHERS_PREFIX)
        .await?
        .into_iter()
        .find(|(_, doc)| doc.get("voucherCode").and_then(Value::as_str) == Some(code));
    let Some((path, current)) = found else {
        return Err(RewardError::InvalidVoucher);
    };

    let mut voucher: Voucher = serde_json::from_value(current.clone())?;
    if voucher.status != VoucherStatus::Active {
        return Err(RewardError::VoucherUsed);
    }
    if now > voucher.expires_at {
        return Err(RewardError::VoucherExpired);
    }

    let redeemed_at = unix_timestamp_millis();
    let mut fields = Map::new();
    fields.insert("status".into(), serde_json::to_value(VoucherStatus::Redeemed)?);
    fields.insert("redeemedAt".into(), Value::from(redeemed_at));
    fields.insert("redeemedBy".into(), Value::from(redeemed_by));

    if remote.supports_compare_and_set() {
        let next = merge_fields(Some(current.clone()), fields);
        if !remote.compare_and_set(&path, Some(&current), next).await? {
            return Err(RewardError::VoucherUsed);
        }
    } else {
        remote.update(&path, fields).await?;
    }

    voucher.status = VoucherStatus::Redeemed;
    voucher.redeemed_at = Some(redeemed_at);
    voucher.redeemed_by = Some(redeemed_by.to_string());
    info!(voucher_id = %voucher.id, user_id = %voucher.user_id, "Voucher used");
    Ok(voucher)
}
