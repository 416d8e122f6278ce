//! Reward documents stored at `rewards/{id}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::remote::{RemoteError, RemoteStore, server_timestamp};

use super::RewardError;

const REWARDS_PREFIX: &str = "rewards/";

/// Catalog written by [`seed_rewards`]: id, name, description, cost, category, stock.
pub const DEFAULT_REWARDS: [(&str, &str, &str, u64, &str, u64); 3] = [
    (
        "reward-1",
        "Campus Cafeteria Voucher",
        "50 off any meal at the campus cafeteria",
        500,
        "food",
        100,
    ),
    (
        "reward-2",
        "Eco-Friendly Water Bottle",
        "Reusable stainless steel water bottle",
        800,
        "merchandise",
        50,
    ),
    (
        "reward-3",
        "Green Campus T-Shirt",
        "Organic cotton recycling awareness t-shirt",
        1200,
        "merchandise",
        30,
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Cost in points.
    pub points: u64,
    #[serde(default)]
    pub category: String,
    #[serde(default = "available_by_default")]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u64>,
}

const fn available_by_default() -> bool {
    true
}

impl Reward {
    /// Whether the reward can be redeemed right now.
    pub const fn is_available(&self) -> bool {
        self.available && !matches!(self.stock, Some(0))
    }
}

pub fn reward_path(reward_id: &str) -> String {
    format!("{REWARDS_PREFIX}{reward_id}")
}

/// Create any missing default reward. Existing rewards are left untouched.
/// Returns how many were created.
pub async fn seed_rewards(remote: &dyn RemoteStore) -> Result<usize, RemoteError> {
    let mut created = 0;
    for (id, name, description, points, category, stock) in DEFAULT_REWARDS {
        let reward = Reward {
            name: name.to_string(),
            description: description.to_string(),
            points,
            category: category.to_string(),
            available: true,
            stock: Some(stock),
        };
        let mut doc = serde_json::to_value(&reward)?;
        if let Value::Object(map) = &mut doc {
            map.insert("createdAt".into(), server_timestamp());
        }

        let path = reward_path(id);
        let written = if remote.supports_compare_and_set() {
            remote.compare_and_set(&path, None, doc).await?
        } else if remote.get(&path).await?.is_none() {
            remote.set(&path, doc).await?;
            true
        } else {
            false
        };
        if written {
            created += 1;
        }
    }
    if created > 0 {
        info!(created, "Reward catalog seeded");
    }
    Ok(created)
}

/// All rewards with their ids, cheapest first.
pub async fn list_rewards(remote: &dyn RemoteStore) -> Result<Vec<(String, Reward)>, RemoteError> {
    let mut rewards: Vec<(String, Reward)> = remote
        .list(REWARDS_PREFIX)
        .await?
        .into_iter()
        .filter_map(|(path, doc)| {
            let id = path.strip_prefix(REWARDS_PREFIX)?.to_string();
            match serde_json::from_value::<Reward>(doc) {
                Ok(reward) => Some((id, reward)),
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping unreadable reward");
                    None
                }
            }
        })
        .collect();
    rewards.sort_by(|a, b| a.1.points.cmp(&b.1.points).then_with(|| a.0.cmp(&b.0)));
    Ok(rewards)
}

pub async fn load_reward(remote: &dyn RemoteStore, reward_id: &str) -> Result<Reward, RewardError> {
    if reward_id.is_empty() || reward_id.contains('/') {
        return Err(RewardError::NotFound(reward_id.to_string()));
    }
    match remote.get(&reward_path(reward_id)).await? {
        Some(doc) => Ok(serde_json::from_value(doc)?),
        None => Err(RewardError::NotFound(reward_id.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteStore;
    use serde_json::json;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let remote = MemoryRemoteStore::new();
        assert_eq!(seed_rewards(&remote).await.unwrap(), 3);
        assert_eq!(seed_rewards(&remote).await.unwrap(), 0);

        let rewards = list_rewards(&remote).await.unwrap();
        let costs: Vec<u64> = rewards.iter().map(|(_, r)| r.points).collect();
        assert_eq!(costs, [500, 800, 1200]);
        assert_eq!(rewards[0].0, "reward-1");
        assert!(remote.document("rewards/reward-1").await.unwrap()["createdAt"].is_i64());
    }

    #[tokio::test]
    async fn seeding_keeps_edited_rewards() {
        let remote = MemoryRemoteStore::without_compare_and_set();
        remote
            .set("rewards/reward-2", json!({"name": "Bottle", "points": 750, "available": false}))
            .await
            .unwrap();

        assert_eq!(seed_rewards(&remote).await.unwrap(), 2);
        let bottle = load_reward(&remote, "reward-2").await.unwrap();
        assert_eq!(bottle.points, 750);
        assert!(!bottle.is_available());
    }

    #[tokio::test]
    async fn missing_reward_is_not_found() {
        let remote = MemoryRemoteStore::new();
        assert!(matches!(
            load_reward(&remote, "reward-9").await,
            Err(RewardError::NotFound(id)) if id == "reward-9"
        ));
    }

    #[test]
    fn out_of_stock_is_unavailable() {
        let reward: Reward = serde_json::from_value(json!({"points": 10, "stock": 0})).unwrap();
        assert!(reward.available);
        assert!(!reward.is_available());
    }
}
