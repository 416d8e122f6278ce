//! Reward catalog and voucher redemption.
//!
//! Redeeming a reward adds its cost to the account's `pointsSpent` with the
//! same conditional write scans use, then issues a voucher. The cumulative
//! `points` total, and the level derived from it, never go down.

mod catalog;
mod voucher;

use crate::remote::RemoteError;

pub use catalog::{DEFAULT_REWARDS, Reward, list_rewards, load_reward, reward_path, seed_rewards};
pub use voucher::{Redemption, Voucher, VoucherStatus, redeem, use_voucher, user_vouchers};

/// Reward and voucher errors.
#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    #[error("Reward {0} not found")]
    NotFound(String),

    #[error("Reward {0} is not available")]
    Unavailable(String),

    #[error("Insufficient points: {available} available, {required} required")]
    InsufficientPoints { available: u64, required: u64 },

    #[error("Invalid user id: {0:?}")]
    InvalidUser(String),

    #[error("Invalid voucher code")]
    InvalidVoucher,

    #[error("Voucher has already been redeemed")]
    VoucherUsed,

    #[error("Voucher has expired")]
    VoucherExpired,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl From<serde_json::Error> for RewardError {
    fn from(e: serde_json::Error) -> Self {
        Self::Remote(e.into())
    }
}
