//! `ecoscan rewards`, `ecoscan redeem` and `ecoscan vouchers`.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};

use chrono::{Local, Utc};

use crate::connectivity::ConnectivityObserver;
use crate::context::AppContext;
use crate::recorder::UserAccount;
use crate::recorder::account::load_account;
use crate::rewards::{VoucherStatus, list_rewards, redeem, seed_rewards, use_voucher, user_vouchers};

/// Voucher subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum VoucherAction {
    /// Vouchers issued to the user, newest first.
    List,
    /// Mark a voucher as used.
    Use {
        /// Voucher code, e.g. ADV-18F2A3B4C5D-1A2B3C.
        code: String,
        /// Who accepted the voucher.
        #[arg(long, default_value = "counter")]
        by: String,
    },
}

fn require_online(ctx: &AppContext) -> anyhow::Result<()> {
    if !ctx.network.is_connected() {
        anyhow::bail!("Rewards need a connection");
    }
    Ok(())
}

/// List the reward catalog with the user's balance.
pub async fn run_rewards(ctx: &AppContext, user_id: &str) -> anyhow::Result<()> {
    require_online(ctx)?;
    let mut out = io::stdout();
    seed_rewards(&ctx.remote).await?;
    let balance = load_account(&ctx.remote, user_id)
        .await?
        .as_ref()
        .map_or(0, UserAccount::balance);

    writeln!(out, "Balance: {balance} points")?;
    writeln!(out, "{:<12} {:<28} {:>6}  STATUS", "ID", "REWARD", "COST")?;
    for (id, reward) in list_rewards(&ctx.remote).await? {
        let status = if !reward.is_available() {
            "unavailable"
        } else if reward.points > balance {
            "need more points"
        } else {
            "available"
        };
        writeln!(out, "{id:<12} {:<28} {:>6}  {status}", reward.name, reward.points)?;
    }
    Ok(())
}

/// Redeem `reward_id` for `user_id` and print the voucher code.
pub async fn run_redeem(ctx: &AppContext, user_id: &str, reward_id: &str) -> anyhow::Result<()> {
    require_online(ctx)?;
    let mut out = io::stdout();
    seed_rewards(&ctx.remote).await?;
    let redemption = redeem(&ctx.remote, user_id, reward_id, ctx.config.recorder.cas_retries).await?;
    let v = &redemption.voucher;

    writeln!(out, "Redeemed {} for {} points", v.reward_name, v.points_cost)?;
    writeln!(out, "  Voucher: {}", v.voucher_code)?;
    writeln!(out, "  Expires: {}", v.expires_at.with_timezone(&Local).format("%Y-%m-%d"))?;
    writeln!(out, "  Balance: {} points", redemption.balance)?;
    Ok(())
}

/// Execute a voucher subcommand.
pub async fn run_vouchers(ctx: &AppContext, user_id: &str, action: VoucherAction) -> anyhow::Result<()> {
    require_online(ctx)?;
    let mut out = io::stdout();
    match action {
        VoucherAction::List => {
            let vouchers = user_vouchers(&ctx.remote, user_id).await?;
            if vouchers.is_empty() {
                writeln!(out, "No vouchers")?;
                return Ok(());
            }
            let now = Utc::now();
            for v in &vouchers {
                let status = match v.status {
                    VoucherStatus::Redeemed => "used",
                    VoucherStatus::Active if now > v.expires_at => "expired",
                    VoucherStatus::Active => "active",
                };
                writeln!(
                    out,
                    "{:<26} {:<28} {:>6}  {status:<8} expires {}",
                    v.voucher_code,
                    v.reward_name,
                    v.points_cost,
                    v.expires_at.with_timezone(&Local).format("%Y-%m-%d")
                )?;
            }
        }
        VoucherAction::Use { code, by } => {
            let voucher = use_voucher(&ctx.remote, &code, &by, Utc::now()).await?;
            writeln!(out, "Voucher {} accepted: {} for {}", voucher.voucher_code, voucher.reward_name, voucher.user_id)?;
        }
    }
    Ok(())
}
