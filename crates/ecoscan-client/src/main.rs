//! `EcoScan` command-line client.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use ecoscan_client::context::AppContext;
use ecoscan_client::queue::DuplicatePolicy;
use ecoscan_client::queue_cmd::{self, QueueAction};
use ecoscan_client::rewards_cmd::{self, VoucherAction};
use ecoscan_client::scan_cmd::{self, ScanArgs};
use ecoscan_client::{profile_cmd, stats_cmd, watch_cmd};

#[derive(Parser, Debug)]
#[command(name = "ecoscan")]
#[command(version, about = "EcoScan - campus recycling scans with offline sync")]
struct Cli {
    /// User the scans are credited to.
    #[arg(long, short, global = true, env = "ECOSCAN_USER", default_value = "demo-user")]
    user: String,

    /// Treat the device as offline at start.
    #[arg(long, global = true)]
    offline: bool,

    /// Path to the database standing in for the hosted store.
    #[arg(long, global = true)]
    remote_db: Option<PathBuf>,

    /// Path to the device database holding the offline queue.
    #[arg(long, global = true)]
    device_db: Option<PathBuf>,

    /// What a drain does with already-recorded scans: retain or discard.
    #[arg(long, global = true)]
    duplicate_policy: Option<DuplicatePolicy>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a scan, or queue it when offline.
    Scan(ScanArgs),
    /// Sync queued scans now.
    Drain,
    /// Inspect or edit the offline queue.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Show points, level, and achievements.
    Profile {
        /// Display name used when the account is created.
        #[arg(long)]
        name: Option<String>,
    },
    /// Sync on every reconnect; reads online/offline lines from stdin.
    Watch,
    /// Top users by points.
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Scan statistics and recent scans.
    Stats {
        /// Number of recent scans to show.
        #[arg(long, default_value_t = 10)]
        recent: usize,
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// List rewards and what they cost.
    Rewards,
    /// Spend points on a reward and get a voucher code.
    Redeem {
        /// Reward id, as shown by `rewards`.
        reward_id: String,
    },
    /// List or use vouchers.
    Vouchers {
        #[command(subcommand)]
        action: VoucherAction,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir().ok();
    let mut config = ecoscan_core::config::load_config(cwd.as_deref())?;
    if let Some(path) = cli.remote_db {
        config.storage.remote_db_path = Some(path);
    }
    if let Some(path) = cli.device_db {
        config.storage.device_db_path = Some(path);
    }
    if let Some(policy) = cli.duplicate_policy {
        config.queue.duplicate_policy = policy;
    }

    let default_filter = format!("ecoscan_client={0},ecoscan_core={0}", config.log_level);
    ecoscan_core::tracing_init::init_tracing(&default_filter, cli.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        user = %cli.user,
        online = !cli.offline,
        "Starting ecoscan"
    );

    let ctx = AppContext::open(config, !cli.offline).await?;
    let result = match cli.command {
        Commands::Scan(args) => scan_cmd::scan(&ctx, &cli.user, args).await,
        Commands::Drain => scan_cmd::drain(&ctx, &cli.user).await,
        Commands::Queue { action } => queue_cmd::run(action, &ctx.queue).await,
        Commands::Profile { name } => profile_cmd::run(&ctx, &cli.user, name.as_deref()).await,
        Commands::Watch => watch_cmd::run(&ctx, &cli.user).await,
        Commands::Leaderboard { limit } => stats_cmd::run_leaderboard(&ctx, &cli.user, limit).await,
        Commands::Stats { recent, json } => stats_cmd::run_stats(&ctx, &cli.user, recent, json).await,
        Commands::Rewards => rewards_cmd::run_rewards(&ctx, &cli.user).await,
        Commands::Redeem { reward_id } => rewards_cmd::run_redeem(&ctx, &cli.user, &reward_id).await,
        Commands::Vouchers { action } => rewards_cmd::run_vouchers(&ctx, &cli.user, action).await,
    };
    ctx.close().await;
    result
}
