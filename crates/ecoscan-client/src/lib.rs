//! `EcoScan` Client Library
//!
//! Scan recording with a once-per-barcode guarantee, a device-local offline
//! queue, and reconnect-driven sync, plus the leaderboard and reward
//! redemption built on the same store. Storage collaborators are traits with
//! in-memory and `SQLite` implementations.

pub mod connectivity;
pub mod context;
pub mod local;
pub mod pipeline;
pub mod profile_cmd;
pub mod queue;
pub mod queue_cmd;
pub mod recorder;
pub mod remote;
pub mod rewards;
pub mod rewards_cmd;
pub mod scan_cmd;
pub mod stats;
pub mod stats_cmd;
pub mod storage;
pub mod watch_cmd;
