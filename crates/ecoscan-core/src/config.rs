//! Configuration resolution for `EcoScan`.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/ecoscan/settings.json)
//! 3. Project config (.ecoscan/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::geo::CampusBoundary;

/// Complete `EcoScan` configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub campus: CampusBoundary,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            campus: CampusBoundary::default(),
            queue: QueueConfig::default(),
            recorder: RecorderConfig::default(),
            storage: StorageConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// What a drain does with an entry whose barcode was already recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the entry queued and count it as failed.
    #[default]
    Retain,
    /// Drop the entry; the item was already recycled through another path.
    Discard,
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "retain" => Ok(Self::Retain),
            "discard" => Ok(Self::Discard),
            other => Err(Error::Config(format!("Unknown duplicate policy: {other}"))),
        }
    }
}

/// Offline queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Key the serialized queue is stored under in device storage.
    pub storage_key: String,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            storage_key: "@ecoscan_scan_queue".to_string(),
            duplicate_policy: DuplicatePolicy::Retain,
        }
    }
}

/// Scan recorder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Attempts at a conditional account update before giving up.
    pub cas_retries: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self { cas_retries: 5 }
    }
}

/// Database locations. `None` falls back to the platform data directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub remote_db_path: Option<PathBuf>,
    pub device_db_path: Option<PathBuf>,
}

/// Load configuration with hierarchical resolution.
///
/// Files are merged key by key, so a file may set a single field of a
/// section and inherit the rest from the layers below it.
pub fn load_config(project_dir: Option<&Path>) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())?;

    let project_path = project_dir.map(|d| d.join(".ecoscan").join("settings.json"));
    for path in global_config_path().iter().chain(project_path.iter()) {
        if path.exists() {
            merge_json(&mut merged, read_config_file(path)?);
        }
    }

    let mut config: Config = serde_json::from_value(merged)?;
    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Base directory for `EcoScan` settings and databases.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ecoscan"))
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("settings.json"))
}

impl StorageConfig {
    /// Resolved path of the database standing in for the hosted store.
    pub fn remote_db(&self) -> Option<PathBuf> {
        self.remote_db_path
            .clone()
            .or_else(|| config_dir().map(|d| d.join("remote.db")))
    }

    /// Resolved path of the device-local database holding the queue.
    pub fn device_db(&self) -> Option<PathBuf> {
        self.device_db_path
            .clone()
            .or_else(|| config_dir().map(|d| d.join("device.db")))
    }
}

fn read_config_file(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Recursively merge `overlay` into `base`; objects merge, anything else replaces.
fn merge_json(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply `ECOSCAN_*` overrides read through `var`.
fn apply_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(val) = var("ECOSCAN_CAMPUS_RADIUS_M") {
        config.campus.radius_m = val
            .parse::<f64>()
            .ok()
            .filter(|r| r.is_finite() && *r > 0.0)
            .ok_or_else(|| Error::Config(format!("Invalid ECOSCAN_CAMPUS_RADIUS_M: {val}")))?;
    }
    if let Some(val) = var("ECOSCAN_DUPLICATE_POLICY") {
        config.queue.duplicate_policy = val.parse()?;
    }
    if let Some(val) = var("ECOSCAN_REMOTE_DB") {
        config.storage.remote_db_path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("ECOSCAN_DEVICE_DB") {
        config.storage.device_db_path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("ECOSCAN_LOG_LEVEL") {
        config.log_level = val;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_retains_duplicates() {
        let config = Config::default();
        assert_eq!(config.queue.duplicate_policy, DuplicatePolicy::Retain);
        assert_eq!(config.queue.storage_key, "@ecoscan_scan_queue");
    }

    #[test]
    fn default_campus_radius_is_2km() {
        let config = Config::default();
        assert!((config.campus.radius_m - 2000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"queue":{"storage_key":"k","duplicate_policy":"discard"}}"#)
                .unwrap();
        assert_eq!(config.queue.duplicate_policy, DuplicatePolicy::Discard);
        assert_eq!(config.recorder.cas_retries, 5);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn project_config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = dir.path().join(".ecoscan");
        std::fs::create_dir_all(&settings).unwrap();
        std::fs::write(
            settings.join("settings.json"),
            r#"{"recorder":{"cas_retries":9},"storage":{"device_db_path":"/tmp/d.db"}}"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config.recorder.cas_retries, 9);
        assert_eq!(
            config.storage.device_db(),
            Some(PathBuf::from("/tmp/d.db"))
        );
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!("sometimes".parse::<DuplicatePolicy>().is_err());
    }

    #[test]
    fn section_accepts_a_single_key() {
        let config: Config =
            serde_json::from_str(r#"{"queue":{"duplicate_policy":"discard"},"campus":{"radius_m":500.0}}"#)
                .unwrap();
        assert_eq!(config.queue.duplicate_policy, DuplicatePolicy::Discard);
        assert_eq!(config.queue.storage_key, "@ecoscan_scan_queue");
        assert!((config.campus.radius_m - 500.0).abs() < f64::EPSILON);
        assert!((config.campus.latitude - CampusBoundary::default().latitude).abs() < f64::EPSILON);
        let empty: Config = serde_json::from_str(r#"{"recorder":{}}"#).unwrap();
        assert_eq!(empty.recorder.cas_retries, 5);
    }

    #[test]
    fn layers_merge_per_key() {
        let mut merged = serde_json::to_value(Config::default()).unwrap();
        merge_json(&mut merged, serde_json::json!({"recorder": {"cas_retries": 7}}));
        merge_json(&mut merged, serde_json::json!({"queue": {"duplicate_policy": "discard"}}));
        let config: Config = serde_json::from_value(merged).unwrap();
        assert_eq!(config.recorder.cas_retries, 7);
        assert_eq!(config.queue.duplicate_policy, DuplicatePolicy::Discard);
        assert_eq!(config.queue.storage_key, "@ecoscan_scan_queue");
    }

    #[test]
    fn env_overrides_apply_and_reject_bad_values() {
        let mut config = Config::default();
        apply_overrides(&mut config, |k| {
            (k == "ECOSCAN_CAMPUS_RADIUS_M").then(|| "750".to_string())
        })
        .unwrap();
        assert!((config.campus.radius_m - 750.0).abs() < f64::EPSILON);

        for bad in ["wide", "-5", "NaN"] {
            let err = apply_overrides(&mut config, |k| {
                (k == "ECOSCAN_CAMPUS_RADIUS_M").then(|| bad.to_string())
            });
            assert!(matches!(err, Err(Error::Config(_))), "{bad} accepted");
        }
        assert!(
            apply_overrides(&mut config, |k| {
                (k == "ECOSCAN_DUPLICATE_POLICY").then(|| "sometimes".to_string())
            })
            .is_err()
        );
    }
}
