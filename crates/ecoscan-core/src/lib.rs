//! `EcoScan` Core Library
//!
//! Shared functionality for `EcoScan` components:
//! - Scan domain types (materials, locations, level formula)
//! - Campus geofence checks
//! - Configuration resolution and hierarchy
//! - `SQLite` pool helpers
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod scan;
pub mod tracing_init;

pub use config::Config;
pub use error::{Error, Result};
pub use geo::CampusBoundary;
pub use scan::{GeoPoint, Material, ScanInput, level_for_points};
