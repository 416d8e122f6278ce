//! Scan domain types shared by the recorder, the offline queue and the CLI.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Points needed to advance one level.
pub const POINTS_PER_LEVEL: u64 = 100;

/// Level reached with a cumulative point total.
pub const fn level_for_points(points: u64) -> u64 {
    points / POINTS_PER_LEVEL + 1
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Recyclable material categories and their point values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Plastic,
    Glass,
    Aluminum,
    Paper,
}

impl Material {
    pub const ALL: [Self; 4] = [Self::Plastic, Self::Glass, Self::Aluminum, Self::Paper];

    /// Display name stored as `materialType` on scan records.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Plastic => "Plastic Bottle",
            Self::Glass => "Glass Bottle",
            Self::Aluminum => "Aluminum Can",
            Self::Paper => "Paper/Cardboard",
        }
    }

    pub const fn points(self) -> u64 {
        match self {
            Self::Plastic => 5,
            Self::Glass => 10,
            Self::Aluminum => 7,
            Self::Paper => 3,
        }
    }
}

impl std::str::FromStr for Material {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "plastic" => Ok(Self::Plastic),
            "glass" => Ok(Self::Glass),
            "aluminum" | "aluminium" => Ok(Self::Aluminum),
            "paper" | "cardboard" => Ok(Self::Paper),
            other => Err(Error::InvalidScan(format!("unknown material: {other}"))),
        }
    }
}

/// A single item scan as captured by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanInput {
    pub barcode: String,
    pub material_type: String,
    pub points: u64,
    pub location: GeoPoint,
}

impl ScanInput {
    /// Build a scan for a catalog material.
    pub fn for_material(barcode: impl Into<String>, material: Material, location: GeoPoint) -> Self {
        Self {
            barcode: barcode.into(),
            material_type: material.display_name().to_string(),
            points: material.points(),
            location,
        }
    }

    /// Check the fields a scan must carry before it touches any store.
    pub fn validate(&self) -> Result<()> {
        if self.barcode.trim().is_empty() {
            return Err(Error::InvalidScan("barcode is empty".into()));
        }
        // Barcodes become path segments in the remote store.
        if self.barcode.contains('/') {
            return Err(Error::InvalidScan(format!(
                "barcode must not contain '/': {}",
                self.barcode
            )));
        }
        if self.points == 0 {
            return Err(Error::InvalidScan("points must be positive".into()));
        }
        Ok(())
    }
}
