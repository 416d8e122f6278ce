//! Campus geofence.
//!
//! Scans are only accepted within a radius of the campus centre, measured
//! as great-circle distance (haversine).

use serde::{Deserialize, Serialize};

use crate::scan::GeoPoint;

/// Mean Earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Circular campus boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampusBoundary {
    pub latitude: f64,
    pub longitude: f64,
    /// Accepted radius around the centre, in metres.
    pub radius_m: f64,
}

impl Default for CampusBoundary {
    fn default() -> Self {
        Self {
            latitude: -26.1844,
            longitude: 28.0287,
            radius_m: 2000.0,
        }
    }
}

impl CampusBoundary {
    pub const fn centre(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Whether `point` lies inside the boundary (inclusive).
    pub fn contains(&self, point: GeoPoint) -> bool {
        distance_m(self.centre(), point) <= self.radius_m
    }
}

/// Great-circle distance between two points, in metres.
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}
