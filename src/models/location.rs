//! Geographic coordinates.
//!
//! Jobs and technicians are located by latitude/longitude in decimal
//! degrees (WGS-84). The dispatch pipeline only needs a numeric distance
//! per technician, so this type is deliberately small.

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude (-90.0..=90.0).
    pub lat: f64,
    /// Longitude (-180.0..=180.0).
    pub lng: f64,
}

impl Coordinates {
    /// Creates a coordinate pair.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether both components are finite and within the WGS-84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Returns the coordinates only when present and valid.
pub(crate) fn valid_location(location: Option<Coordinates>) -> Option<Coordinates> {
    location.filter(Coordinates::is_valid)
}
