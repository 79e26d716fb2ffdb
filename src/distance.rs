//! Distance and travel-time providers.
//!
//! The pipeline only needs one number per technician that is comparable
//! across candidates for the same job. Providers are pluggable:
//!
//! - [`DistanceMethod::GreatCircle`]: haversine distance in statute miles.
//! - [`DistanceMethod::Euclidean`]: planar distance in coordinate units.
//! - [`DriveTimeTable`]: travel times computed elsewhere (e.g. a routing
//!   service) and injected per technician.
//!
//! # Reference
//! Sinnott (1984), "Virtues of the Haversine", Sky and Telescope 68(2)

use std::collections::HashMap;
use std::fmt::Debug;

use crate::error::{DispatchError, Result};
use crate::models::{Coordinates, Technician};

/// Mean earth radius in statute miles.
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Converts a job/technician pair into a comparable distance value.
pub trait DistanceProvider: Send + Sync + Debug {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Distance from `technician` (located at `from`) to a job at `to`.
    fn distance(&self, technician: &Technician, from: Coordinates, to: Coordinates)
        -> Result<f64>;

    /// Distances for a whole pool, in input order.
    ///
    /// Technicians without a valid location yield `None`.
    fn distances(
        &self,
        job_location: Coordinates,
        technicians: &[&Technician],
    ) -> Result<Vec<Option<f64>>> {
        technicians
            .iter()
            .map(|t| match t.valid_location() {
                Some(from) => self.distance(t, from, job_location).map(Some),
                None => Ok(None),
            })
            .collect()
    }
}

/// Built-in coordinate-only distance functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMethod {
    /// Haversine great-circle distance, statute miles.
    #[default]
    GreatCircle,
    /// Straight-line distance in degree space.
    Euclidean,
}

impl DistanceProvider for DistanceMethod {
    fn name(&self) -> &'static str {
        match self {
            Self::GreatCircle => "great_circle",
            Self::Euclidean => "euclidean",
        }
    }

    fn distance(&self, _technician: &Technician, from: Coordinates, to: Coordinates) -> Result<f64> {
        Ok(match self {
            Self::GreatCircle => haversine_miles(from, to),
            Self::Euclidean => euclidean(from, to),
        })
    }
}

/// Great-circle distance between two points in statute miles.
pub fn haversine_miles(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Planar distance between two points in coordinate units.
pub fn euclidean(a: Coordinates, b: Coordinates) -> f64 {
    ((b.lat - a.lat).powi(2) + (b.lng - a.lng).powi(2)).sqrt()
}

/// Precomputed travel times keyed by technician id.
///
/// Values come from an external routing service; any unit works as long
/// as the dispatch thresholds use the same one.
#[derive(Debug, Clone, Default)]
pub struct DriveTimeTable {
    times: HashMap<String, f64>,
}

impl DriveTimeTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a travel time for a technician.
    pub fn with_time(mut self, technician_id: impl Into<String>, time: f64) -> Self {
        self.times.insert(technician_id.into(), time);
        self
    }

    /// Records a travel time for a technician.
    pub fn insert(&mut self, technician_id: impl Into<String>, time: f64) {
        self.times.insert(technician_id.into(), time);
    }

    /// Number of recorded technicians.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

impl DistanceProvider for DriveTimeTable {
    fn name(&self) -> &'static str {
        "drive_time_table"
    }

    fn distance(&self, technician: &Technician, _from: Coordinates, _to: Coordinates) -> Result<f64> {
        match self.times.get(&technician.id) {
            Some(time) if time.is_finite() && *time >= 0.0 => Ok(*time),
            Some(time) => Err(DispatchError::Distance(format!(
                "invalid drive time {time} for technician {}",
                technician.id
            ))),
            None => Err(DispatchError::Distance(format!(
                "no drive time for technician {}",
                technician.id
            ))),
        }
    }
}
