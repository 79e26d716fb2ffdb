//! Field-service dispatch engine.
//!
//! Picks the best technician for a job and commits the assignment without
//! ever double-booking a job or oversubscribing a technician.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Job`, `Technician`, `Recommendation`,
//!   `ScoreBreakdown`, `Assignment`
//! - **`config`**: `DispatchConfig`, the immutable policy value (weights, thresholds, tie-breaks)
//! - **`distance`**: Pluggable distance / drive-time providers
//! - **`dispatching`**: Eligibility filter, scorer, emergency adjuster, ranker, and the `Dispatcher`
//! - **`assignment`**: Transactional single and batch assignment
//! - **`store`**: Store traits with in-memory and PostgreSQL (`postgres` feature) backends
//! - **`validation`**: Input integrity checks (coordinates, skill levels, duplicate IDs)
//! - **`kpi`**: Summary metrics over recommendations
//!
//! # Architecture
//!
//! Eligibility, scoring and ranking are pure functions of their inputs and
//! may run concurrently for any number of jobs. Assignment is the only
//! stage touching shared state; it re-checks every decision under row
//! locks taken in a fixed order (jobs, then technicians, each by id).
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

pub mod assignment;
pub mod config;
pub mod dispatching;
pub mod distance;
pub mod error;
pub mod kpi;
pub mod models;
pub mod store;
pub mod validation;

pub use error::{DispatchError, Result};
