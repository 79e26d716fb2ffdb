//! Dispatch pipeline: eligibility, scoring, emergency adjustment, ranking.
//!
//! Each stage is a small value built from [`DispatchConfig`](crate::config::DispatchConfig)
//! and usable on its own; [`Dispatcher`] runs them in order and optionally
//! commits the top pick.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use u_dispatch::config::DispatchConfig;
//! use u_dispatch::dispatching::Dispatcher;
//! use u_dispatch::models::{Job, Technician};
//! use u_dispatch::store::InMemoryStore;
//!
//! let dispatcher = Dispatcher::new(Arc::new(InMemoryStore::new()), DispatchConfig::default()).unwrap();
//!
//! let job = Job::new("J1", "acme")
//!     .with_location(33.749, -84.388)
//!     .with_required_skill("hvac")
//!     .with_minimum_skill_level(2);
//! let techs = vec![Technician::new("T1", "acme")
//!     .with_location(33.76, -84.39)
//!     .with_skill("hvac", 2)];
//!
//! let rec = dispatcher.recommend(&job, &techs).unwrap();
//! assert_eq!(rec.assigned_tech.as_deref(), Some("T1"));
//! ```
//!
//! # References
//!
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4

mod eligibility;
mod emergency;
mod orchestrator;
mod ranking;
mod scoring;

pub use eligibility::{EligibilityFilter, EligibilityReport, EligibleTechnician};
pub use emergency::EmergencyAdjuster;
pub use orchestrator::{DispatchOutcome, Dispatcher, Evaluation};
pub use ranking::{override_assignment, Ranker, TieBreakCriterion};
pub use scoring::{ScoreCalculator, StandardScorer};
