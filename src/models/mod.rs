//! Dispatch domain models.
//!
//! Provides the core data types flowing through the pipeline. Jobs and
//! technicians are inputs owned by other subsystems; the engine reads them
//! and only mutates them through the assignment step.
//!
//! # Domain Mappings
//!
//! | u-dispatch | HVAC / Plumbing | Utilities | Appliance Repair |
//! |------------|-----------------|-----------|------------------|
//! | Job | Service Call | Outage Ticket | Repair Visit |
//! | Technician | Field Tech | Line Crew | Service Engineer |
//! | Skill tag | Trade license | Voltage class | Brand certification |
//! | Recommendation | Dispatch board row | Crew suggestion | Route proposal |

mod assignment;
mod eligibility;
mod job;
mod location;
mod recommendation;
mod technician;

pub use assignment::{Assignment, AssignmentRequest};
pub use eligibility::{EligibilityResult, IneligibilityReason};
pub use job::{Job, JobPriority, JobStatus, JobType};
pub use location::Coordinates;
pub use recommendation::{CandidateScore, OverrideRecord, Recommendation, ScoreBreakdown};
pub use technician::{Technician, MAX_SKILL_LEVEL};
