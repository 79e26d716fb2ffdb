//! Technician model.
//!
//! Technicians are the dispatch candidates. The record is owned by the
//! employee-management side of the system; the dispatch engine reads it
//! during scoring and only mutates `current_job_count` inside the
//! transactional assignment step.
//!
//! Skill proficiency uses three levels: 1 = apprentice, 2 = journeyman,
//! 3 = master. A tag without a recorded level counts as level 0.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::Coordinates;

/// Highest proficiency level a technician can hold.
pub const MAX_SKILL_LEVEL: u8 = 3;

/// A dispatch candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technician {
    /// Unique technician identifier.
    pub id: String,
    /// Tenant partition.
    pub company_id: String,
    /// Display name.
    pub name: String,
    /// Last known position.
    pub location: Option<Coordinates>,
    /// Employed and dispatchable.
    pub is_active: bool,
    /// Self-reported availability.
    pub is_available: bool,
    /// Skill tags carried.
    pub skills: BTreeSet<String>,
    /// Proficiency per tag (partial; missing = level 0).
    pub skill_levels: HashMap<String, u8>,
    /// Concurrently open jobs.
    pub current_job_count: u32,
    /// Upper bound on concurrently open jobs.
    pub max_concurrent_jobs: u32,
    /// Completion rate over the recent window (0.0..=1.0).
    pub recent_completion_rate: f64,
    /// Number of jobs in the recent window.
    pub recent_job_count: u32,
    /// Jobs already scheduled today.
    pub daily_job_count: u32,
}

impl Technician {
    /// Creates an active, available technician with capacity for one job.
    pub fn new(id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            company_id: company_id.into(),
            name: String::new(),
            location: None,
            is_active: true,
            is_available: true,
            skills: BTreeSet::new(),
            skill_levels: HashMap::new(),
            current_job_count: 0,
            max_concurrent_jobs: 1,
            recent_completion_rate: 0.0,
            recent_job_count: 0,
            daily_job_count: 0,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the position.
    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        self.location = Some(Coordinates::new(lat, lng));
        self
    }

    /// Sets the active flag.
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// Sets the self-reported availability.
    pub fn with_available(mut self, available: bool) -> Self {
        self.is_available = available;
        self
    }

    /// Adds a skill tag with a proficiency level.
    pub fn with_skill(mut self, tag: impl Into<String>, level: u8) -> Self {
        let tag = tag.into();
        self.skill_levels
            .insert(tag.clone(), level.min(MAX_SKILL_LEVEL));
        self.skills.insert(tag);
        self
    }

    /// Adds a skill tag without recording a level.
    pub fn with_skill_tag(mut self, tag: impl Into<String>) -> Self {
        self.skills.insert(tag.into());
        self
    }

    /// Sets current and maximum concurrent jobs.
    pub fn with_jobs(mut self, current: u32, max: u32) -> Self {
        self.current_job_count = current;
        self.max_concurrent_jobs = max;
        self
    }

    /// Sets the recent completion history.
    pub fn with_performance(mut self, completion_rate: f64, job_count: u32) -> Self {
        self.recent_completion_rate = completion_rate.clamp(0.0, 1.0);
        self.recent_job_count = job_count;
        self
    }

    /// Sets the number of jobs scheduled today.
    pub fn with_daily_jobs(mut self, daily: u32) -> Self {
        self.daily_job_count = daily;
        self
    }

    /// Whether this technician carries a tag.
    pub fn has_skill(&self, tag: &str) -> bool {
        self.skills.contains(tag)
    }

    /// Proficiency for a tag; 0 when the tag or its level is missing.
    pub fn skill_level(&self, tag: &str) -> u8 {
        if !self.has_skill(tag) {
            return 0;
        }
        self.skill_levels.get(tag).copied().unwrap_or(0)
    }

    /// Whether another job fits under `max_concurrent_jobs`.
    #[inline]
    pub fn has_capacity(&self) -> bool {
        self.current_job_count < self.max_concurrent_jobs
    }

    /// Open slots left before reaching `max_concurrent_jobs`.
    pub fn remaining_capacity(&self) -> u32 {
        self.max_concurrent_jobs
            .saturating_sub(self.current_job_count)
    }

    /// Sum of recent completion samples (rate × sample size).
    pub fn completion_sum(&self) -> f64 {
        self.recent_completion_rate * f64::from(self.recent_job_count)
    }

    /// The technician location, if present and valid.
    pub fn valid_location(&self) -> Option<Coordinates> {
        super::location::valid_location(self.location)
    }
}
