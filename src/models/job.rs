//! Job model.
//!
//! A job is a field-service call (installation, repair, maintenance) that
//! needs a technician. Jobs are created by the booking flow in
//! [`JobStatus::Unassigned`] and only move to [`JobStatus::Assigned`]
//! through the transactional assignment step. Scoring never mutates a job.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::Coordinates;

/// A unit of work requiring dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub id: String,
    /// Tenant partition. Only technicians of the same company are considered.
    pub company_id: String,
    /// Service location. Required before dispatch may run.
    pub location: Option<Coordinates>,
    /// Dispatch priority.
    pub priority: JobPriority,
    /// Kind of work (snapshotted onto the assignment for analytics).
    pub job_type: JobType,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Skill tags a technician must carry.
    pub required_skills: BTreeSet<String>,
    /// Minimum proficiency (1..=3) required for every tag in `required_skills`.
    pub minimum_skill_level: u8,
    /// Technician holding the job once assigned.
    pub assigned_technician_id: Option<String>,
}

/// Dispatch priority of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    /// Regular scheduling.
    #[default]
    Normal,
    /// Highest priority: tighter travel limit and proximity-weighted scoring.
    Emergency,
}

/// Classification of the work to be performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// New equipment installation.
    Installation,
    /// Corrective repair call.
    #[default]
    Repair,
    /// Scheduled maintenance visit.
    Maintenance,
    /// Inspection or estimate visit.
    Inspection,
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a technician.
    #[default]
    Unassigned,
    /// Held by a technician.
    Assigned,
    /// Work has started on site.
    InProgress,
    /// Work finished.
    Completed,
    /// Cancelled by the customer or office.
    Cancelled,
}

impl JobStatus {
    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unassigned => "unassigned",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses the lowercase name produced by [`JobStatus::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unassigned" => Some(Self::Unassigned),
            "assigned" => Some(Self::Assigned),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JobPriority {
    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Emergency => "emergency",
        }
    }

    /// Parses the lowercase name produced by [`JobPriority::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(Self::Normal),
            "emergency" => Some(Self::Emergency),
            _ => None,
        }
    }
}

impl JobType {
    /// Stable lowercase name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installation => "installation",
            Self::Repair => "repair",
            Self::Maintenance => "maintenance",
            Self::Inspection => "inspection",
        }
    }

    /// Parses the lowercase name produced by [`JobType::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "installation" => Some(Self::Installation),
            "repair" => Some(Self::Repair),
            "maintenance" => Some(Self::Maintenance),
            "inspection" => Some(Self::Inspection),
            _ => None,
        }
    }
}

impl Job {
    /// Creates an unassigned, normal-priority job with no location yet.
    pub fn new(id: impl Into<String>, company_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            company_id: company_id.into(),
            location: None,
            priority: JobPriority::Normal,
            job_type: JobType::Repair,
            status: JobStatus::Unassigned,
            required_skills: BTreeSet::new(),
            minimum_skill_level: 1,
            assigned_technician_id: None,
        }
    }

    /// Sets the service location.
    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        self.location = Some(Coordinates::new(lat, lng));
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Marks the job as an emergency.
    pub fn emergency(self) -> Self {
        self.with_priority(JobPriority::Emergency)
    }

    /// Sets the job type.
    pub fn with_job_type(mut self, job_type: JobType) -> Self {
        self.job_type = job_type;
        self
    }

    /// Sets the lifecycle status.
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    /// Adds a required skill tag.
    pub fn with_required_skill(mut self, tag: impl Into<String>) -> Self {
        self.required_skills.insert(tag.into());
        self
    }

    /// Sets the minimum skill level.
    pub fn with_minimum_skill_level(mut self, level: u8) -> Self {
        self.minimum_skill_level = level;
        self
    }

    /// Whether the job is an emergency call.
    #[inline]
    pub fn is_emergency(&self) -> bool {
        self.priority == JobPriority::Emergency
    }

    /// Whether the job can still be dispatched.
    #[inline]
    pub fn is_unassigned(&self) -> bool {
        self.status == JobStatus::Unassigned
    }

    /// The job location, if present and valid.
    pub fn valid_location(&self) -> Option<Coordinates> {
        super::location::valid_location(self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_builder() {
        let job = Job::new("J1", "C1")
            .with_location(33.7, -84.4)
            .with_job_type(JobType::Installation)
            .with_required_skill("hvac")
            .with_required_skill("electrical")
            .with_minimum_skill_level(2)
            .emergency();

        assert_eq!(job.id, "J1");
        assert_eq!(job.company_id, "C1");
        assert!(job.is_emergency());
        assert!(job.is_unassigned());
        assert_eq!(job.required_skills.len(), 2);
        assert_eq!(job.minimum_skill_level, 2);
        assert_eq!(job.job_type, JobType::Installation);
        assert!(job.valid_location().is_some());
    }

    #[test]
    fn test_job_without_location() {
        let job = Job::new("J1", "C1");
        assert!(job.valid_location().is_none());

        let bad = Job::new("J2", "C1").with_location(f64::NAN, 0.0);
        assert!(bad.valid_location().is_none());
    }

    #[test]
    fn test_status_names_roundtrip() {
        for status in [
            JobStatus::Unassigned,
            JobStatus::Assigned,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("bogus"), None);
        assert_eq!(JobPriority::parse("emergency"), Some(JobPriority::Emergency));
        assert_eq!(JobType::parse("maintenance"), Some(JobType::Maintenance));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let priority: JobPriority = serde_json::from_str("\"emergency\"").unwrap();
        assert_eq!(priority, JobPriority::Emergency);
    }
}
