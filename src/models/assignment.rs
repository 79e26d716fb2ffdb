//! Assignment (durable outcome) model.
//!
//! An assignment is the audit record written in the same transaction that
//! moves a job to `assigned` and increments the technician's open-job
//! count. It snapshots the job's priority and type for analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Job, JobPriority, JobType};

/// A committed job-technician assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    /// Audit record identifier.
    pub id: Uuid,
    /// Assigned job.
    pub job_id: String,
    /// Technician holding the job.
    pub technician_id: String,
    /// Tenant partition (copied from the job).
    pub company_id: String,
    /// Commit time.
    pub assigned_at: DateTime<Utc>,
    /// User or system component that requested the assignment.
    pub assigned_by: String,
    /// Whether a human chose a technician other than the engine's pick.
    pub is_manual_override: bool,
    /// Justification for a manual override.
    pub override_reason: Option<String>,
    /// Job priority at assignment time.
    pub job_priority: JobPriority,
    /// Job type at assignment time.
    pub job_type: JobType,
}

/// One requested job-technician pair for a batch assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentRequest {
    /// Job to assign.
    pub job_id: String,
    /// Technician to receive it.
    pub technician_id: String,
}

impl AssignmentRequest {
    /// Creates a pair.
    pub fn new(job_id: impl Into<String>, technician_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            technician_id: technician_id.into(),
        }
    }
}

impl Assignment {
    /// Creates an engine-driven assignment for a job as read under lock.
    pub fn for_job(
        job: &Job,
        technician_id: impl Into<String>,
        assigned_by: impl Into<String>,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job.id.clone(),
            technician_id: technician_id.into(),
            company_id: job.company_id.clone(),
            assigned_at,
            assigned_by: assigned_by.into(),
            is_manual_override: false,
            override_reason: None,
            job_priority: job.priority,
            job_type: job.job_type,
        }
    }

    /// Marks the assignment as a manual override.
    pub fn with_override(mut self, reason: Option<String>) -> Self {
        self.is_manual_override = true;
        self.override_reason = reason;
        self
    }
}
