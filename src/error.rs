use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Technician not found: {0}")]
    TechnicianNotFound(String),

    #[error("Job {0} has no valid coordinates")]
    MissingCoordinates(String),

    #[error("Job {job_id} is {status}, expected unassigned")]
    JobNotUnassigned { job_id: String, status: String },

    #[error("Invalid job {job_id}: {}", .errors.join("; "))]
    InvalidJob { job_id: String, errors: Vec<String> },

    #[error("Job {0} was already assigned by another worker")]
    JobAlreadyAssigned(String),

    #[error("Technician {technician_id} is at capacity ({current}/{max})")]
    TechnicianAtCapacity {
        technician_id: String,
        current: u32,
        max: u32,
    },

    #[error("Technician {technician_id} does not belong to the company of job {job_id}")]
    TenantMismatch { job_id: String, technician_id: String },

    #[error("Timed out waiting for lock: {0}")]
    LockTimeout(String),

    #[error("Technician {technician_id} is not a candidate in this recommendation (valid: {})", .valid.join(", "))]
    InvalidOverride {
        technician_id: String,
        valid: Vec<String>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Distance provider error: {0}")]
    Distance(String),

    #[error("Store error: {0}")]
    Store(String),

    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl DispatchError {
    /// Lost a race against a concurrent assignment.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::JobAlreadyAssigned(_) | Self::TechnicianAtCapacity { .. } | Self::LockTimeout(_)
        )
    }

    /// The caller may re-run dispatch against the current state.
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }

    /// Bad input data that must be fixed upstream.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::JobNotFound(_)
                | Self::MissingCoordinates(_)
                | Self::JobNotUnassigned { .. }
                | Self::InvalidJob { .. }
                | Self::TenantMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
