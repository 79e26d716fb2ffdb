//! Eligibility verdicts.
//!
//! One [`EligibilityResult`] per technician and job. Rules short-circuit,
//! so at most one reason is ever recorded.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a technician was rejected for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum IneligibilityReason {
    /// Technician record is deactivated.
    Inactive,
    /// Technician reported themselves unavailable.
    NotAvailable,
    /// Concurrent job limit already reached.
    AtCapacity {
        /// Open jobs.
        current: u32,
        /// Limit.
        max: u32,
    },
    /// Missing or non-finite coordinates.
    NoValidLocation,
    /// Farther than the travel threshold in effect for this job.
    BeyondMaxTravel {
        /// Measured distance or travel time.
        distance: f64,
        /// Threshold in effect (halved for emergencies).
        threshold: f64,
    },
    /// Missing a required tag or below the minimum level for it.
    InsufficientSkill {
        /// First required tag that failed.
        tag: String,
        /// Minimum level demanded by the job.
        required: u8,
        /// Level held (0 if the tag is missing).
        actual: u8,
    },
}

impl fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::NotAvailable => write!(f, "not available"),
            Self::AtCapacity { current, max } => {
                write!(f, "max jobs reached ({current}/{max})")
            }
            Self::NoValidLocation => write!(f, "no valid location"),
            Self::BeyondMaxTravel {
                distance,
                threshold,
            } => write!(
                f,
                "beyond max travel ({distance:.1} > {threshold:.1})"
            ),
            Self::InsufficientSkill {
                tag,
                required,
                actual,
            } => write!(
                f,
                "insufficient skill: {tag} level {actual} < required {required}"
            ),
        }
    }
}

/// Per-technician eligibility verdict for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResult {
    /// Evaluated technician.
    pub technician_id: String,
    /// Whether every rule passed.
    pub eligible: bool,
    /// Failed rules in evaluation order (at most one, rules short-circuit).
    pub failed_rules: Vec<IneligibilityReason>,
    /// Distance measured during evaluation, when the distance rule ran.
    pub distance: Option<f64>,
}

impl EligibilityResult {
    /// A passing verdict.
    pub fn pass(technician_id: impl Into<String>, distance: f64) -> Self {
        Self {
            technician_id: technician_id.into(),
            eligible: true,
            failed_rules: Vec::new(),
            distance: Some(distance),
        }
    }

    /// A failing verdict with its single reason.
    pub fn fail(
        technician_id: impl Into<String>,
        reason: IneligibilityReason,
        distance: Option<f64>,
    ) -> Self {
        Self {
            technician_id: technician_id.into(),
            eligible: false,
            failed_rules: vec![reason],
            distance,
        }
    }

    /// The first failed rule, if any.
    pub fn first_failure(&self) -> Option<&IneligibilityReason> {
        self.failed_rules.first()
    }
}
