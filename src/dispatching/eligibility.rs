//! Hard eligibility rules.
//!
//! Rules run in a fixed order and stop at the first failure, so each
//! rejected technician carries exactly one reason:
//!
//! 1. active
//! 2. available
//! 3. below the concurrent job limit
//! 4. valid location
//! 5. within the travel threshold (halved for emergencies)
//! 6. every required skill at or above the job's minimum level
//!
//! Distances for the technicians that survive rules 1-4 are fetched in a
//! single batch call to the distance provider and handed on to scoring. A
//! provider answer that is not a finite, non-negative number fails rule 4.

use tracing::debug;

use crate::config::DispatchConfig;
use crate::distance::DistanceProvider;
use crate::error::{DispatchError, Result};
use crate::models::{EligibilityResult, IneligibilityReason, Job, Technician};

/// A technician that passed every rule, with the distance measured for it.
#[derive(Debug, Clone, Copy)]
pub struct EligibleTechnician<'a> {
    /// The technician record.
    pub technician: &'a Technician,
    /// Distance or travel time to the job.
    pub distance: f64,
}

/// Outcome of filtering one pool against one job.
#[derive(Debug, Clone, Default)]
pub struct EligibilityReport<'a> {
    /// Technicians that passed, in pool order.
    pub eligible: Vec<EligibleTechnician<'a>>,
    /// Rejections, in pool order.
    pub ineligible: Vec<EligibilityResult>,
}

impl EligibilityReport<'_> {
    /// Verdicts for every technician (passes first, then rejections).
    pub fn results(&self) -> Vec<EligibilityResult> {
        self.eligible
            .iter()
            .map(|e| EligibilityResult::pass(e.technician.id.clone(), e.distance))
            .chain(self.ineligible.iter().cloned())
            .collect()
    }
}

/// Applies the hard pass/fail rules.
#[derive(Debug, Clone)]
pub struct EligibilityFilter {
    max_travel: f64,
    emergency_travel_factor: f64,
}

impl EligibilityFilter {
    /// Creates a filter from the dispatch configuration.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            max_travel: config.distance.max_travel,
            emergency_travel_factor: config.emergency.travel_factor,
        }
    }

    /// Travel threshold in effect for a job.
    pub fn travel_threshold(&self, job: &Job) -> f64 {
        if job.is_emergency() {
            self.max_travel * self.emergency_travel_factor
        } else {
            self.max_travel
        }
    }

    /// Splits a pool into eligible and ineligible technicians.
    ///
    /// Fails fast if the job has no valid coordinates.
    pub fn filter<'a>(
        &self,
        job: &Job,
        technicians: &'a [Technician],
        provider: &dyn DistanceProvider,
    ) -> Result<EligibilityReport<'a>> {
        let job_location = job
            .valid_location()
            .ok_or_else(|| DispatchError::MissingCoordinates(job.id.clone()))?;

        let mut report = EligibilityReport::default();
        let mut located = Vec::new();

        for tech in technicians {
            match Self::check_status(tech) {
                Some(reason) => {
                    debug!(technician.id = %tech.id, %reason, "technician ineligible");
                    report
                        .ineligible
                        .push(EligibilityResult::fail(tech.id.clone(), reason, None));
                }
                None => located.push(tech),
            }
        }

        let distances = provider.distances(job_location, &located)?;
        let threshold = self.travel_threshold(job);

        for (tech, distance) in located.into_iter().zip(distances) {
            // NaN, infinite and negative measurements count as no distance at all.
            let distance = distance.filter(|d| d.is_finite() && *d >= 0.0);
            let verdict = match distance {
                None => Err(IneligibilityReason::NoValidLocation),
                Some(d) if d > threshold => Err(IneligibilityReason::BeyondMaxTravel {
                    distance: d,
                    threshold,
                }),
                Some(d) => Self::check_skills(tech, job).map_or(Ok(d), Err),
            };

            match verdict {
                Ok(d) => report.eligible.push(EligibleTechnician {
                    technician: tech,
                    distance: d,
                }),
                Err(reason) => {
                    debug!(technician.id = %tech.id, %reason, "technician ineligible");
                    report
                        .ineligible
                        .push(EligibilityResult::fail(tech.id.clone(), reason, distance));
                }
            }
        }

        Ok(report)
    }

    /// Rules 1-4: everything decidable without a distance.
    fn check_status(tech: &Technician) -> Option<IneligibilityReason> {
        if !tech.is_active {
            return Some(IneligibilityReason::Inactive);
        }
        if !tech.is_available {
            return Some(IneligibilityReason::NotAvailable);
        }
        if !tech.has_capacity() {
            return Some(IneligibilityReason::AtCapacity {
                current: tech.current_job_count,
                max: tech.max_concurrent_jobs,
            });
        }
        if tech.valid_location().is_none() {
            return Some(IneligibilityReason::NoValidLocation);
        }
        None
    }

    /// Rule 6. Tags are checked in sorted order; the first shortfall is reported.
    fn check_skills(tech: &Technician, job: &Job) -> Option<IneligibilityReason> {
        job.required_skills.iter().find_map(|tag| {
            let actual = tech.skill_level(tag);
            (actual < job.minimum_skill_level).then(|| IneligibilityReason::InsufficientSkill {
                tag: tag.clone(),
                required: job.minimum_skill_level,
                actual,
            })
        })
    }
}
