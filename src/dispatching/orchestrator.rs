//! Dispatch orchestration.
//!
//! [`Dispatcher`] wires the pipeline stages together:
//!
//! ```text
//! Job + pool → EligibilityFilter → ScoreCalculator (+ EmergencyAdjuster) → Ranker → Recommendation
//!                                                                                    ↓ (auto-assign)
//!                                                                           AssignmentService
//! ```
//!
//! Everything up to the recommendation is pure and can run concurrently
//! for any number of jobs. Only the optional assignment touches the store
//! under locks. A failed auto-assignment is returned to the caller; the
//! next-ranked candidate is never tried automatically.

use std::borrow::Cow;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::eligibility::EligibilityFilter;
use super::emergency::EmergencyAdjuster;
use super::ranking::{override_assignment, Ranker};
use super::scoring::{ScoreCalculator, StandardScorer};
use crate::assignment::AssignmentService;
use crate::config::DispatchConfig;
use crate::distance::{DistanceMethod, DistanceProvider};
use crate::error::{DispatchError, Result};
use crate::models::{Assignment, EligibilityResult, Job, Recommendation, Technician};
use crate::store::DispatchStore;
use crate::validation::{validate_job, validate_technicians};

/// Pipeline output for one job, before any assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Ranked recommendation.
    pub recommendation: Recommendation,
    /// Technicians rejected by the eligibility rules, with reasons.
    pub ineligible: Vec<EligibilityResult>,
}

/// Result of a store-backed dispatch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Ranked recommendation (with an override record for manual picks).
    pub recommendation: Recommendation,
    /// Technicians rejected by the eligibility rules, with reasons.
    pub ineligible: Vec<EligibilityResult>,
    /// Committed assignment, if one was made.
    pub assignment: Option<Assignment>,
}

/// Dispatch engine bound to a store.
#[derive(Debug)]
pub struct Dispatcher<S> {
    config: DispatchConfig,
    filter: EligibilityFilter,
    scorer: Arc<dyn ScoreCalculator>,
    adjuster: EmergencyAdjuster,
    ranker: Ranker,
    distance: Arc<dyn DistanceProvider>,
    assignments: AssignmentService<S>,
}

impl<S: DispatchStore> Dispatcher<S> {
    /// Creates a dispatcher with great-circle distances and the standard scorer.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(store: Arc<S>, config: DispatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: EligibilityFilter::new(&config),
            scorer: Arc::new(StandardScorer::new(&config)),
            adjuster: EmergencyAdjuster::new(&config),
            ranker: Ranker::new(&config),
            distance: Arc::new(DistanceMethod::GreatCircle),
            assignments: AssignmentService::new(store),
            config,
        })
    }

    /// Replaces the distance provider.
    pub fn with_distance_provider(mut self, provider: Arc<dyn DistanceProvider>) -> Self {
        self.distance = provider;
        self
    }

    /// Replaces the score calculator.
    pub fn with_scorer(mut self, scorer: Arc<dyn ScoreCalculator>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Assignment service sharing this dispatcher's store.
    pub fn assignments(&self) -> &AssignmentService<S> {
        &self.assignments
    }

    /// Runs eligibility, scoring and ranking for a job. No store access.
    pub fn recommend(&self, job: &Job, technicians: &[Technician]) -> Result<Recommendation> {
        Ok(self.evaluate(job, technicians)?.recommendation)
    }

    /// Like [`recommend`](Self::recommend), also returning the rejections.
    pub fn evaluate(&self, job: &Job, technicians: &[Technician]) -> Result<Evaluation> {
        self.evaluate_with(job, technicians, self.distance.as_ref())
    }

    /// Evaluates with a one-off distance provider (e.g. drive times fetched for this job).
    pub fn evaluate_with(
        &self,
        job: &Job,
        technicians: &[Technician],
        provider: &dyn DistanceProvider,
    ) -> Result<Evaluation> {
        Self::check_job(job)?;
        if let Err(findings) = validate_technicians(technicians) {
            for finding in findings {
                warn!(job.id = %job.id, kind = ?finding.kind, "{}", finding.message);
            }
        }

        // Pools from the store are already scoped; only copy when they are not.
        let pool: Cow<'_, [Technician]> =
            if technicians.iter().all(|t| t.company_id == job.company_id) {
                Cow::Borrowed(technicians)
            } else {
                Cow::Owned(
                    technicians
                        .iter()
                        .filter(|t| t.company_id == job.company_id)
                        .cloned()
                        .collect(),
                )
            };

        let report = self.filter.filter(job, &pool, provider)?;
        let scores = report
            .eligible
            .iter()
            .map(|e| {
                let mut candidate = self.scorer.candidate(e.technician, job, e.distance);
                self.adjuster.apply(job, &mut candidate);
                debug!(
                    technician.id = %candidate.technician_id,
                    total = candidate.total_score(),
                    distance = candidate.distance(),
                    scorer = self.scorer.name(),
                    "candidate scored"
                );
                candidate
            })
            .collect();

        let recommendation = self
            .ranker
            .build_recommendation(job.id.clone(), scores, job.is_emergency());
        if recommendation.requires_manual_dispatch {
            info!(job.id = %job.id, pool = pool.len(), "no eligible technician, manual dispatch required");
        }

        Ok(Evaluation {
            recommendation,
            ineligible: report.ineligible,
        })
    }

    /// Loads a job and its pool, recommends, and auto-assigns if enabled.
    ///
    /// Assignment conflicts are returned as errors; the caller decides
    /// whether to dispatch again.
    #[instrument(skip(self), fields(job.id = %job_id))]
    pub async fn dispatch_job(&self, job_id: &str) -> Result<DispatchOutcome> {
        let (job, technicians) = self.load_unassigned(job_id).await?;
        let Evaluation {
            recommendation,
            ineligible,
        } = self.evaluate(&job, &technicians)?;

        let assignment = match &recommendation.assigned_tech {
            Some(technician_id) if self.config.auto_assign => Some(
                self.assignments
                    .assign(&job.id, technician_id, &self.config.system_actor, false, None)
                    .await?,
            ),
            _ => None,
        };

        Ok(DispatchOutcome {
            recommendation,
            ineligible,
            assignment,
        })
    }

    /// Dispatches several jobs concurrently; results are in input order.
    pub async fn dispatch_jobs(&self, job_ids: &[String]) -> Vec<Result<DispatchOutcome>> {
        join_all(job_ids.iter().map(|id| self.dispatch_job(id))).await
    }

    /// Assigns a job to a technician chosen by a human.
    ///
    /// The technician must be among the recommendation's candidates. When
    /// the choice differs from the engine's pick the assignment is flagged
    /// as a manual override and the returned recommendation carries the
    /// override record.
    #[instrument(skip(self, reason), fields(job.id = %job_id, technician.id = %technician_id))]
    pub async fn manual_assign(
        &self,
        job_id: &str,
        technician_id: &str,
        reason: &str,
        assigned_by: &str,
    ) -> Result<DispatchOutcome> {
        let (job, technicians) = self.load_unassigned(job_id).await?;
        let evaluation = self.evaluate(&job, &technicians)?;

        let is_override = evaluation.recommendation.assigned_tech.as_deref() != Some(technician_id);
        let recommendation = if is_override {
            override_assignment(&evaluation.recommendation, technician_id, reason, assigned_by)?
        } else {
            evaluation.recommendation
        };

        let assignment = self
            .assignments
            .assign(&job.id, technician_id, assigned_by, is_override, Some(reason))
            .await?;

        Ok(DispatchOutcome {
            recommendation,
            ineligible: evaluation.ineligible,
            assignment: Some(assignment),
        })
    }

    async fn load_unassigned(&self, job_id: &str) -> Result<(Job, Vec<Technician>)> {
        let store = self.assignments.store();
        let job = store
            .load_job(job_id)
            .await?
            .ok_or_else(|| DispatchError::JobNotFound(job_id.to_string()))?;
        if !job.is_unassigned() {
            return Err(DispatchError::JobNotUnassigned {
                job_id: job.id,
                status: job.status.to_string(),
            });
        }
        let technicians = store.load_technicians(&job.company_id).await?;
        Ok((job, technicians))
    }

    fn check_job(job: &Job) -> Result<()> {
        if job.valid_location().is_none() {
            return Err(DispatchError::MissingCoordinates(job.id.clone()));
        }
        validate_job(job).map_err(|errors| DispatchError::InvalidJob {
            job_id: job.id.clone(),
            errors: errors.into_iter().map(|e| e.message).collect(),
        })
    }
}
