//! Transactional assignment.
//!
//! The only stage that mutates shared state. Every assignment re-reads the
//! job and technician under row locks, so decisions made on an earlier
//! unlocked snapshot can never oversubscribe a technician or assign a job
//! twice:
//!
//! - **Single**: lock job, check it is still unassigned, lock technician,
//!   check capacity, then update job, increment count, insert audit record.
//! - **Batch**: lock all jobs, then all technicians (each sorted by id) in
//!   one pass each; drop pairs that no longer fit; apply the rest as bulk
//!   writes. An empty valid subset rolls back.
//!
//! Any error rolls back the whole transaction.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::error::{DispatchError, Result};
use crate::models::{Assignment, AssignmentRequest, JobStatus};
use crate::store::{DispatchStore, StoreTransaction};

/// Commits assignments against a [`DispatchStore`].
#[derive(Debug)]
pub struct AssignmentService<S> {
    store: Arc<S>,
}

impl<S> Clone for AssignmentService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DispatchStore> AssignmentService<S> {
    /// Creates a service over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Assigns one job to one technician.
    ///
    /// Conflicts discovered under lock are returned as
    /// [`DispatchError::JobAlreadyAssigned`] or
    /// [`DispatchError::TechnicianAtCapacity`]; nothing is written in that
    /// case.
    #[instrument(skip_all, fields(job.id = %job_id, technician.id = %technician_id, manual = is_manual_override))]
    pub async fn assign(
        &self,
        job_id: &str,
        technician_id: &str,
        assigned_by: &str,
        is_manual_override: bool,
        reason: Option<&str>,
    ) -> Result<Assignment> {
        let mut tx = self.store.begin().await?;
        let result = Self::assign_locked(
            &mut *tx,
            job_id,
            technician_id,
            assigned_by,
            is_manual_override,
            reason,
        )
        .await;

        match result {
            Ok(assignment) => {
                tx.commit().await?;
                info!(assignment.id = %assignment.id, "job assigned");
                Ok(assignment)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                debug!(error = %e, "assignment aborted");
                Err(e)
            }
        }
    }

    async fn assign_locked(
        tx: &mut dyn StoreTransaction,
        job_id: &str,
        technician_id: &str,
        assigned_by: &str,
        is_manual_override: bool,
        reason: Option<&str>,
    ) -> Result<Assignment> {
        let job = tx
            .lock_job(job_id)
            .await?
            .ok_or_else(|| DispatchError::JobNotFound(job_id.to_string()))?;

        if job.status == JobStatus::Assigned || job.assigned_technician_id.is_some() {
            return Err(DispatchError::JobAlreadyAssigned(job.id));
        }
        if !job.is_unassigned() {
            return Err(DispatchError::JobNotUnassigned {
                job_id: job.id,
                status: job.status.to_string(),
            });
        }

        let tech = tx
            .lock_technician(technician_id)
            .await?
            .ok_or_else(|| DispatchError::TechnicianNotFound(technician_id.to_string()))?;

        if tech.company_id != job.company_id {
            return Err(DispatchError::TenantMismatch {
                job_id: job.id,
                technician_id: tech.id,
            });
        }
        if !tech.has_capacity() {
            return Err(DispatchError::TechnicianAtCapacity {
                technician_id: tech.id,
                current: tech.current_job_count,
                max: tech.max_concurrent_jobs,
            });
        }

        let mut assignment = Assignment::for_job(&job, &tech.id, assigned_by, Utc::now());
        if is_manual_override {
            assignment = assignment.with_override(reason.map(str::to_string));
        }

        tx.mark_jobs_assigned(&[AssignmentRequest::new(&job.id, &tech.id)])
            .await?;
        tx.increment_job_counts(&[(tech.id.clone(), 1)]).await?;
        tx.insert_assignments(std::slice::from_ref(&assignment))
            .await?;
        Ok(assignment)
    }

    /// Assigns a batch of pairs in one transaction.
    ///
    /// Pairs that no longer fit (job gone or taken, technician missing,
    /// from another company, or out of capacity) are dropped; the rest
    /// commit together. Returns the committed assignments, possibly empty.
    /// A job listed twice keeps its first pair.
    #[instrument(skip_all, fields(pairs = requests.len(), assigned_by = %assigned_by))]
    pub async fn assign_many(
        &self,
        requests: &[AssignmentRequest],
        assigned_by: &str,
    ) -> Result<Vec<Assignment>> {
        let mut seen = HashSet::new();
        let requests: Vec<&AssignmentRequest> = requests
            .iter()
            .filter(|r| seen.insert(r.job_id.as_str()))
            .collect();
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.store.begin().await?;
        match Self::assign_many_locked(&mut *tx, &requests, assigned_by).await {
            Ok(assignments) if assignments.is_empty() => {
                tx.rollback().await?;
                info!("no valid pairs in batch");
                Ok(assignments)
            }
            Ok(assignments) => {
                tx.commit().await?;
                info!(committed = assignments.len(), "batch assigned");
                Ok(assignments)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn assign_many_locked(
        tx: &mut dyn StoreTransaction,
        requests: &[&AssignmentRequest],
        assigned_by: &str,
    ) -> Result<Vec<Assignment>> {
        let job_ids: Vec<String> = requests.iter().map(|r| r.job_id.clone()).collect();
        let technician_ids: Vec<String> = requests.iter().map(|r| r.technician_id.clone()).collect();

        // Jobs first, then technicians; the store sorts each set by id.
        let jobs: HashMap<String, _> = tx
            .lock_jobs(&job_ids)
            .await?
            .into_iter()
            .map(|j| (j.id.clone(), j))
            .collect();
        let technicians: HashMap<String, _> = tx
            .lock_technicians(&technician_ids)
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        let mut remaining: HashMap<&str, u32> = technicians
            .values()
            .map(|t| (t.id.as_str(), t.remaining_capacity()))
            .collect();

        let now = Utc::now();
        let mut accepted = Vec::new();
        let mut assignments = Vec::new();
        let mut increments: BTreeMap<String, u32> = BTreeMap::new();

        for request in requests {
            let Some(job) = jobs.get(&request.job_id) else {
                warn!(job.id = %request.job_id, "dropping pair: job not found");
                continue;
            };
            if !job.is_unassigned() || job.assigned_technician_id.is_some() {
                warn!(job.id = %job.id, status = %job.status, "dropping pair: job not unassigned");
                continue;
            }
            let Some(tech) = technicians.get(&request.technician_id) else {
                warn!(technician.id = %request.technician_id, "dropping pair: technician not found");
                continue;
            };
            if tech.company_id != job.company_id {
                warn!(job.id = %job.id, technician.id = %tech.id, "dropping pair: company mismatch");
                continue;
            }
            let Some(capacity) = remaining.get_mut(tech.id.as_str()).filter(|c| **c > 0) else {
                warn!(
                    technician.id = %tech.id,
                    current = tech.current_job_count,
                    max = tech.max_concurrent_jobs,
                    "dropping pair: technician at capacity"
                );
                continue;
            };

            *capacity -= 1;
            *increments.entry(tech.id.clone()).or_default() += 1;
            accepted.push((*request).clone());
            assignments.push(Assignment::for_job(job, &tech.id, assigned_by, now));
        }

        if assignments.is_empty() {
            return Ok(assignments);
        }

        let increments: Vec<(String, u32)> = increments.into_iter().collect();
        tx.mark_jobs_assigned(&accepted).await?;
        tx.increment_job_counts(&increments).await?;
        tx.insert_assignments(&assignments).await?;
        Ok(assignments)
    }
}
