//! In-process store with row-level locking.
//!
//! Each job and technician id has its own async mutex. A transaction
//! acquires row mutexes as it reads and works on private copies of the
//! locked rows. On commit only the engine-owned fields it changed (job
//! status and assignee, technician job count) are applied to the current
//! committed rows, in one step. Waits are bounded by the store's lock
//! timeout and surface as [`DispatchError::LockTimeout`].
//!
//! Row mutexes are created on first lock and dropped again once no
//! transaction holds or awaits them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};
use tracing::trace;

use super::{lock_order, DispatchStore, StoreTransaction};
use crate::error::{DispatchError, Result};
use crate::models::{Assignment, AssignmentRequest, Job, JobStatus, Technician};

type RowLock = Arc<RowMutex<()>>;

#[derive(Debug, Default)]
struct State {
    jobs: BTreeMap<String, Job>,
    technicians: BTreeMap<String, Technician>,
    assignments: Vec<Assignment>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    job_locks: Mutex<HashMap<String, RowLock>>,
    technician_locks: Mutex<HashMap<String, RowLock>>,
}

/// Thread-safe in-memory [`DispatchStore`].
///
/// Clones share the same data.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
    lock_timeout: Duration,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store with a 5 second lock timeout.
    pub fn new() -> Self {
        Self {
            inner: Arc::default(),
            lock_timeout: Duration::from_millis(5000),
        }
    }

    /// Sets the maximum wait for a row lock.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Adds a job, builder style.
    pub fn with_job(self, job: Job) -> Self {
        self.insert_job(job);
        self
    }

    /// Adds a technician, builder style.
    pub fn with_technician(self, technician: Technician) -> Self {
        self.insert_technician(technician);
        self
    }

    /// Inserts or replaces a job.
    pub fn insert_job(&self, job: Job) {
        self.inner.state.lock().jobs.insert(job.id.clone(), job);
    }

    /// Inserts or replaces a technician.
    pub fn insert_technician(&self, technician: Technician) {
        self.inner
            .state
            .lock()
            .technicians
            .insert(technician.id.clone(), technician);
    }

    /// Committed state of a job.
    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.inner.state.lock().jobs.get(job_id).cloned()
    }

    /// Committed state of a technician.
    pub fn technician(&self, technician_id: &str) -> Option<Technician> {
        self.inner.state.lock().technicians.get(technician_id).cloned()
    }

    /// Committed assignment records, in commit order.
    pub fn assignments(&self) -> Vec<Assignment> {
        self.inner.state.lock().assignments.clone()
    }

    /// Opens a concrete transaction (see [`DispatchStore::begin`]).
    pub fn transaction(&self) -> InMemoryTransaction {
        InMemoryTransaction {
            inner: Arc::clone(&self.inner),
            lock_timeout: self.lock_timeout,
            guards: Vec::new(),
            held_jobs: HashSet::new(),
            held_technicians: HashSet::new(),
            jobs: BTreeMap::new(),
            technicians: BTreeMap::new(),
            assigned: BTreeMap::new(),
            increments: BTreeMap::new(),
            assignments: Vec::new(),
        }
    }

    /// Number of row mutexes currently allocated (jobs, technicians).
    pub fn row_lock_count(&self) -> (usize, usize) {
        (
            self.inner.job_locks.lock().len(),
            self.inner.technician_locks.lock().len(),
        )
    }
}

#[async_trait]
impl DispatchStore for InMemoryStore {
    async fn load_job(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.job(job_id))
    }

    async fn load_technicians(&self, company_id: &str) -> Result<Vec<Technician>> {
        Ok(self
            .inner
            .state
            .lock()
            .technicians
            .values()
            .filter(|t| t.company_id == company_id)
            .cloned()
            .collect())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(self.transaction()))
    }
}

/// Transaction over an [`InMemoryStore`].
///
/// Reads see this transaction's own writes. Other transactions and plain
/// readers see them only after commit. Dropping without commit discards them.
#[derive(Debug)]
pub struct InMemoryTransaction {
    inner: Arc<Inner>,
    lock_timeout: Duration,
    guards: Vec<OwnedMutexGuard<()>>,
    held_jobs: HashSet<String>,
    held_technicians: HashSet<String>,
    jobs: BTreeMap<String, Job>,
    technicians: BTreeMap<String, Technician>,
    // Pending writes: job -> assignee, technician -> job count delta.
    assigned: BTreeMap<String, String>,
    increments: BTreeMap<String, u32>,
    assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, Copy)]
enum RowKind {
    Job,
    Technician,
}

impl RowKind {
    fn label(self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Technician => "technician",
        }
    }
}

impl InMemoryTransaction {
    /// Acquires one row mutex unless this transaction already holds it.
    async fn acquire(&mut self, kind: RowKind, id: &str) -> Result<bool> {
        let held = match kind {
            RowKind::Job => &self.held_jobs,
            RowKind::Technician => &self.held_technicians,
        };
        if held.contains(id) {
            return Ok(false);
        }

        let lock = {
            let map = match kind {
                RowKind::Job => &self.inner.job_locks,
                RowKind::Technician => &self.inner.technician_locks,
            };
            Arc::clone(map.lock().entry(id.to_string()).or_default())
        };

        let guard = tokio::time::timeout(self.lock_timeout, lock.lock_owned())
            .await
            .map_err(|_| DispatchError::LockTimeout(format!("{} {id}", kind.label())))?;
        trace!(row = kind.label(), id, "row locked");

        self.guards.push(guard);
        match kind {
            RowKind::Job => self.held_jobs.insert(id.to_string()),
            RowKind::Technician => self.held_technicians.insert(id.to_string()),
        };
        Ok(true)
    }

    fn missing_lock(kind: RowKind, id: &str) -> DispatchError {
        DispatchError::Store(format!("{} {id} is not locked by this transaction", kind.label()))
    }

    /// Applies pending writes onto the committed rows.
    fn apply(&mut self) {
        let mut state = self.inner.state.lock();
        for (job_id, technician_id) in std::mem::take(&mut self.assigned) {
            if let Some(job) = state.jobs.get_mut(&job_id) {
                job.status = JobStatus::Assigned;
                job.assigned_technician_id = Some(technician_id);
            }
        }
        for (technician_id, count) in std::mem::take(&mut self.increments) {
            if let Some(tech) = state.technicians.get_mut(&technician_id) {
                tech.current_job_count = tech.current_job_count.saturating_add(count);
            }
        }
        state.assignments.append(&mut self.assignments);
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        self.guards.clear();
        for (held, locks) in [
            (&self.held_jobs, &self.inner.job_locks),
            (&self.held_technicians, &self.inner.technician_locks),
        ] {
            let mut locks = locks.lock();
            for id in held {
                // Only the map's own handle left: no holder and no waiter.
                if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                    locks.remove(id);
                }
            }
        }
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn lock_jobs(&mut self, job_ids: &[String]) -> Result<Vec<Job>> {
        let mut rows = Vec::new();
        for id in lock_order(job_ids) {
            if self.acquire(RowKind::Job, &id).await? {
                let committed = self.inner.state.lock().jobs.get(&id).cloned();
                if let Some(job) = committed {
                    self.jobs.insert(id.clone(), job);
                }
            }
            if let Some(job) = self.jobs.get(&id) {
                rows.push(job.clone());
            }
        }
        Ok(rows)
    }

    async fn lock_technicians(&mut self, technician_ids: &[String]) -> Result<Vec<Technician>> {
        let mut rows = Vec::new();
        for id in lock_order(technician_ids) {
            if self.acquire(RowKind::Technician, &id).await? {
                let committed = self.inner.state.lock().technicians.get(&id).cloned();
                if let Some(tech) = committed {
                    self.technicians.insert(id.clone(), tech);
                }
            }
            if let Some(tech) = self.technicians.get(&id) {
                rows.push(tech.clone());
            }
        }
        Ok(rows)
    }

    async fn mark_jobs_assigned(&mut self, requests: &[AssignmentRequest]) -> Result<()> {
        for request in requests {
            let job = self
                .jobs
                .get_mut(&request.job_id)
                .ok_or_else(|| Self::missing_lock(RowKind::Job, &request.job_id))?;
            job.status = JobStatus::Assigned;
            job.assigned_technician_id = Some(request.technician_id.clone());
            self.assigned
                .insert(request.job_id.clone(), request.technician_id.clone());
        }
        Ok(())
    }

    async fn increment_job_counts(&mut self, increments: &[(String, u32)]) -> Result<()> {
        for (id, count) in increments {
            let tech = self
                .technicians
                .get_mut(id)
                .ok_or_else(|| Self::missing_lock(RowKind::Technician, id))?;
            tech.current_job_count = tech.current_job_count.saturating_add(*count);
            let pending = self.increments.entry(id.clone()).or_default();
            *pending = pending.saturating_add(*count);
        }
        Ok(())
    }

    async fn insert_assignments(&mut self, assignments: &[Assignment]) -> Result<()> {
        self.assignments.extend_from_slice(assignments);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.apply();
        // Row locks are released on drop, after the writes are visible.
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
