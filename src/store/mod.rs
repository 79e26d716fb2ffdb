//! Job/technician store abstraction.
//!
//! The engine reads candidate pools without locks and only takes row
//! locks inside [`StoreTransaction`] during assignment. Locking reads must
//! acquire rows in ascending id order; callers lock jobs before
//! technicians so two transactions sharing rows can never deadlock.
//!
//! Two implementations ship with the crate:
//!
//! - [`InMemoryStore`]: per-row async mutexes with bounded waits, for tests
//!   and embedded use.
//! - `PgDispatchStore` (feature `postgres`): `SELECT ... FOR UPDATE` with
//!   `lock_timeout`, bulk writes via `UNNEST`.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Assignment, AssignmentRequest, Job, Technician};

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::{InMemoryStore, InMemoryTransaction};
#[cfg(feature = "postgres")]
pub use postgres::{PgDispatchStore, PgTransaction, SCHEMA};

/// Read access plus transactions.
#[async_trait]
pub trait DispatchStore: Send + Sync + 'static {
    /// Loads a job without locking it.
    async fn load_job(&self, job_id: &str) -> Result<Option<Job>>;

    /// Loads the candidate pool for a company without locking.
    async fn load_technicians(&self, company_id: &str) -> Result<Vec<Technician>>;

    /// Opens a transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
}

/// A unit of work holding row locks until commit or rollback.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Locks job rows (ascending id order) and returns those that exist.
    async fn lock_jobs(&mut self, job_ids: &[String]) -> Result<Vec<Job>>;

    /// Locks technician rows (ascending id order) and returns those that exist.
    async fn lock_technicians(&mut self, technician_ids: &[String]) -> Result<Vec<Technician>>;

    /// Sets status to assigned and records the technician for each job.
    async fn mark_jobs_assigned(&mut self, requests: &[AssignmentRequest]) -> Result<()>;

    /// Adds to each technician's open job count.
    async fn increment_job_counts(&mut self, increments: &[(String, u32)]) -> Result<()>;

    /// Inserts assignment audit records.
    async fn insert_assignments(&mut self, assignments: &[Assignment]) -> Result<()>;

    /// Makes every write visible at once.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every write and releases locks.
    async fn rollback(self: Box<Self>) -> Result<()>;

    /// Locks a single job row.
    async fn lock_job(&mut self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.lock_jobs(&[job_id.to_string()]).await?.into_iter().next())
    }

    /// Locks a single technician row.
    async fn lock_technician(&mut self, technician_id: &str) -> Result<Option<Technician>> {
        Ok(self
            .lock_technicians(&[technician_id.to_string()])
            .await?
            .into_iter()
            .next())
    }
}

/// Sorted, de-duplicated copy of a set of row ids.
pub(crate) fn lock_order(ids: &[String]) -> Vec<String> {
    let mut ordered = ids.to_vec();
    ordered.sort();
    ordered.dedup();
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_order() {
        let ids = vec!["T3".to_string(), "T1".to_string(), "T3".to_string(), "T2".to_string()];
        assert_eq!(lock_order(&ids), vec!["T1", "T2", "T3"]);
    }
}
