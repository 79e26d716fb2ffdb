//! PostgreSQL-backed store.
//!
//! Row locks are `SELECT ... FOR UPDATE` ordered by id. Each transaction
//! sets `lock_timeout`, and a timed-out wait (SQLSTATE 55P03) is reported
//! as [`DispatchError::LockTimeout`]. Batch writes are single statements
//! over `UNNEST`ed arrays, so a batch costs a constant number of round
//! trips regardless of its size.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{lock_order, DispatchStore, StoreTransaction};
use crate::error::{DispatchError, Result};
use crate::models::{
    Assignment, AssignmentRequest, Coordinates, Job, JobPriority, JobStatus, JobType, Technician,
};

/// SQLSTATE `lock_not_available`.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Tables used by [`PgDispatchStore`].
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS dispatch_jobs (
    id TEXT PRIMARY KEY,
    company_id TEXT NOT NULL,
    latitude DOUBLE PRECISION,
    longitude DOUBLE PRECISION,
    priority TEXT NOT NULL DEFAULT 'normal',
    job_type TEXT NOT NULL DEFAULT 'repair',
    status TEXT NOT NULL DEFAULT 'unassigned',
    required_skills TEXT[] NOT NULL DEFAULT '{}',
    minimum_skill_level SMALLINT NOT NULL DEFAULT 1,
    assigned_technician_id TEXT,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS dispatch_technicians (
    id TEXT PRIMARY KEY,
    company_id TEXT NOT NULL,
    name TEXT NOT NULL DEFAULT '',
    latitude DOUBLE PRECISION,
    longitude DOUBLE PRECISION,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    is_available BOOLEAN NOT NULL DEFAULT TRUE,
    skills TEXT[] NOT NULL DEFAULT '{}',
    skill_levels JSONB NOT NULL DEFAULT '{}',
    current_job_count INTEGER NOT NULL DEFAULT 0,
    max_concurrent_jobs INTEGER NOT NULL DEFAULT 1,
    recent_completion_rate DOUBLE PRECISION NOT NULL DEFAULT 0,
    recent_job_count INTEGER NOT NULL DEFAULT 0,
    daily_job_count INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS dispatch_technicians_company_idx
    ON dispatch_technicians (company_id);

CREATE TABLE IF NOT EXISTS dispatch_assignments (
    id UUID PRIMARY KEY,
    job_id TEXT NOT NULL REFERENCES dispatch_jobs (id),
    technician_id TEXT NOT NULL REFERENCES dispatch_technicians (id),
    company_id TEXT NOT NULL,
    assigned_at TIMESTAMPTZ NOT NULL,
    assigned_by TEXT NOT NULL,
    is_manual_override BOOLEAN NOT NULL DEFAULT FALSE,
    override_reason TEXT,
    job_priority TEXT NOT NULL,
    job_type TEXT NOT NULL
);
";

const JOB_COLUMNS: &str = "id, company_id, latitude, longitude, priority, job_type, status, \
     required_skills, minimum_skill_level, assigned_technician_id";

const TECHNICIAN_COLUMNS: &str = "id, company_id, name, latitude, longitude, is_active, \
     is_available, skills, skill_levels, current_job_count, max_concurrent_jobs, \
     recent_completion_rate, recent_job_count, daily_job_count";

#[derive(Debug, Clone, FromRow)]
struct JobRow {
    id: String,
    company_id: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    priority: String,
    job_type: String,
    status: String,
    required_skills: Vec<String>,
    minimum_skill_level: i16,
    assigned_technician_id: Option<String>,
}

impl TryFrom<JobRow> for Job {
    type Error = DispatchError;

    fn try_from(row: JobRow) -> Result<Self> {
        let unknown = |field: &str, value: &str| {
            DispatchError::Store(format!("job {}: unknown {field} '{value}'", row.id))
        };
        let priority = JobPriority::parse(&row.priority).ok_or_else(|| unknown("priority", &row.priority))?;
        let job_type = JobType::parse(&row.job_type).ok_or_else(|| unknown("job type", &row.job_type))?;
        let status = JobStatus::parse(&row.status).ok_or_else(|| unknown("status", &row.status))?;
        let minimum_skill_level = u8::try_from(row.minimum_skill_level)
            .map_err(|_| unknown("minimum skill level", &row.minimum_skill_level.to_string()))?;

        Ok(Job {
            location: coordinates(row.latitude, row.longitude),
            id: row.id,
            company_id: row.company_id,
            priority,
            job_type,
            status,
            required_skills: row.required_skills.into_iter().collect(),
            minimum_skill_level,
            assigned_technician_id: row.assigned_technician_id,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct TechnicianRow {
    id: String,
    company_id: String,
    name: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    is_active: bool,
    is_available: bool,
    skills: Vec<String>,
    skill_levels: Json<HashMap<String, i16>>,
    current_job_count: i32,
    max_concurrent_jobs: i32,
    recent_completion_rate: f64,
    recent_job_count: i32,
    daily_job_count: i32,
}

impl From<TechnicianRow> for Technician {
    fn from(row: TechnicianRow) -> Self {
        let count = |v: i32| u32::try_from(v).unwrap_or(0);
        Technician {
            location: coordinates(row.latitude, row.longitude),
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            is_active: row.is_active,
            is_available: row.is_available,
            skills: row.skills.into_iter().collect(),
            skill_levels: row
                .skill_levels
                .0
                .into_iter()
                .map(|(tag, level)| (tag, u8::try_from(level).unwrap_or(0)))
                .collect(),
            current_job_count: count(row.current_job_count),
            max_concurrent_jobs: count(row.max_concurrent_jobs),
            recent_completion_rate: row.recent_completion_rate.clamp(0.0, 1.0),
            recent_job_count: count(row.recent_job_count),
            daily_job_count: count(row.daily_job_count),
        }
    }
}

fn coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Option<Coordinates> {
    Some(Coordinates::new(latitude?, longitude?))
}

fn map_lock_error(err: sqlx::Error, what: &str) -> DispatchError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) => {
            DispatchError::LockTimeout(what.to_string())
        }
        _ => DispatchError::Database(err),
    }
}

/// [`DispatchStore`] over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgDispatchStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgDispatchStore {
    /// Wraps a connection pool; lock waits default to 5 seconds.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout_ms: 5000,
        }
    }

    /// Sets the per-transaction `lock_timeout`.
    pub fn with_lock_timeout_ms(mut self, ms: u64) -> Self {
        self.lock_timeout_ms = ms;
        self
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the dispatch tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DispatchStore for PgDispatchStore {
    async fn load_job(&self, job_id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM dispatch_jobs WHERE id = $1"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Job::try_from).transpose()
    }

    async fn load_technicians(&self, company_id: &str) -> Result<Vec<Technician>> {
        let rows = sqlx::query_as::<_, TechnicianRow>(&format!(
            "SELECT {TECHNICIAN_COLUMNS} FROM dispatch_technicians WHERE company_id = $1 ORDER BY id"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Technician::from).collect())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let mut tx = self.pool.begin().await?;
        // SET does not take bind parameters.
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// Transaction over a [`PgDispatchStore`].
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_jobs(&mut self, job_ids: &[String]) -> Result<Vec<Job>> {
        let ids = lock_order(job_ids);
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM dispatch_jobs WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_lock_error(e, &format!("jobs {}", ids.join(","))))?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn lock_technicians(&mut self, technician_ids: &[String]) -> Result<Vec<Technician>> {
        let ids = lock_order(technician_ids);
        let rows = sqlx::query_as::<_, TechnicianRow>(&format!(
            "SELECT {TECHNICIAN_COLUMNS} FROM dispatch_technicians WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_lock_error(e, &format!("technicians {}", ids.join(","))))?;
        Ok(rows.into_iter().map(Technician::from).collect())
    }

    async fn mark_jobs_assigned(&mut self, requests: &[AssignmentRequest]) -> Result<()> {
        let (job_ids, technician_ids): (Vec<String>, Vec<String>) = requests
            .iter()
            .map(|r| (r.job_id.clone(), r.technician_id.clone()))
            .unzip();

        sqlx::query(
            r"
            UPDATE dispatch_jobs AS j
            SET status = 'assigned', assigned_technician_id = u.technician_id, updated_at = NOW()
            FROM UNNEST($1::text[], $2::text[]) AS u(job_id, technician_id)
            WHERE j.id = u.job_id
            ",
        )
        .bind(job_ids)
        .bind(technician_ids)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn increment_job_counts(&mut self, increments: &[(String, u32)]) -> Result<()> {
        let ids: Vec<String> = increments.iter().map(|(id, _)| id.clone()).collect();
        let counts = increments
            .iter()
            .map(|(id, n)| {
                i32::try_from(*n)
                    .map_err(|_| DispatchError::Store(format!("increment too large for {id}")))
            })
            .collect::<Result<Vec<i32>>>()?;

        sqlx::query(
            r"
            UPDATE dispatch_technicians AS t
            SET current_job_count = t.current_job_count + u.n
            FROM UNNEST($1::text[], $2::int4[]) AS u(id, n)
            WHERE t.id = u.id
            ",
        )
        .bind(ids)
        .bind(counts)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_assignments(&mut self, assignments: &[Assignment]) -> Result<()> {
        let ids: Vec<Uuid> = assignments.iter().map(|a| a.id).collect();
        let job_ids: Vec<String> = assignments.iter().map(|a| a.job_id.clone()).collect();
        let technician_ids: Vec<String> = assignments.iter().map(|a| a.technician_id.clone()).collect();
        let company_ids: Vec<String> = assignments.iter().map(|a| a.company_id.clone()).collect();
        let assigned_at: Vec<DateTime<Utc>> = assignments.iter().map(|a| a.assigned_at).collect();
        let assigned_by: Vec<String> = assignments.iter().map(|a| a.assigned_by.clone()).collect();
        let manual: Vec<bool> = assignments.iter().map(|a| a.is_manual_override).collect();
        let reasons: Vec<Option<String>> = assignments.iter().map(|a| a.override_reason.clone()).collect();
        let priorities: Vec<String> = assignments
            .iter()
            .map(|a| a.job_priority.as_str().to_string())
            .collect();
        let job_types: Vec<String> = assignments
            .iter()
            .map(|a| a.job_type.as_str().to_string())
            .collect();

        sqlx::query(
            r"
            INSERT INTO dispatch_assignments
                (id, job_id, technician_id, company_id, assigned_at, assigned_by,
                 is_manual_override, override_reason, job_priority, job_type)
            SELECT * FROM UNNEST(
                $1::uuid[], $2::text[], $3::text[], $4::text[], $5::timestamptz[],
                $6::text[], $7::bool[], $8::text[], $9::text[], $10::text[]
            )
            ",
        )
        .bind(ids)
        .bind(job_ids)
        .bind(technician_ids)
        .bind(company_ids)
        .bind(assigned_at)
        .bind(assigned_by)
        .bind(manual)
        .bind(reasons)
        .bind(priorities)
        .bind(job_types)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_row() -> JobRow {
        JobRow {
            id: "J1".into(),
            company_id: "C1".into(),
            latitude: Some(33.7),
            longitude: Some(-84.4),
            priority: "emergency".into(),
            job_type: "installation".into(),
            status: "unassigned".into(),
            required_skills: vec!["hvac".into()],
            minimum_skill_level: 2,
            assigned_technician_id: None,
        }
    }

    #[test]
    fn test_job_row_conversion() {
        let job = Job::try_from(job_row()).unwrap();
        assert!(job.is_emergency());
        assert_eq!(job.job_type, JobType::Installation);
        assert!(job.is_unassigned());
        assert_eq!(job.minimum_skill_level, 2);
        assert!(job.required_skills.contains("hvac"));
        assert!(job.valid_location().is_some());
    }

    #[test]
    fn test_job_row_unknown_status() {
        let mut row = job_row();
        row.status = "teleported".into();
        assert!(matches!(Job::try_from(row), Err(DispatchError::Store(_))));
    }

    #[test]
    fn test_job_row_partial_coordinates() {
        let mut row = job_row();
        row.longitude = None;
        assert!(Job::try_from(row).unwrap().location.is_none());
    }

    #[test]
    fn test_technician_row_conversion() {
        let row = TechnicianRow {
            id: "T1".into(),
            company_id: "C1".into(),
            name: "Ana".into(),
            latitude: Some(0.0),
            longitude: Some(0.0),
            is_active: true,
            is_available: true,
            skills: vec!["hvac".into()],
            skill_levels: Json(HashMap::from([("hvac".to_string(), 3)])),
            current_job_count: 1,
            max_concurrent_jobs: -2,
            recent_completion_rate: 0.9,
            recent_job_count: 12,
            daily_job_count: 2,
        };
        let tech = Technician::from(row);
        assert_eq!(tech.skill_level("hvac"), 3);
        assert_eq!(tech.max_concurrent_jobs, 0);
        assert!(!tech.has_capacity());
    }
}
