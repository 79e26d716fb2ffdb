//! Scores and recommendations.
//!
//! A [`ScoreBreakdown`] holds the five bounded sub-scores for one
//! technician. A [`Recommendation`] is the ranked, bounded result of
//! dispatching a single job. Recommendations are values: an override
//! produces a new recommendation and leaves the original untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sub-scores for one technician against one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Proximity (0..=40, up to 60 after the emergency multiplier).
    pub distance_score: f64,
    /// Open-job headroom (0..=20).
    pub availability_score: f64,
    /// Skill level fit (0..=20).
    pub skill_score: f64,
    /// Recent completion record (0..=10).
    pub performance_score: f64,
    /// Daily load balance (0..=10).
    pub workload_score: f64,
    /// Sum of the five sub-scores.
    pub total_score: f64,
    /// Raw distance or travel time used for the distance sub-score.
    pub distance: f64,
    /// Whether the emergency adjustment has been applied.
    pub emergency_adjusted: bool,
}

impl ScoreBreakdown {
    /// Builds a breakdown and computes its total.
    pub fn new(
        distance_score: f64,
        availability_score: f64,
        skill_score: f64,
        performance_score: f64,
        workload_score: f64,
        distance: f64,
    ) -> Self {
        let mut breakdown = Self {
            distance_score,
            availability_score,
            skill_score,
            performance_score,
            workload_score,
            total_score: 0.0,
            distance,
            emergency_adjusted: false,
        };
        breakdown.recompute_total();
        breakdown
    }

    /// Recomputes `total_score` from the sub-scores.
    pub fn recompute_total(&mut self) {
        self.total_score = self.distance_score
            + self.availability_score
            + self.skill_score
            + self.performance_score
            + self.workload_score;
    }
}

/// A scored, rankable candidate.
///
/// Carries the raw inputs the ranking tie-break cascade needs, so ranking
/// works on scores alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Technician identity.
    pub technician_id: String,
    /// Technician display name.
    pub technician_name: String,
    /// Sub-scores and total.
    pub breakdown: ScoreBreakdown,
    /// Sum of recent completion samples (first tie-break).
    pub completion_sum: f64,
    /// Jobs already scheduled today (third tie-break).
    pub daily_job_count: u32,
    /// Concurrently open jobs at scoring time.
    pub current_job_count: u32,
}

impl CandidateScore {
    /// Total score shortcut.
    #[inline]
    pub fn total_score(&self) -> f64 {
        self.breakdown.total_score
    }

    /// Raw distance shortcut (second tie-break).
    #[inline]
    pub fn distance(&self) -> f64 {
        self.breakdown.distance
    }
}

/// A human replacement of the engine's rank-1 pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRecord {
    /// Pick that was replaced (`None` when the engine had no pick).
    pub previous_technician_id: Option<String>,
    /// Free-text justification.
    pub reason: String,
    /// When the override was made.
    pub overridden_at: DateTime<Utc>,
    /// Who made it.
    pub overridden_by: String,
}

/// Ranked dispatch result for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Dispatched job.
    pub job_id: String,
    /// Whether emergency scoring was in effect.
    pub is_emergency: bool,
    /// Number of technicians that passed eligibility.
    pub total_eligible_techs: usize,
    /// Top-N candidates, best first.
    pub candidates: Vec<CandidateScore>,
    /// Chosen technician (rank 1 unless overridden).
    pub assigned_tech: Option<String>,
    /// True iff no technician was eligible.
    pub requires_manual_dispatch: bool,
    /// Present when a human replaced the pick.
    pub override_record: Option<OverrideRecord>,
}

impl Recommendation {
    /// Looks up a candidate by technician id.
    pub fn candidate(&self, technician_id: &str) -> Option<&CandidateScore> {
        self.candidates
            .iter()
            .find(|c| c.technician_id == technician_id)
    }

    /// The candidate currently holding the pick.
    pub fn assigned_candidate(&self) -> Option<&CandidateScore> {
        self.assigned_tech
            .as_deref()
            .and_then(|id| self.candidate(id))
    }

    /// Candidate technician ids in rank order.
    pub fn candidate_ids(&self) -> Vec<String> {
        self.candidates
            .iter()
            .map(|c| c.technician_id.clone())
            .collect()
    }

    /// Whether a human override is attached.
    #[inline]
    pub fn is_overridden(&self) -> bool {
        self.override_record.is_some()
    }
}
