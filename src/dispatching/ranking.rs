//! Candidate ranking and recommendations.
//!
//! Candidates are ordered by total score, highest first. Whenever several
//! remaining candidates sit within `tie_epsilon` of the current maximum,
//! the winner among them is picked by a fixed cascade:
//!
//! 1. higher sum of recent completion samples
//! 2. shorter raw distance
//! 3. fewer jobs scheduled today
//! 4. [`FinalTieBreak`] (by id, input order, or random)
//!
//! The cascade is re-evaluated after every pick, so a cluster is always
//! measured against the best score still unranked.
//!
//! # Reference
//! Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

use chrono::Utc;
use rand::seq::SliceRandom;
use std::cmp::Ordering;

use crate::config::{DispatchConfig, FinalTieBreak, RankingPolicy};
use crate::error::{DispatchError, Result};
use crate::models::{CandidateScore, OverrideRecord, Recommendation};

/// Equality tolerance for tie-break keys.
const KEY_EPSILON: f64 = 1e-9;

/// A secondary comparison used when totals are tied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreakCriterion {
    /// Higher completion-sample sum wins.
    CompletionSum,
    /// Shorter distance wins.
    Distance,
    /// Lower daily workload wins.
    Workload,
}

impl TieBreakCriterion {
    /// The cascade, in evaluation order.
    pub const CASCADE: [TieBreakCriterion; 3] = [Self::CompletionSum, Self::Distance, Self::Workload];

    /// Sort key; lower ranks first.
    fn key(&self, candidate: &CandidateScore) -> f64 {
        match self {
            Self::CompletionSum => -candidate.completion_sum,
            Self::Distance => candidate.distance(),
            Self::Workload => f64::from(candidate.daily_job_count),
        }
    }
}

/// Orders candidates and builds recommendations.
#[derive(Debug, Clone)]
pub struct Ranker {
    policy: RankingPolicy,
}

impl Ranker {
    /// Creates a ranker from the dispatch configuration.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            policy: config.ranking.clone(),
        }
    }

    /// Creates a ranker from a ranking policy.
    pub fn with_policy(policy: RankingPolicy) -> Self {
        Self { policy }
    }

    /// Orders candidates best first.
    pub fn rank(&self, scores: Vec<CandidateScore>) -> Vec<CandidateScore> {
        let mut remaining = scores;
        if self.policy.final_tie_break == FinalTieBreak::Random {
            remaining.shuffle(&mut rand::rng());
        }

        let mut ordered = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let max = remaining
                .iter()
                .map(CandidateScore::total_score)
                .fold(f64::NEG_INFINITY, f64::max);
            let cutoff = max - self.policy.tie_epsilon - KEY_EPSILON;

            let best = remaining
                .iter()
                .enumerate()
                .filter(|(_, c)| c.total_score() >= cutoff)
                .min_by(|(_, a), (_, b)| self.compare_tied(a, b))
                .map(|(i, _)| i)
                .unwrap_or(0);

            ordered.push(remaining.remove(best));
        }
        ordered
    }

    /// Builds the recommendation for one job from its eligible candidates.
    pub fn build_recommendation(
        &self,
        job_id: impl Into<String>,
        scores: Vec<CandidateScore>,
        is_emergency: bool,
    ) -> Recommendation {
        let total_eligible_techs = scores.len();
        let mut candidates = self.rank(scores);
        candidates.truncate(self.policy.top_n);
        let assigned_tech = candidates.first().map(|c| c.technician_id.clone());

        Recommendation {
            job_id: job_id.into(),
            is_emergency,
            total_eligible_techs,
            candidates,
            assigned_tech,
            requires_manual_dispatch: total_eligible_techs == 0,
            override_record: None,
        }
    }

    /// Cascade comparison for candidates inside one tie cluster.
    fn compare_tied(&self, a: &CandidateScore, b: &CandidateScore) -> Ordering {
        for criterion in TieBreakCriterion::CASCADE {
            let key_a = criterion.key(a);
            let key_b = criterion.key(b);
            if (key_a - key_b).abs() > KEY_EPSILON {
                return key_a.partial_cmp(&key_b).unwrap_or(Ordering::Equal);
            }
        }

        match self.policy.final_tie_break {
            FinalTieBreak::ById => a.technician_id.cmp(&b.technician_id),
            // `min_by` keeps the first of equal elements, preserving
            // (possibly shuffled) input order.
            FinalTieBreak::InputOrder | FinalTieBreak::Random => Ordering::Equal,
        }
    }
}

/// Replaces the pick of a recommendation with another of its candidates.
///
/// Returns a new recommendation; the input is never modified. The chosen
/// technician must be one of the scored candidates, otherwise eligibility
/// would be bypassed.
pub fn override_assignment(
    recommendation: &Recommendation,
    technician_id: &str,
    reason: impl Into<String>,
    overridden_by: impl Into<String>,
) -> Result<Recommendation> {
    if recommendation.candidate(technician_id).is_none() {
        return Err(DispatchError::InvalidOverride {
            technician_id: technician_id.to_string(),
            valid: recommendation.candidate_ids(),
        });
    }

    // Keep pointing at the engine's original pick across repeated overrides.
    let previous_technician_id = match &recommendation.override_record {
        Some(record) => record.previous_technician_id.clone(),
        None => recommendation.assigned_tech.clone(),
    };

    let mut overridden = recommendation.clone();
    overridden.assigned_tech = Some(technician_id.to_string());
    overridden.override_record = Some(OverrideRecord {
        previous_technician_id,
        reason: reason.into(),
        overridden_at: Utc::now(),
        overridden_by: overridden_by.into(),
    });
    Ok(overridden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreBreakdown;

    fn candidate(id: &str, total: f64, completion_sum: f64, distance: f64, daily: u32) -> CandidateScore {
        CandidateScore {
            technician_id: id.into(),
            technician_name: String::new(),
            breakdown: ScoreBreakdown::new(total, 0.0, 0.0, 0.0, 0.0, distance),
            completion_sum,
            daily_job_count: daily,
            current_job_count: 0,
        }
    }

    fn ids(ranked: &[CandidateScore]) -> Vec<&str> {
        ranked.iter().map(|c| c.technician_id.as_str()).collect()
    }

    fn ranker() -> Ranker {
        Ranker::new(&DispatchConfig::default())
    }

    #[test]
    fn test_sorted_by_total_descending() {
        let ranked = ranker().rank(vec![
            candidate("low", 40.0, 0.0, 1.0, 0),
            candidate("high", 90.0, 0.0, 1.0, 0),
            candidate("mid", 70.0, 0.0, 1.0, 0),
        ]);
        assert_eq!(ids(&ranked), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_completion_sum_breaks_tie_first() {
        // X is farther away and busier but has the better completion record.
        let ranked = ranker().rank(vec![
            candidate("Y", 80.05, 10.0, 1.0, 0),
            candidate("X", 80.0, 18.0, 30.0, 5),
        ]);
        assert_eq!(ids(&ranked), vec!["X", "Y"]);
    }

    #[test]
    fn test_distance_breaks_tie_second() {
        let ranked = ranker().rank(vec![
            candidate("far", 75.0, 12.0, 20.0, 0),
            candidate("near", 75.0, 12.0, 5.0, 4),
        ]);
        assert_eq!(ids(&ranked), vec!["near", "far"]);
    }

    #[test]
    fn test_workload_breaks_tie_third() {
        let ranked = ranker().rank(vec![
            candidate("busy", 75.0, 12.0, 5.0, 4),
            candidate("idle", 75.0, 12.0, 5.0, 1),
        ]);
        assert_eq!(ids(&ranked), vec!["idle", "busy"]);
    }

    #[test]
    fn test_final_tie_break_by_id() {
        let ranked = ranker().rank(vec![
            candidate("B", 75.0, 12.0, 5.0, 1),
            candidate("A", 75.0, 12.0, 5.0, 1),
        ]);
        assert_eq!(ids(&ranked), vec!["A", "B"]);
    }

    #[test]
    fn test_final_tie_break_input_order() {
        let r = Ranker::new(&DispatchConfig::default().with_final_tie_break(FinalTieBreak::InputOrder));
        let ranked = r.rank(vec![
            candidate("B", 75.0, 12.0, 5.0, 1),
            candidate("A", 75.0, 12.0, 5.0, 1),
        ]);
        assert_eq!(ids(&ranked), vec!["B", "A"]);
    }

    #[test]
    fn test_random_tie_break_keeps_primary_order() {
        let r = Ranker::new(&DispatchConfig::default().with_final_tie_break(FinalTieBreak::Random));
        for _ in 0..20 {
            let ranked = r.rank(vec![
                candidate("tie1", 75.0, 12.0, 5.0, 1),
                candidate("best", 95.0, 0.0, 5.0, 1),
                candidate("tie2", 75.0, 12.0, 5.0, 1),
            ]);
            assert_eq!(ranked[0].technician_id, "best");
            assert_eq!(ranked.len(), 3);
        }
    }

    #[test]
    fn test_gap_above_epsilon_is_not_a_tie() {
        let ranked = ranker().rank(vec![
            candidate("better_record", 80.0, 50.0, 1.0, 0),
            candidate("higher_total", 80.2, 0.0, 1.0, 0),
        ]);
        assert_eq!(ids(&ranked), vec!["higher_total", "better_record"]);
    }

    #[test]
    fn test_build_recommendation_top_n() {
        let rec = ranker().build_recommendation(
            "J1",
            vec![
                candidate("T1", 50.0, 0.0, 1.0, 0),
                candidate("T2", 90.0, 0.0, 1.0, 0),
                candidate("T3", 70.0, 0.0, 1.0, 0),
                candidate("T4", 60.0, 0.0, 1.0, 0),
            ],
            false,
        );
        assert_eq!(rec.total_eligible_techs, 4);
        assert_eq!(ids(&rec.candidates), vec!["T2", "T3", "T4"]);
        assert_eq!(rec.assigned_tech.as_deref(), Some("T2"));
        assert!(!rec.requires_manual_dispatch);
        assert!(rec.override_record.is_none());
    }

    #[test]
    fn test_empty_pool_requires_manual_dispatch() {
        let rec = ranker().build_recommendation("J1", Vec::new(), true);
        assert_eq!(rec.total_eligible_techs, 0);
        assert!(rec.candidates.is_empty());
        assert!(rec.assigned_tech.is_none());
        assert!(rec.requires_manual_dispatch);
        assert!(rec.is_emergency);
    }

    #[test]
    fn test_override_assignment() {
        let rec = ranker().build_recommendation(
            "J1",
            vec![candidate("T1", 90.0, 0.0, 1.0, 0), candidate("T2", 80.0, 0.0, 1.0, 0)],
            false,
        );
        let overridden = override_assignment(&rec, "T2", "customer asked for T2", "dispatcher").unwrap();

        assert_eq!(overridden.assigned_tech.as_deref(), Some("T2"));
        let record = overridden.override_record.as_ref().unwrap();
        assert_eq!(record.previous_technician_id.as_deref(), Some("T1"));
        assert_eq!(record.reason, "customer asked for T2");
        assert_eq!(record.overridden_by, "dispatcher");
        // original untouched
        assert_eq!(rec.assigned_tech.as_deref(), Some("T1"));
        assert!(rec.override_record.is_none());
    }

    #[test]
    fn test_override_is_idempotent() {
        let rec = ranker().build_recommendation(
            "J1",
            vec![candidate("T1", 90.0, 0.0, 1.0, 0), candidate("T2", 80.0, 0.0, 1.0, 0)],
            false,
        );
        let once = override_assignment(&rec, "T2", "r", "d").unwrap();
        let twice = override_assignment(&once, "T2", "r", "d").unwrap();

        assert_eq!(once.assigned_tech, twice.assigned_tech);
        assert_eq!(once.candidates, twice.candidates);
        assert_eq!(
            twice.override_record.unwrap().previous_technician_id.as_deref(),
            Some("T1")
        );
        assert_eq!(once.override_record.unwrap().previous_technician_id.as_deref(), Some("T1"));
    }

    #[test]
    fn test_override_rejects_unknown_technician() {
        let rec = ranker().build_recommendation(
            "J1",
            vec![candidate("T1", 90.0, 0.0, 1.0, 0), candidate("T2", 80.0, 0.0, 1.0, 0)],
            false,
        );
        let err = override_assignment(&rec, "T9", "r", "d").unwrap_err();
        match err {
            DispatchError::InvalidOverride { technician_id, valid } => {
                assert_eq!(technician_id, "T9");
                assert_eq!(valid, vec!["T1".to_string(), "T2".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_override_on_empty_recommendation_fails() {
        let rec = ranker().build_recommendation("J1", Vec::new(), false);
        assert!(override_assignment(&rec, "T1", "r", "d").is_err());
    }
}
