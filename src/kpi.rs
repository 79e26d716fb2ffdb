//! Dispatch quality metrics (KPIs).
//!
//! Summarizes a batch of recommendations, e.g. one dispatch cycle or one
//! day of emergency calls.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Manual Dispatch Rate | Fraction of jobs with no eligible technician |
//! | Avg Eligible | Mean eligible pool size per job |
//! | Avg Top Score | Mean total score of the rank-1 candidate |
//! | Avg Top Distance | Mean raw distance of the rank-1 candidate |
//! | Override Rate | Fraction of jobs where a human replaced the pick |

use crate::models::Recommendation;

/// Dispatch performance indicators.
#[derive(Debug, Clone, Default)]
pub struct DispatchKpi {
    /// Number of recommendations summarized.
    pub job_count: usize,
    /// Number of emergency jobs.
    pub emergency_count: usize,
    /// Jobs that had no eligible technician.
    pub manual_dispatch_count: usize,
    /// `manual_dispatch_count / job_count` (0.0..1.0).
    pub manual_dispatch_rate: f64,
    /// Mean number of eligible technicians per job.
    pub avg_eligible: f64,
    /// Mean total score of the assigned candidate, over jobs with a pick.
    pub avg_top_score: f64,
    /// Mean raw distance of the assigned candidate, over jobs with a pick.
    pub avg_top_distance: f64,
    /// Jobs whose pick was replaced by an override.
    pub override_count: usize,
    /// `override_count / job_count` (0.0..1.0).
    pub override_rate: f64,
}

impl DispatchKpi {
    /// Computes KPIs from a set of recommendations.
    pub fn calculate(recommendations: &[Recommendation]) -> Self {
        let job_count = recommendations.len();
        if job_count == 0 {
            return Self::default();
        }

        let mut emergency_count = 0;
        let mut manual_dispatch_count = 0;
        let mut override_count = 0;
        let mut total_eligible = 0usize;
        let mut picked = 0usize;
        let mut total_top_score = 0.0;
        let mut total_top_distance = 0.0;

        for rec in recommendations {
            if rec.is_emergency {
                emergency_count += 1;
            }
            if rec.requires_manual_dispatch {
                manual_dispatch_count += 1;
            }
            if rec.is_overridden() {
                override_count += 1;
            }
            total_eligible += rec.total_eligible_techs;

            if let Some(candidate) = rec.assigned_candidate() {
                picked += 1;
                total_top_score += candidate.total_score();
                total_top_distance += candidate.distance();
            }
        }

        let n = job_count as f64;
        let (avg_top_score, avg_top_distance) = if picked == 0 {
            (0.0, 0.0)
        } else {
            (total_top_score / picked as f64, total_top_distance / picked as f64)
        };

        Self {
            job_count,
            emergency_count,
            manual_dispatch_count,
            manual_dispatch_rate: manual_dispatch_count as f64 / n,
            avg_eligible: total_eligible as f64 / n,
            avg_top_score,
            avg_top_distance,
            override_count,
            override_rate: override_count as f64 / n,
        }
    }

    /// Whether the batch meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_manual_rate: f64, min_top_score: f64) -> bool {
        self.manual_dispatch_rate <= max_manual_rate && self.avg_top_score >= min_top_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchConfig;
    use crate::dispatching::{override_assignment, Ranker};
    use crate::models::{CandidateScore, ScoreBreakdown};

    fn candidate(id: &str, total: f64, distance: f64) -> CandidateScore {
        CandidateScore {
            technician_id: id.into(),
            technician_name: String::new(),
            breakdown: ScoreBreakdown::new(total, 0.0, 0.0, 0.0, 0.0, distance),
            completion_sum: 0.0,
            daily_job_count: 0,
            current_job_count: 0,
        }
    }

    fn recommendations() -> Vec<Recommendation> {
        let ranker = Ranker::new(&DispatchConfig::default());
        let a = ranker.build_recommendation(
            "J1",
            vec![candidate("T1", 40.0, 10.0), candidate("T2", 30.0, 20.0)],
            false,
        );
        let b = ranker.build_recommendation("J2", vec![candidate("T3", 20.0, 4.0)], true);
        let b = override_assignment(&b, "T3", "confirmed by phone", "dispatcher").unwrap();
        let c = ranker.build_recommendation("J3", Vec::new(), true);
        vec![a, b, c]
    }

    #[test]
    fn test_kpi_basic() {
        let kpi = DispatchKpi::calculate(&recommendations());
        assert_eq!(kpi.job_count, 3);
        assert_eq!(kpi.emergency_count, 2);
        assert_eq!(kpi.manual_dispatch_count, 1);
        assert!((kpi.manual_dispatch_rate - 1.0 / 3.0).abs() < 1e-10);
        assert!((kpi.avg_eligible - 1.0).abs() < 1e-10); // (2+1+0)/3
        assert!((kpi.avg_top_score - 30.0).abs() < 1e-10); // (40+20)/2
        assert!((kpi.avg_top_distance - 7.0).abs() < 1e-10); // (10+4)/2
        assert_eq!(kpi.override_count, 1);
    }

    #[test]
    fn test_kpi_empty() {
        let kpi = DispatchKpi::calculate(&[]);
        assert_eq!(kpi.job_count, 0);
        assert!(kpi.manual_dispatch_rate.abs() < 1e-10);
        assert!(kpi.avg_top_score.abs() < 1e-10);
    }

    #[test]
    fn test_meets_thresholds() {
        let kpi = DispatchKpi::calculate(&recommendations());
        assert!(kpi.meets_thresholds(0.5, 30.0));
        assert!(!kpi.meets_thresholds(0.2, 30.0));
        assert!(!kpi.meets_thresholds(0.5, 31.0));
    }
}
