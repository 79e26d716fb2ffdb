//! Emergency re-weighting.
//!
//! For emergency jobs proximity matters more than load balancing. The
//! adjustment is a pure transform over an existing breakdown; distance is
//! never recomputed. Skill and performance are left alone.

use crate::config::{DispatchConfig, EmergencyPolicy};
use crate::models::{CandidateScore, Job, ScoreBreakdown};

/// Applies the emergency policy to computed scores.
#[derive(Debug, Clone)]
pub struct EmergencyAdjuster {
    policy: EmergencyPolicy,
}

impl EmergencyAdjuster {
    /// Creates an adjuster from the dispatch configuration.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            policy: config.emergency.clone(),
        }
    }

    /// Whether the adjustment applies to a job.
    #[inline]
    pub fn applies_to(&self, job: &Job) -> bool {
        job.is_emergency()
    }

    /// Returns the adjusted breakdown. Already-adjusted input is returned as is.
    pub fn adjust(&self, breakdown: &ScoreBreakdown) -> ScoreBreakdown {
        let mut adjusted = breakdown.clone();
        if breakdown.emergency_adjusted {
            return adjusted;
        }

        adjusted.distance_score = breakdown.distance_score * self.policy.distance_multiplier;
        adjusted.availability_score =
            (breakdown.availability_score - self.policy.availability_penalty).max(0.0);
        adjusted.workload_score =
            (breakdown.workload_score - self.policy.workload_penalty).max(0.0);
        adjusted.emergency_adjusted = true;
        adjusted.recompute_total();
        adjusted
    }

    /// Adjusts a candidate's breakdown in place when the job is an emergency.
    pub fn apply(&self, job: &Job, candidate: &mut CandidateScore) {
        if self.applies_to(job) {
            candidate.breakdown = self.adjust(&candidate.breakdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjuster() -> EmergencyAdjuster {
        EmergencyAdjuster::new(&DispatchConfig::default())
    }

    #[test]
    fn test_emergency_adjustment() {
        let base = ScoreBreakdown::new(20.0, 20.0, 20.0, 10.0, 10.0, 25.0);
        let adjusted = adjuster().adjust(&base);

        assert!((adjusted.distance_score - 30.0).abs() < 1e-9);
        assert!((adjusted.availability_score - 10.0).abs() < 1e-9);
        assert!((adjusted.skill_score - 20.0).abs() < 1e-9);
        assert!((adjusted.performance_score - 10.0).abs() < 1e-9);
        assert!(adjusted.workload_score.abs() < 1e-9);
        assert!((adjusted.total_score - 70.0).abs() < 1e-9);
        assert!((adjusted.distance - 25.0).abs() < 1e-9);
        assert!(adjusted.emergency_adjusted);
        // input untouched
        assert!(!base.emergency_adjusted);
        assert!((base.total_score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_penalties_floor_at_zero() {
        let base = ScoreBreakdown::new(40.0, 5.0, 15.0, 7.0, 3.0, 0.0);
        let adjusted = adjuster().adjust(&base);
        assert!(adjusted.availability_score.abs() < 1e-9);
        assert!(adjusted.workload_score.abs() < 1e-9);
        assert!((adjusted.distance_score - 60.0).abs() < 1e-9);
        assert!((adjusted.total_score - 82.0).abs() < 1e-9);
    }

    #[test]
    fn test_adjustment_not_applied_twice() {
        let base = ScoreBreakdown::new(20.0, 20.0, 20.0, 10.0, 10.0, 25.0);
        let once = adjuster().adjust(&base);
        let twice = adjuster().adjust(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_apply_only_for_emergencies() {
        let mut candidate = CandidateScore {
            technician_id: "T1".into(),
            technician_name: String::new(),
            breakdown: ScoreBreakdown::new(20.0, 20.0, 20.0, 10.0, 10.0, 25.0),
            completion_sum: 0.0,
            daily_job_count: 0,
            current_job_count: 0,
        };
        let a = adjuster();

        a.apply(&Job::new("J1", "C1"), &mut candidate);
        assert!(!candidate.breakdown.emergency_adjusted);

        a.apply(&Job::new("J2", "C1").emergency(), &mut candidate);
        assert!(candidate.breakdown.emergency_adjusted);
        assert!((candidate.breakdown.total_score - 70.0).abs() < 1e-9);
    }
}
