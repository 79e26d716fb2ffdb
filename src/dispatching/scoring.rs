//! Multi-factor technician scoring.
//!
//! Five independent sub-scores, each clamped to `0..=weight`, summed into a
//! total (0..=100 with the default weights):
//!
//! | Sub-score | Default weight | Curve |
//! |-----------|----------------|-------|
//! | Distance | 40 | 40 at 0, 20 at the good distance, 0 at max travel (piecewise linear) |
//! | Availability | 20 | 20 with no open jobs, 10 up to half capacity, then linear to 0 at full |
//! | Skill | 20 | 20 exact level, 15 one level off, 10 two or more off (largest gap governs) |
//! | Performance | 10 | flat 7 under 10 recent jobs, else banded by completion rate |
//! | Workload | 10 | 10 at 0 jobs today, 5 at 3, 0 at 6 (piecewise linear) |
//!
//! Every function here is pure: same inputs, same breakdown.

use std::fmt::Debug;

use crate::config::{DispatchConfig, DistanceThresholds, PerformancePolicy, ScoreWeights, WorkloadPolicy};
use crate::models::{CandidateScore, Job, ScoreBreakdown, Technician};

/// Tolerance for band boundaries (e.g. 0.95 × 100 must land in the 95 band).
const BAND_EPSILON: f64 = 1e-9;

/// Computes a score breakdown for an eligible technician.
///
/// Implementations must be pure functions of their inputs; alternate
/// scoring policies plug in here without touching ranking or persistence.
pub trait ScoreCalculator: Send + Sync + Debug {
    /// Policy name for logs.
    fn name(&self) -> &'static str;

    /// Scores one technician for one job at the given distance.
    fn score(&self, technician: &Technician, job: &Job, distance: f64) -> ScoreBreakdown;

    /// Scores and wraps a technician as a rankable candidate.
    fn candidate(&self, technician: &Technician, job: &Job, distance: f64) -> CandidateScore {
        CandidateScore {
            technician_id: technician.id.clone(),
            technician_name: technician.name.clone(),
            breakdown: self.score(technician, job, distance),
            completion_sum: technician.completion_sum(),
            daily_job_count: technician.daily_job_count,
            current_job_count: technician.current_job_count,
        }
    }
}

/// The standard five-factor scorer.
#[derive(Debug, Clone)]
pub struct StandardScorer {
    weights: ScoreWeights,
    distance: DistanceThresholds,
    performance: PerformancePolicy,
    workload: WorkloadPolicy,
}

impl StandardScorer {
    /// Creates a scorer from the dispatch configuration.
    pub fn new(config: &DispatchConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            distance: config.distance.clone(),
            performance: config.performance.clone(),
            workload: config.workload.clone(),
        }
    }

    /// Distance sub-score.
    pub fn distance_score(&self, distance: f64) -> f64 {
        let w = self.weights.distance;
        let good = self.distance.good;
        let max = self.distance.max_travel;

        let score = if distance <= 0.0 {
            w
        } else if distance <= good {
            w - (w / 2.0) * (distance / good)
        } else if distance <= max && max > good {
            (w / 2.0) * (1.0 - (distance - good) / (max - good))
        } else {
            0.0
        };
        score.clamp(0.0, w)
    }

    /// Availability sub-score.
    pub fn availability_score(&self, technician: &Technician) -> f64 {
        let w = self.weights.availability;
        if technician.current_job_count == 0 {
            return w;
        }
        if technician.max_concurrent_jobs == 0 {
            return 0.0;
        }

        let ratio =
            f64::from(technician.current_job_count) / f64::from(technician.max_concurrent_jobs);
        let score = if ratio <= 0.5 {
            w / 2.0
        } else {
            (w / 2.0) * (1.0 - ratio) / 0.5
        };
        score.clamp(0.0, w / 2.0)
    }

    /// Skill match sub-score.
    ///
    /// The required tag with the largest level gap decides the score.
    /// Jobs without required tags are an exact match.
    pub fn skill_score(&self, technician: &Technician, job: &Job) -> f64 {
        let w = self.weights.skill;
        let required = i32::from(job.minimum_skill_level);
        let gap = job
            .required_skills
            .iter()
            .map(|tag| (i32::from(technician.skill_level(tag)) - required).abs())
            .max()
            .unwrap_or(0);

        match gap {
            0 => w,
            1 => w * 0.75,
            _ => w * 0.5,
        }
    }

    /// Performance sub-score.
    pub fn performance_score(&self, technician: &Technician) -> f64 {
        let w = self.weights.performance;
        let policy = &self.performance;

        let fraction = if technician.recent_job_count < policy.min_sample {
            policy.default_fraction
        } else {
            let percent = technician.recent_completion_rate * 100.0;
            policy
                .bands
                .iter()
                .find(|band| percent + BAND_EPSILON >= band.min_percent)
                .map(|band| band.fraction)
                .unwrap_or(policy.floor_fraction)
        };
        (w * fraction).clamp(0.0, w)
    }

    /// Workload sub-score.
    pub fn workload_score(&self, technician: &Technician) -> f64 {
        let w = self.weights.workload;
        let daily = f64::from(technician.daily_job_count);
        let mid = f64::from(self.workload.midpoint_jobs);
        let saturation = f64::from(self.workload.saturation_jobs);

        let score = if daily <= 0.0 {
            w
        } else if daily <= mid {
            w - (w / 2.0) * (daily / mid)
        } else if daily < saturation {
            (w / 2.0) * (1.0 - (daily - mid) / (saturation - mid))
        } else {
            0.0
        };
        score.clamp(0.0, w)
    }
}

impl ScoreCalculator for StandardScorer {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn score(&self, technician: &Technician, job: &Job, distance: f64) -> ScoreBreakdown {
        ScoreBreakdown::new(
            self.distance_score(distance),
            self.availability_score(technician),
            self.skill_score(technician, job),
            self.performance_score(technician),
            self.workload_score(technician),
            distance,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> StandardScorer {
        StandardScorer::new(&DispatchConfig::default())
    }

    fn job() -> Job {
        Job::new("J1", "C1")
            .with_location(0.0, 0.0)
            .with_required_skill("hvac")
            .with_minimum_skill_level(2)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_perfect_candidate() {
        let tech = Technician::new("T1", "C1")
            .with_location(0.0, 0.0)
            .with_skill("hvac", 2)
            .with_jobs(0, 3)
            .with_performance(0.95, 15);
        let b = scorer().score(&tech, &job(), 0.0);

        assert!(approx(b.distance_score, 40.0));
        assert!(approx(b.availability_score, 20.0));
        assert!(approx(b.skill_score, 20.0));
        assert!(approx(b.performance_score, 10.0));
        assert!(approx(b.workload_score, 10.0));
        assert!(approx(b.total_score, 100.0));
    }

    #[test]
    fn test_distance_curve() {
        let s = scorer();
        assert!(approx(s.distance_score(0.0), 40.0));
        assert!(approx(s.distance_score(12.5), 30.0));
        assert!(approx(s.distance_score(25.0), 20.0));
        assert!(approx(s.distance_score(37.5), 10.0));
        assert!(approx(s.distance_score(50.0), 0.0));
        assert!(approx(s.distance_score(80.0), 0.0));
        assert!(approx(s.distance_score(-3.0), 40.0));
    }

    #[test]
    fn test_availability_curve() {
        let s = scorer();
        let t = |current, max| Technician::new("T", "C").with_jobs(current, max);
        assert!(approx(s.availability_score(&t(0, 4)), 20.0));
        assert!(approx(s.availability_score(&t(1, 4)), 10.0));
        assert!(approx(s.availability_score(&t(2, 4)), 10.0));
        assert!(approx(s.availability_score(&t(3, 4)), 5.0));
        assert!(approx(s.availability_score(&t(4, 4)), 0.0));
        assert!(approx(s.availability_score(&t(6, 4)), 0.0));
        assert!(approx(s.availability_score(&t(1, 0)), 0.0));
    }

    #[test]
    fn test_skill_gap() {
        let s = scorer();
        let j = job();
        let exact = Technician::new("T", "C").with_skill("hvac", 2);
        let over = Technician::new("T", "C").with_skill("hvac", 3);
        assert!(approx(s.skill_score(&exact, &j), 20.0));
        assert!(approx(s.skill_score(&over, &j), 15.0));

        let j1 = job().with_minimum_skill_level(1);
        let master = Technician::new("T", "C").with_skill("hvac", 3);
        assert!(approx(s.skill_score(&master, &j1), 10.0));
    }

    #[test]
    fn test_skill_largest_gap_governs() {
        let s = scorer();
        let j = Job::new("J", "C")
            .with_required_skill("hvac")
            .with_required_skill("electrical")
            .with_minimum_skill_level(1);
        // hvac gap 0, electrical gap 2 → governed by the gap of 2.
        let t = Technician::new("T", "C")
            .with_skill("hvac", 1)
            .with_skill("electrical", 3);
        assert!(approx(s.skill_score(&t, &j), 10.0));
    }

    #[test]
    fn test_skill_no_requirements() {
        let s = scorer();
        let j = Job::new("J", "C");
        let t = Technician::new("T", "C");
        assert!(approx(s.skill_score(&t, &j), 20.0));
    }

    #[test]
    fn test_performance_bands() {
        let s = scorer();
        let t = |rate, count| Technician::new("T", "C").with_performance(rate, count);
        assert!(approx(s.performance_score(&t(1.0, 9)), 7.0));
        assert!(approx(s.performance_score(&t(0.2, 3)), 7.0));
        assert!(approx(s.performance_score(&t(0.95, 10)), 10.0));
        assert!(approx(s.performance_score(&t(0.92, 40)), 9.0));
        assert!(approx(s.performance_score(&t(0.90, 40)), 9.0));
        assert!(approx(s.performance_score(&t(0.85, 40)), 7.0));
        assert!(approx(s.performance_score(&t(0.80, 40)), 5.0));
        assert!(approx(s.performance_score(&t(0.75, 40)), 5.0));
        assert!(approx(s.performance_score(&t(0.50, 40)), 3.0));
    }

    #[test]
    fn test_workload_curve() {
        let s = scorer();
        let t = |daily| Technician::new("T", "C").with_daily_jobs(daily);
        assert!(approx(s.workload_score(&t(0)), 10.0));
        assert!(approx(s.workload_score(&t(3)), 5.0));
        assert!(approx(s.workload_score(&t(6)), 0.0));
        assert!(approx(s.workload_score(&t(9)), 0.0));
        assert!(approx(s.workload_score(&t(1)), 10.0 - 5.0 / 3.0));
        assert!(approx(s.workload_score(&t(4)), 5.0 - 5.0 / 3.0));
    }

    #[test]
    fn test_sub_scores_within_ranges() {
        let s = scorer();
        let j = job();
        for current in 0..5 {
            for daily in 0..8 {
                for level in 0..=3 {
                    for count in [0, 5, 10, 50] {
                        for rate in [0.0, 0.5, 0.8, 0.99] {
                            for distance in [0.0, 10.0, 25.0, 49.0, 75.0] {
                                let t = Technician::new("T", "C")
                                    .with_skill("hvac", level)
                                    .with_jobs(current, 4)
                                    .with_performance(rate, count)
                                    .with_daily_jobs(daily);
                                let b = s.score(&t, &j, distance);
                                assert!((0.0..=40.0).contains(&b.distance_score));
                                assert!((0.0..=20.0).contains(&b.availability_score));
                                assert!((0.0..=20.0).contains(&b.skill_score));
                                assert!((0.0..=10.0).contains(&b.performance_score));
                                assert!((0.0..=10.0).contains(&b.workload_score));
                                assert!((0.0..=100.0).contains(&b.total_score));
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let s = scorer();
        let t = Technician::new("T", "C")
            .with_skill("hvac", 3)
            .with_jobs(1, 3)
            .with_performance(0.87, 22)
            .with_daily_jobs(2);
        assert_eq!(s.score(&t, &job(), 17.3), s.score(&t, &job(), 17.3));
    }

    #[test]
    fn test_custom_weights_rescale_curves() {
        let config = DispatchConfig::default().with_weights(ScoreWeights {
            distance: 60.0,
            availability: 10.0,
            skill: 10.0,
            performance: 10.0,
            workload: 10.0,
        });
        let s = StandardScorer::new(&config);
        assert!(approx(s.distance_score(25.0), 30.0));
        assert!(approx(
            s.availability_score(&Technician::new("T", "C").with_jobs(1, 4)),
            5.0
        ));
    }

    #[test]
    fn test_candidate_carries_tiebreak_inputs() {
        let t = Technician::new("T1", "C")
            .with_name("Rae")
            .with_skill("hvac", 2)
            .with_jobs(1, 3)
            .with_performance(0.9, 20)
            .with_daily_jobs(2);
        let c = scorer().candidate(&t, &job(), 8.0);
        assert_eq!(c.technician_id, "T1");
        assert_eq!(c.technician_name, "Rae");
        assert!(approx(c.completion_sum, 18.0));
        assert_eq!(c.daily_job_count, 2);
        assert_eq!(c.current_job_count, 1);
        assert!(approx(c.distance(), 8.0));
    }
}
