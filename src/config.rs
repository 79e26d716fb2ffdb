//! Dispatch configuration.
//!
//! All thresholds and score weights live in one immutable
//! [`DispatchConfig`] value handed to each pipeline stage at construction.
//! Different companies can run different policies side by side.
//!
//! Sub-score curves are expressed relative to their weight, so scaling a
//! weight rescales the whole curve. The defaults produce the standard
//! 40/20/20/10/10 split summing to 100.

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

/// Travel limits, in the distance provider's unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceThresholds {
    /// Hard eligibility limit for normal jobs; distance score reaches 0 here.
    pub max_travel: f64,
    /// Distance at which the distance score has fallen to half its weight.
    pub good: f64,
}

impl Default for DistanceThresholds {
    fn default() -> Self {
        Self {
            max_travel: 50.0,
            good: 25.0,
        }
    }
}

/// Maximum points per sub-score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Distance weight.
    pub distance: f64,
    /// Availability weight.
    pub availability: f64,
    /// Skill match weight.
    pub skill: f64,
    /// Performance weight.
    pub performance: f64,
    /// Workload weight.
    pub workload: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            distance: 40.0,
            availability: 20.0,
            skill: 20.0,
            performance: 10.0,
            workload: 10.0,
        }
    }
}

impl ScoreWeights {
    /// Highest attainable pre-emergency total.
    pub fn max_total(&self) -> f64 {
        self.distance + self.availability + self.skill + self.performance + self.workload
    }
}

/// A completion-rate band: rates at or above `min_percent` earn `fraction` of the weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBand {
    /// Lower bound, in percent (0..=100).
    pub min_percent: f64,
    /// Share of the performance weight awarded.
    pub fraction: f64,
}

impl PerformanceBand {
    /// Creates a band.
    pub fn new(min_percent: f64, fraction: f64) -> Self {
        Self {
            min_percent,
            fraction,
        }
    }
}

/// Performance sub-score policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformancePolicy {
    /// Below this many recent jobs the sample is too small to judge.
    pub min_sample: u32,
    /// Share of the weight awarded for an insufficient sample.
    pub default_fraction: f64,
    /// Bands, highest first.
    pub bands: Vec<PerformanceBand>,
    /// Share awarded below the lowest band.
    pub floor_fraction: f64,
}

impl Default for PerformancePolicy {
    fn default() -> Self {
        Self {
            min_sample: 10,
            default_fraction: 0.7,
            bands: vec![
                PerformanceBand::new(95.0, 1.0),
                PerformanceBand::new(90.0, 0.9),
                PerformanceBand::new(85.0, 0.7),
                PerformanceBand::new(75.0, 0.5),
            ],
            floor_fraction: 0.3,
        }
    }
}

/// Workload sub-score policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadPolicy {
    /// Daily job count at which the score is half its weight.
    pub midpoint_jobs: u32,
    /// Daily job count at which the score reaches 0.
    pub saturation_jobs: u32,
}

impl Default for WorkloadPolicy {
    fn default() -> Self {
        Self {
            midpoint_jobs: 3,
            saturation_jobs: 6,
        }
    }
}

/// Emergency-priority adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyPolicy {
    /// Multiplier applied to the travel threshold (0 < factor <= 1).
    pub travel_factor: f64,
    /// Multiplier applied to the distance sub-score.
    pub distance_multiplier: f64,
    /// Points subtracted from the availability sub-score (floored at 0).
    pub availability_penalty: f64,
    /// Points subtracted from the workload sub-score (floored at 0).
    pub workload_penalty: f64,
}

impl Default for EmergencyPolicy {
    fn default() -> Self {
        Self {
            travel_factor: 0.5,
            distance_multiplier: 1.5,
            availability_penalty: 10.0,
            workload_penalty: 10.0,
        }
    }
}

/// How candidates still tied after the full cascade are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalTieBreak {
    /// Lexicographic technician id.
    #[default]
    ById,
    /// Keep the order in which candidates were scored.
    InputOrder,
    /// Pick uniformly at random.
    Random,
}

/// Ranking policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingPolicy {
    /// Candidates kept in a recommendation.
    pub top_n: usize,
    /// Totals within this distance of the current maximum count as tied.
    pub tie_epsilon: f64,
    /// Ordering after the cascade is exhausted.
    pub final_tie_break: FinalTieBreak,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            top_n: 3,
            tie_epsilon: 0.1,
            final_tie_break: FinalTieBreak::ById,
        }
    }
}

/// Complete dispatch configuration.
///
/// # Example
/// ```
/// use u_dispatch::config::DispatchConfig;
///
/// let config = DispatchConfig::from_json(r#"{ "auto_assign": true, "ranking": { "top_n": 5 } }"#).unwrap();
/// assert!(config.auto_assign);
/// assert_eq!(config.ranking.top_n, 5);
/// assert_eq!(config.distance.max_travel, 50.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Travel limits.
    pub distance: DistanceThresholds,
    /// Sub-score weights.
    pub weights: ScoreWeights,
    /// Performance bands.
    pub performance: PerformancePolicy,
    /// Workload curve.
    pub workload: WorkloadPolicy,
    /// Emergency adjustments.
    pub emergency: EmergencyPolicy,
    /// Ranking and tie-breaking.
    pub ranking: RankingPolicy,
    /// Commit the rank-1 pick automatically after dispatch.
    pub auto_assign: bool,
    /// Upper bound on a row-lock wait inside an assignment transaction (ms).
    pub lock_timeout_ms: u64,
    /// Actor recorded on automatic assignments.
    pub system_actor: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            distance: DistanceThresholds::default(),
            weights: ScoreWeights::default(),
            performance: PerformancePolicy::default(),
            workload: WorkloadPolicy::default(),
            emergency: EmergencyPolicy::default(),
            ranking: RankingPolicy::default(),
            auto_assign: false,
            lock_timeout_ms: 5_000,
            system_actor: "dispatch-engine".to_string(),
        }
    }
}

impl DispatchConfig {
    /// Parses a (possibly partial) JSON document over the defaults and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DispatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Enables or disables automatic assignment.
    pub fn with_auto_assign(mut self, enabled: bool) -> Self {
        self.auto_assign = enabled;
        self
    }

    /// Sets the travel thresholds.
    pub fn with_distance(mut self, max_travel: f64, good: f64) -> Self {
        self.distance = DistanceThresholds { max_travel, good };
        self
    }

    /// Sets the sub-score weights.
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Sets the emergency policy.
    pub fn with_emergency(mut self, emergency: EmergencyPolicy) -> Self {
        self.emergency = emergency;
        self
    }

    /// Sets the number of candidates kept.
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.ranking.top_n = top_n;
        self
    }

    /// Sets the final tie-break.
    pub fn with_final_tie_break(mut self, tie_break: FinalTieBreak) -> Self {
        self.ranking.final_tie_break = tie_break;
        self
    }

    /// Sets the lock wait bound.
    pub fn with_lock_timeout_ms(mut self, ms: u64) -> Self {
        self.lock_timeout_ms = ms;
        self
    }

    /// Travel threshold in effect for a job.
    pub fn travel_threshold(&self, emergency: bool) -> f64 {
        if emergency {
            self.distance.max_travel * self.emergency.travel_factor
        } else {
            self.distance.max_travel
        }
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(DispatchError::Config(msg));

        if !(self.distance.max_travel > 0.0) || !(self.distance.good > 0.0) {
            return invalid("distance thresholds must be positive".into());
        }
        if self.distance.good > self.distance.max_travel {
            return invalid(format!(
                "good distance {} exceeds max travel {}",
                self.distance.good, self.distance.max_travel
            ));
        }
        let weights = [
            self.weights.distance,
            self.weights.availability,
            self.weights.skill,
            self.weights.performance,
            self.weights.workload,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return invalid("score weights must be finite and non-negative".into());
        }
        if !(self.emergency.travel_factor > 0.0 && self.emergency.travel_factor <= 1.0) {
            return invalid(format!(
                "emergency travel factor {} outside (0, 1]",
                self.emergency.travel_factor
            ));
        }
        if self.emergency.distance_multiplier < 0.0
            || self.emergency.availability_penalty < 0.0
            || self.emergency.workload_penalty < 0.0
        {
            return invalid("emergency adjustments must be non-negative".into());
        }
        if self.workload.midpoint_jobs == 0
            || self.workload.saturation_jobs <= self.workload.midpoint_jobs
        {
            return invalid("workload curve needs 0 < midpoint < saturation".into());
        }
        if self.ranking.top_n == 0 {
            return invalid("top_n must be at least 1".into());
        }
        if self.ranking.tie_epsilon < 0.0 {
            return invalid("tie epsilon must be non-negative".into());
        }
        let bands_descend = self
            .performance
            .bands
            .windows(2)
            .all(|w| w[0].min_percent >= w[1].min_percent);
        if !bands_descend {
            return invalid("performance bands must be ordered highest first".into());
        }
        Ok(())
    }
}
