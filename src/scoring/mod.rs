//! Score engine. Turns raw performance telemetry into a composite Q-Score.
//!
//! Normalises a `PerformanceSample` against a caller-supplied `Baseline`
//! into four sub-scores (latency, throughput, quality, reliability) and
//! combines them with weights that must sum to exactly 1.0.

pub mod analysis;

use chrono::Utc;
use tracing::debug;

use crate::types::{Baseline, CoreError, CoreResult, PerformanceSample, QScore};

/// Tolerance for the weight-sum invariant.
const WEIGHT_SUM_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Sub-score weights. Only constructible through `new`, which enforces the
/// sum-to-one invariant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    latency: f64,
    throughput: f64,
    quality: f64,
    reliability: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            latency: 0.25,
            throughput: 0.25,
            quality: 0.25,
            reliability: 0.25,
        }
    }
}

impl ScoreWeights {
    pub fn new(latency: f64, throughput: f64, quality: f64, reliability: f64) -> CoreResult<Self> {
        let weights = [latency, throughput, quality, reliability];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(CoreError::InvalidInput(format!(
                "score weights must be finite and non-negative, got {weights:?}"
            )));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(CoreError::InvalidInput(format!(
                "score weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(Self {
            latency,
            throughput,
            quality,
            reliability,
        })
    }

    /// Build from the `[latency, throughput, quality, reliability]` config array.
    pub fn from_array(w: [f64; 4]) -> CoreResult<Self> {
        Self::new(w[0], w[1], w[2], w[3])
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.latency, self.throughput, self.quality, self.reliability]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Stateless Q-Score calculator. Safe to share across workers.
#[derive(Debug, Clone, Default)]
pub struct ScoreEngine {
    weights: ScoreWeights,
}

impl ScoreEngine {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Compute the Q-Score for one sample.
    ///
    /// - latency = 100 − 100·latency/max_latency, floored at 0
    /// - throughput = 100·throughput/target, capped at 100
    /// - quality = accuracy
    /// - reliability = uptime − error rate
    ///
    /// Every sub-score and the composite is clamped to [0, 100].
    pub fn compute(&self, sample: &PerformanceSample, baseline: &Baseline) -> CoreResult<QScore> {
        validate_sample(sample)?;
        validate_baseline(baseline)?;

        let latency_score =
            clamp_pct(100.0 - 100.0 * sample.latency_ms / baseline.max_latency_ms);
        let throughput_score =
            clamp_pct(100.0 * sample.throughput_ops / baseline.target_throughput_ops);
        let quality_score = clamp_pct(sample.accuracy_pct);
        let reliability_score = clamp_pct(sample.uptime_pct - sample.error_rate_pct);

        let composite = clamp_pct(
            self.weights.latency * latency_score
                + self.weights.throughput * throughput_score
                + self.weights.quality * quality_score
                + self.weights.reliability * reliability_score,
        );

        debug!(
            model_id = %sample.model_id,
            latency = format!("{latency_score:.1}"),
            throughput = format!("{throughput_score:.1}"),
            quality = format!("{quality_score:.1}"),
            reliability = format!("{reliability_score:.1}"),
            composite = format!("{composite:.1}"),
            "Q-score computed"
        );

        Ok(QScore {
            model_id: sample.model_id.clone(),
            latency_score,
            throughput_score,
            quality_score,
            reliability_score,
            composite,
            computed_at: Utc::now(),
        })
    }
}

fn clamp_pct(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

fn validate_sample(sample: &PerformanceSample) -> CoreResult<()> {
    if sample.model_id.trim().is_empty() {
        return Err(CoreError::InvalidInput("sample has an empty model_id".into()));
    }
    let fields = [
        ("latency_ms", sample.latency_ms),
        ("throughput_ops", sample.throughput_ops),
        ("accuracy_pct", sample.accuracy_pct),
        ("uptime_pct", sample.uptime_pct),
        ("error_rate_pct", sample.error_rate_pct),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "{}: {name} must be a non-negative number, got {value}",
                sample.model_id
            )));
        }
    }
    Ok(())
}

fn validate_baseline(baseline: &Baseline) -> CoreResult<()> {
    let fields = [
        ("max_latency_ms", baseline.max_latency_ms),
        ("target_throughput_ops", baseline.target_throughput_ops),
        ("target_accuracy_pct", baseline.target_accuracy_pct),
        ("expected_uptime_pct", baseline.expected_uptime_pct),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value <= 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "baseline {name} must be positive, got {value}"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
