//! Score analysis: tiers, improvement recommendations, model ranking,
//! and a market-wide summary of the latest cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::QScore;

/// Composite at or above which a model earns premium rates.
pub const EXCELLENT_THRESHOLD: f64 = 80.0;
/// Composite at or above which a model is considered good.
pub const GOOD_THRESHOLD: f64 = 60.0;
/// Sub-scores below this get an improvement recommendation.
const WEAK_COMPONENT: f64 = 50.0;
/// Cycle-over-cycle average change (points) treated as flat.
const TREND_BAND: f64 = 1.0;

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreTier {
    Excellent,
    Good,
    Mintable,
    BelowThreshold,
}

impl ScoreTier {
    /// Anything under the mint threshold is `BelowThreshold`, whatever
    /// the fixed tier lines say.
    pub fn classify(composite: f64, mint_threshold: f64) -> Self {
        if composite < mint_threshold {
            ScoreTier::BelowThreshold
        } else if composite >= EXCELLENT_THRESHOLD {
            ScoreTier::Excellent
        } else if composite >= GOOD_THRESHOLD {
            ScoreTier::Good
        } else {
            ScoreTier::Mintable
        }
    }
}

impl fmt::Display for ScoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreTier::Excellent => write!(f, "Excellent"),
            ScoreTier::Good => write!(f, "Good"),
            ScoreTier::Mintable => write!(f, "Mintable"),
            ScoreTier::BelowThreshold => write!(f, "Below threshold"),
        }
    }
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

/// Improvement hints for a provider, weakest areas first, tier line last.
pub fn recommendations(score: &QScore, mint_threshold: f64) -> Vec<String> {
    let mut out = Vec::new();

    if score.latency_score < WEAK_COMPONENT {
        out.push("Consider optimizing inference latency".to_string());
    }
    if score.throughput_score < WEAK_COMPONENT {
        out.push("Throughput could be improved with batching".to_string());
    }
    if score.quality_score < WEAK_COMPONENT {
        out.push("Model accuracy needs improvement".to_string());
    }
    if score.reliability_score < WEAK_COMPONENT {
        out.push("Improve uptime and reduce error rates".to_string());
    }

    let tier_line = match ScoreTier::classify(score.composite, mint_threshold) {
        ScoreTier::Excellent => "Excellent performance - eligible for premium rates",
        ScoreTier::Good | ScoreTier::Mintable => "Good performance - eligible for token minting",
        ScoreTier::BelowThreshold => "Below threshold - improvements needed before minting",
    };
    out.push(tier_line.to_string());

    out
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Models ordered by composite, highest first. Ties keep input order.
pub fn rank(scores: &[QScore]) -> Vec<&QScore> {
    let mut ranked: Vec<&QScore> = scores.iter().collect();
    ranked.sort_by(|a, b| {
        b.composite
            .partial_cmp(&a.composite)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// A model's place in one cycle's ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreStanding {
    /// 1-based.
    pub rank: usize,
    pub model_id: String,
    pub composite: f64,
    pub tier: ScoreTier,
    pub recommendations: Vec<String>,
}

/// Ranked scores with their tier and improvement hints.
pub fn standings(scores: &[QScore], mint_threshold: f64) -> Vec<ScoreStanding> {
    rank(scores)
        .into_iter()
        .enumerate()
        .map(|(i, s)| ScoreStanding {
            rank: i + 1,
            model_id: s.model_id.clone(),
            composite: s.composite,
            tier: ScoreTier::classify(s.composite, mint_threshold),
            recommendations: recommendations(s, mint_threshold),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Market analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketTrend {
    Up,
    Down,
    Stable,
}

impl fmt::Display for MarketTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketTrend::Up => write!(f, "up"),
            MarketTrend::Down => write!(f, "down"),
            MarketTrend::Stable => write!(f, "stable"),
        }
    }
}

/// Market-wide view of one cycle's scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub total_models: usize,
    pub avg_q_score: f64,
    /// Excellent-tier models, best first.
    pub top_performers: Vec<String>,
    pub trend: MarketTrend,
}

impl MarketAnalysis {
    /// Summarise `scores`, comparing the average with the previous cycle's.
    pub fn summarize(scores: &[QScore], previous_avg: Option<f64>) -> Self {
        if scores.is_empty() {
            return Self {
                total_models: 0,
                avg_q_score: 0.0,
                top_performers: Vec::new(),
                trend: MarketTrend::Stable,
            };
        }

        let avg = scores.iter().map(|s| s.composite).sum::<f64>() / scores.len() as f64;
        let top_performers = rank(scores)
            .into_iter()
            .filter(|s| s.composite >= EXCELLENT_THRESHOLD)
            .map(|s| s.model_id.clone())
            .collect();

        let trend = match previous_avg {
            Some(prev) if avg > prev + TREND_BAND => MarketTrend::Up,
            Some(prev) if avg < prev - TREND_BAND => MarketTrend::Down,
            _ => MarketTrend::Stable,
        };

        Self {
            total_models: scores.len(),
            avg_q_score: avg,
            top_performers,
            trend,
        }
    }
}

impl fmt::Display for MarketAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} models | avg Q={:.1} | trend {} | top: {}",
            self.total_models,
            self.avg_q_score,
            self.trend,
            if self.top_performers.is_empty() {
                "-".to_string()
            } else {
                self.top_performers.join(", ")
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
