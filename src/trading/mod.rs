//! Trading policy.
//!
//! Turns a Q-score plus the current holding into a Buy / Sell / Hold intent.
//! Keeps, per model, the last K composites and a count of consecutive
//! evaluations with a negative trend. Nothing else is remembered.

pub mod sizing;

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::config::CoreConfig;
use crate::types::{CoreError, CoreResult, Holding, QScore, TradeAction, TradeIntent};

/// Consecutive negative trends that force a sell.
const SELL_STREAK: u32 = 2;
/// Samples needed before a trend exists.
const MIN_HISTORY: usize = 2;

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

/// Trend reading over a model's rolling history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trend {
    /// Latest composite minus the mean of the ones before it.
    pub delta: f64,
    pub previous_mean: f64,
    /// Composite immediately before the latest one.
    pub previous: f64,
}

impl Trend {
    pub fn sign(&self) -> i8 {
        if self.delta > 0.0 {
            1
        } else if self.delta < 0.0 {
            -1
        } else {
            0
        }
    }
}

#[derive(Debug, Default)]
struct ModelHistory {
    composites: VecDeque<f64>,
    negative_streak: u32,
}

impl ModelHistory {
    fn push(&mut self, composite: f64, k: usize) {
        self.composites.push_back(composite);
        while self.composites.len() > k {
            self.composites.pop_front();
        }
        match self.trend() {
            Some(t) if t.delta < 0.0 => self.negative_streak += 1,
            _ => self.negative_streak = 0,
        }
    }

    fn trend(&self) -> Option<Trend> {
        let n = self.composites.len();
        if n < MIN_HISTORY {
            return None;
        }
        let latest = self.composites[n - 1];
        let previous = self.composites[n - 2];
        let previous_mean = self.composites.iter().take(n - 1).sum::<f64>() / (n - 1) as f64;
        Some(Trend {
            delta: latest - previous_mean,
            previous_mean,
            previous,
        })
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

pub struct TradingPolicy {
    buy_threshold: f64,
    sell_threshold: f64,
    target_holding_cap: u64,
    trend_window_k: usize,
    history: Mutex<HashMap<String, ModelHistory>>,
}

impl TradingPolicy {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            buy_threshold: config.buy_threshold,
            sell_threshold: config.sell_threshold,
            target_holding_cap: config.target_holding_cap,
            trend_window_k: config.trend_window_k.max(MIN_HISTORY),
            history: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ModelHistory>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a composite without deciding. Keeps the trend continuous
    /// when no holding could be read for the model.
    pub fn observe(&self, score: &QScore) {
        let mut history = self.lock();
        history
            .entry(score.model_id.clone())
            .or_default()
            .push(score.composite, self.trend_window_k);
    }

    /// Current trend for a model.
    pub fn trend(&self, model_id: &str) -> CoreResult<Trend> {
        let history = self.lock();
        let entry = history.get(model_id);
        entry.and_then(|h| h.trend()).ok_or_else(|| CoreError::InsufficientHistory {
            model_id: model_id.to_string(),
            have: entry.map(|h| h.composites.len()).unwrap_or(0),
            need: MIN_HISTORY,
        })
    }

    pub fn negative_streak(&self, model_id: &str) -> u32 {
        self.lock()
            .get(model_id)
            .map(|h| h.negative_streak)
            .unwrap_or(0)
    }

    /// Composites currently held for a model, oldest first.
    pub fn history(&self, model_id: &str) -> Vec<f64> {
        self.lock()
            .get(model_id)
            .map(|h| h.composites.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Record `score` and decide what to do with the model's tokens.
    pub fn decide(&self, score: &QScore, holding: &Holding) -> TradeIntent {
        let (trend, streak, len) = {
            let mut history = self.lock();
            let entry = history.entry(score.model_id.clone()).or_default();
            entry.push(score.composite, self.trend_window_k);
            (entry.trend(), entry.negative_streak, entry.composites.len())
        };

        let composite = score.composite;
        let intent = |action, size_hint: f64, confidence: f64, reason: String| TradeIntent {
            action,
            model_id: score.model_id.clone(),
            size_hint: size_hint.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            price_hint: sizing::unit_price(composite),
            reason,
            triggered_by: score.clone(),
        };

        let Some(trend) = trend else {
            debug!(
                model_id = %score.model_id,
                composite = format!("{composite:.1}"),
                "Insufficient history, holding"
            );
            return intent(
                TradeAction::Hold,
                0.0,
                0.0,
                format!("insufficient history ({}/{} samples)", len, MIN_HISTORY),
            );
        };
        let confidence = (len as f64 / self.trend_window_k as f64).min(1.0);

        let decision = if holding.compute_units > 0
            && (composite < self.sell_threshold || streak >= SELL_STREAK)
        {
            let gapped_down = composite < self.sell_threshold
                && streak < SELL_STREAK
                && trend.previous >= self.buy_threshold;
            if gapped_down {
                intent(
                    TradeAction::Hold,
                    0.0,
                    confidence,
                    format!(
                        "Q {composite:.1} gapped down from {:.1}, waiting for confirmation",
                        trend.previous
                    ),
                )
            } else {
                let depth = (self.sell_threshold - composite) / self.sell_threshold;
                let drop = if trend.previous_mean > 0.0 {
                    (trend.previous_mean - composite) / trend.previous_mean
                } else {
                    0.0
                };
                let reason = if streak >= SELL_STREAK {
                    format!("Q {composite:.1} falling for {streak} evaluations")
                } else {
                    format!("Q {composite:.1} below sell threshold {:.0}", self.sell_threshold)
                };
                intent(TradeAction::Sell, depth.max(drop), confidence, reason)
            }
        } else if composite >= self.buy_threshold
            && trend.delta >= 0.0
            && holding.compute_units < self.target_holding_cap
        {
            let span = 100.0 - self.buy_threshold;
            let size = if span > 0.0 {
                (composite - self.buy_threshold) / span
            } else {
                1.0
            };
            intent(
                TradeAction::Buy,
                size,
                confidence,
                format!("Q {composite:.1} strong and not falling (trend {:+.1})", trend.delta),
            )
        } else {
            intent(
                TradeAction::Hold,
                0.0,
                confidence,
                format!("Q {composite:.1} (trend {:+.1}), no signal", trend.delta),
            )
        };

        if decision.action.is_actionable() {
            info!(
                model_id = %decision.model_id,
                action = %decision.action,
                composite = format!("{composite:.1}"),
                size = format!("{:.2}", decision.size_hint),
                confidence = format!("{:.2}", decision.confidence),
                price = %decision.price_hint,
                "Trade intent"
            );
        } else {
            debug!(model_id = %decision.model_id, reason = %decision.reason, "Hold");
        }
        decision
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
