//! Accountant: folds a cycle's outcomes into the agent counters and
//! produces the cycle report.
//!
//! Every terminal outcome is logged here exactly once, at info for
//! successes and rejections and at warn for failures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::coordinator::CycleOutcome;
use crate::scoring::analysis::{MarketAnalysis, ScoreStanding};
use crate::types::{AgentState, AgentStatus, OutcomeEvent, OutcomeKind, TradeIntent};

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Summary of a complete sample→score→decide→execute cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub samples_scored: usize,
    pub decisions: usize,
    pub mints_confirmed: usize,
    pub mints_failed: usize,
    pub windows_rejected: usize,
    pub trades_executed: usize,
    pub trades_failed: usize,
    pub samples_discarded: usize,
    pub intents: Vec<TradeIntent>,
    pub events: Vec<OutcomeEvent>,
    pub analysis: MarketAnalysis,
    /// Ranked scores with improvement hints.
    pub standings: Vec<ScoreStanding>,
    pub status: AgentStatus,
    pub timestamp: DateTime<Utc>,
}

impl CycleReport {
    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &OutcomeEvent> {
        self.events.iter().filter(|e| e.is_failure())
    }
}

// ---------------------------------------------------------------------------
// Accountant
// ---------------------------------------------------------------------------

pub struct Accountant;

impl Accountant {
    /// Reconcile a cycle: update counters, report outcomes, summarise.
    ///
    /// `previous_avg` is the previous cycle's average composite, used for
    /// the market trend.
    pub fn reconcile(
        state: &mut AgentState,
        outcome: CycleOutcome,
        previous_avg: Option<f64>,
    ) -> CycleReport {
        state.cycle_count += 1;
        state.samples_scored += outcome.scores.len() as u64;

        for event in &outcome.events {
            state.record_outcome(event);
            if event.is_failure() {
                warn!(
                    model_id = %event.model_id,
                    context = %event.context,
                    kind = %event.kind,
                    reason = %event.reason,
                    "Outcome"
                );
            } else {
                info!(
                    model_id = %event.model_id,
                    context = %event.context,
                    kind = %event.kind,
                    reason = %event.reason,
                    tx_id = event.tx_id.as_deref().unwrap_or("-"),
                    "Outcome"
                );
            }
        }

        let analysis = MarketAnalysis::summarize(&outcome.scores, previous_avg);
        let count = |kind: OutcomeKind| outcome.events.iter().filter(|e| e.kind == kind).count();

        let report = CycleReport {
            cycle_number: state.cycle_count,
            samples_scored: outcome.scores.len(),
            decisions: outcome.decisions.len(),
            mints_confirmed: count(OutcomeKind::Minted),
            mints_failed: count(OutcomeKind::MintFailed),
            windows_rejected: count(OutcomeKind::MintRejected),
            trades_executed: count(OutcomeKind::TradeExecuted),
            trades_failed: count(OutcomeKind::TradeFailed),
            samples_discarded: count(OutcomeKind::SampleDiscarded),
            intents: outcome.intents,
            events: outcome.events,
            analysis,
            standings: outcome.standings,
            status: state.status.clone(),
            timestamp: Utc::now(),
        };

        if let Some(top) = report.standings.first() {
            debug!(
                model_id = %top.model_id,
                composite = format!("{:.1}", top.composite),
                tier = %top.tier,
                hint = top.recommendations.first().map(String::as_str).unwrap_or("-"),
                "Top ranked model"
            );
        }

        info!(
            cycle = report.cycle_number,
            scored = report.samples_scored,
            minted = report.mints_confirmed,
            rejected = report.windows_rejected,
            trades = report.trades_executed,
            failures = report.failures().count(),
            market = %report.analysis,
            "Cycle reconciled"
        );

        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
