//! Shared types for the CHATTEN agent.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that scoring, mint, trading,
//! and engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Performance telemetry
// ---------------------------------------------------------------------------

/// One observation window's worth of raw performance telemetry for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub model_id: String,
    /// Average inference latency in milliseconds.
    pub latency_ms: f64,
    /// Sustained operations per second.
    pub throughput_ops: f64,
    /// Benchmark accuracy (0–100).
    pub accuracy_pct: f64,
    /// Availability over the window (0–100).
    pub uptime_pct: f64,
    /// Share of failed requests (0–100).
    pub error_rate_pct: f64,
    pub observed_at: DateTime<Utc>,
}

impl fmt::Display for PerformanceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] latency={:.0}ms throughput={:.0}ops accuracy={:.1}% uptime={:.2}% errors={:.2}%",
            self.model_id,
            self.latency_ms,
            self.throughput_ops,
            self.accuracy_pct,
            self.uptime_pct,
            self.error_rate_pct,
        )
    }
}

impl PerformanceSample {
    /// Helper to build a test sample with sensible defaults.
    #[cfg(test)]
    pub fn sample(model_id: &str) -> Self {
        PerformanceSample {
            model_id: model_id.to_string(),
            latency_ms: 100.0,
            throughput_ops: 800.0,
            accuracy_pct: 90.0,
            uptime_pct: 99.0,
            error_rate_pct: 1.0,
            observed_at: Utc::now(),
        }
    }
}

/// Opaque, caller-assigned identifier of an observation window.
///
/// No time-bucketing is inferred: two samples belong to the same window
/// only if their source says so.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WindowId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WindowId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A sample tagged with the window it was observed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowedSample {
    pub window_id: WindowId,
    pub sample: PerformanceSample,
}

/// Normalisation reference supplied by the caller for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    /// Latency at or above which the latency sub-score floors at 0.
    pub max_latency_ms: f64,
    /// Throughput at or above which the throughput sub-score caps at 100.
    pub target_throughput_ops: f64,
    /// Benchmark accuracy the model is expected to reach.
    pub target_accuracy_pct: f64,
    /// Uptime the provider has committed to.
    pub expected_uptime_pct: f64,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            max_latency_ms: 200.0,
            target_throughput_ops: 1000.0,
            target_accuracy_pct: 90.0,
            expected_uptime_pct: 99.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Q-Score
// ---------------------------------------------------------------------------

/// Composite quality score for one window. Every field lies in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QScore {
    pub model_id: String,
    pub latency_score: f64,
    pub throughput_score: f64,
    pub quality_score: f64,
    pub reliability_score: f64,
    pub composite: f64,
    pub computed_at: DateTime<Utc>,
}

impl fmt::Display for QScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] Q={:.1} (latency {:.1} | throughput {:.1} | quality {:.1} | reliability {:.1})",
            self.model_id,
            self.composite,
            self.latency_score,
            self.throughput_score,
            self.quality_score,
            self.reliability_score,
        )
    }
}

impl QScore {
    /// The four sub-scores in weight order.
    pub fn components(&self) -> [f64; 4] {
        [
            self.latency_score,
            self.throughput_score,
            self.quality_score,
            self.reliability_score,
        ]
    }

    /// Build a score with a given composite and flat sub-scores (tests only).
    #[cfg(test)]
    pub fn with_composite(model_id: &str, composite: f64) -> Self {
        QScore {
            model_id: model_id.to_string(),
            latency_score: composite,
            throughput_score: composite,
            quality_score: composite,
            reliability_score: composite,
            composite,
            computed_at: Utc::now(),
        }
    }
}

/// Reference from a decision back to the score that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRef {
    pub composite: f64,
    pub computed_at: DateTime<Utc>,
}

impl From<&QScore> for ScoreRef {
    fn from(score: &QScore) -> Self {
        Self {
            composite: score.composite,
            computed_at: score.computed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Mint decisions
// ---------------------------------------------------------------------------

/// Why a window was (or was not) authorised for minting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MintReason {
    MeetsThreshold { composite: f64, threshold: f64 },
    /// Score below threshold. Terminal for the window.
    BelowThreshold { composite: f64, threshold: f64 },
    /// Bridge reported failure `attempts` times.
    MintFailed { attempts: u32 },
}

impl fmt::Display for MintReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MintReason::MeetsThreshold { composite, threshold } => {
                write!(f, "Q-score {composite:.1} meets mint threshold {threshold:.0}")
            }
            MintReason::BelowThreshold { composite, threshold } => {
                write!(f, "Q-score {composite:.1} below mint threshold {threshold:.0}")
            }
            MintReason::MintFailed { attempts } => {
                write!(f, "MintFailed: bridge failed {attempts} time(s)")
            }
        }
    }
}

/// The gate's verdict for one (model_id, window_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MintDecision {
    pub model_id: String,
    pub window_id: WindowId,
    pub score_ref: ScoreRef,
    pub eligible: bool,
    pub reason: MintReason,
    pub decided_at: DateTime<Utc>,
}

impl fmt::Display for MintDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {}: {}",
            self.model_id,
            self.window_id,
            if self.eligible { "ELIGIBLE" } else { "REJECTED" },
            self.reason,
        )
    }
}

/// Lifecycle of a window inside the mint gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MintState {
    /// Not yet judged by the gate.
    Pending,
    /// Authorised; `failures` bridge attempts have failed so far.
    Eligible { failures: u32 },
    Minted,
    Rejected { reason: MintReason },
}

impl MintState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MintState::Minted | MintState::Rejected { .. })
    }
}

impl fmt::Display for MintState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MintState::Pending => write!(f, "PENDING"),
            MintState::Eligible { failures } => write!(f, "ELIGIBLE (failures={failures})"),
            MintState::Minted => write!(f, "MINTED"),
            MintState::Rejected { reason } => write!(f, "REJECTED ({reason})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger projection
// ---------------------------------------------------------------------------

/// What an owner holds for one model, as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub owner: String,
    /// A token the owner can move for this model, if any.
    pub token_id: Option<String>,
    pub compute_units: u64,
    pub model_id: String,
}

impl Holding {
    /// An owner holding nothing for the model.
    pub fn empty(owner: &str, model_id: &str) -> Self {
        Self {
            owner: owner.to_string(),
            token_id: None,
            compute_units: 0,
            model_id: model_id.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.compute_units == 0
    }
}

impl fmt::Display for Holding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} holds {} units of {} (token {})",
            self.owner,
            self.compute_units,
            self.model_id,
            self.token_id.as_deref().unwrap_or("-"),
        )
    }
}

/// Token metadata as exposed by `properties(token_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenProperties {
    pub token_id: String,
    pub name: String,
    pub model_id: String,
    /// Integer Q-score recorded at mint time.
    pub q_score: u32,
    pub compute_units: u64,
    pub minted_amount: u64,
    pub minted_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Trading
// ---------------------------------------------------------------------------

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl TradeAction {
    /// Whether this action requires a bridge transaction.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, TradeAction::Hold)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
            TradeAction::Hold => write!(f, "HOLD"),
        }
    }
}

/// The trading policy's output for one score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub action: TradeAction,
    pub model_id: String,
    /// Fraction of the available room (Buy) or holding (Sell), 0–1.
    pub size_hint: f64,
    /// 0–1; zero when history was insufficient.
    pub confidence: f64,
    /// Indicative unit price derived from the composite.
    pub price_hint: Decimal,
    pub reason: String,
    pub triggered_by: QScore,
}

impl fmt::Display for TradeIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} size={:.0}% conf={:.0}% @ {} | {}",
            self.action,
            self.model_id,
            self.size_hint * 100.0,
            self.confidence * 100.0,
            self.price_hint,
            self.reason,
        )
    }
}

// ---------------------------------------------------------------------------
// Bridge transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Mint,
    Transfer,
}

/// Handle to a submitted (not yet confirmed) transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxHandle {
    pub id: String,
    pub kind: TxKind,
    pub submitted_at: DateTime<Utc>,
}

impl TxHandle {
    pub fn new(id: impl Into<String>, kind: TxKind) -> Self {
        Self {
            id: id.into(),
            kind,
            submitted_at: Utc::now(),
        }
    }
}

/// Final result of a transaction as reported by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TxOutcome {
    Confirmed { tx_id: String },
    Failed { error: String },
}

impl TxOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TxOutcome::Confirmed { .. })
    }
}

// ---------------------------------------------------------------------------
// Outcome reporting
// ---------------------------------------------------------------------------

/// Kind of terminal outcome reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    Minted,
    MintRejected,
    MintFailed,
    TradeExecuted,
    TradeFailed,
    SampleDiscarded,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Minted => write!(f, "Minted"),
            OutcomeKind::MintRejected => write!(f, "Rejected"),
            OutcomeKind::MintFailed => write!(f, "MintFailed"),
            OutcomeKind::TradeExecuted => write!(f, "TradeExecuted"),
            OutcomeKind::TradeFailed => write!(f, "TradeFailed"),
            OutcomeKind::SampleDiscarded => write!(f, "SampleDiscarded"),
        }
    }
}

/// A terminal outcome with enough context for a human to act on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeEvent {
    pub model_id: String,
    /// Window id for mint outcomes, action for trade outcomes.
    pub context: String,
    pub kind: OutcomeKind,
    pub reason: String,
    /// Transaction id when the bridge confirmed one.
    pub tx_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl OutcomeEvent {
    pub fn new(
        model_id: &str,
        context: impl Into<String>,
        kind: OutcomeKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            model_id: model_id.to_string(),
            context: context.into(),
            kind,
            reason: reason.into(),
            tx_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_tx(mut self, tx_id: impl Into<String>) -> Self {
        self.tx_id = Some(tx_id.into());
        self
    }

    /// Whether this outcome is a failure an operator should look at.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            OutcomeKind::MintFailed | OutcomeKind::TradeFailed | OutcomeKind::SampleDiscarded
        )
    }
}

impl fmt::Display for OutcomeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}: {}", self.model_id, self.context, self.kind, self.reason)?;
        if let Some(tx) = &self.tx_id {
            write!(f, " (tx {tx})")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Agent state
// ---------------------------------------------------------------------------

/// Agent lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Running => write!(f, "RUNNING"),
            AgentStatus::Paused => write!(f, "PAUSED"),
            AgentStatus::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Persistent agent counters, saved to disk after each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub cycle_count: u64,
    pub samples_scored: u64,
    pub samples_discarded: u64,
    pub mints_confirmed: u64,
    pub mints_failed: u64,
    pub windows_rejected: u64,
    pub trades_executed: u64,
    pub trades_failed: u64,
    pub start_time: DateTime<Utc>,
    pub status: AgentStatus,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | cycles={} | scored={} (discarded {}) | minted={} failed={} rejected={} | trades={} (failed {})",
            self.status,
            self.cycle_count,
            self.samples_scored,
            self.samples_discarded,
            self.mints_confirmed,
            self.mints_failed,
            self.windows_rejected,
            self.trades_executed,
            self.trades_failed,
        )
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentState {
    pub fn new() -> Self {
        Self {
            cycle_count: 0,
            samples_scored: 0,
            samples_discarded: 0,
            mints_confirmed: 0,
            mints_failed: 0,
            windows_rejected: 0,
            trades_executed: 0,
            trades_failed: 0,
            start_time: Utc::now(),
            status: AgentStatus::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == AgentStatus::Running
    }

    /// Share of mint attempts that ended confirmed, as a percentage.
    pub fn mint_success_rate(&self) -> f64 {
        let attempted = self.mints_confirmed + self.mints_failed;
        if attempted == 0 {
            0.0
        } else {
            (self.mints_confirmed as f64 / attempted as f64) * 100.0
        }
    }

    /// Fold one terminal outcome into the counters.
    pub fn record_outcome(&mut self, event: &OutcomeEvent) {
        match event.kind {
            OutcomeKind::Minted => self.mints_confirmed += 1,
            OutcomeKind::MintFailed => self.mints_failed += 1,
            OutcomeKind::MintRejected => self.windows_rejected += 1,
            OutcomeKind::TradeExecuted => self.trades_executed += 1,
            OutcomeKind::TradeFailed => self.trades_failed += 1,
            OutcomeKind::SampleDiscarded => self.samples_discarded += 1,
        }
    }

    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.start_time
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the decision core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient history for {model_id}: have {have} sample(s), need {need}")]
    InsufficientHistory {
        model_id: String,
        have: usize,
        need: usize,
    },

    #[error("Bridge timeout: {operation} exceeded {timeout_ms}ms")]
    BridgeTimeout { operation: String, timeout_ms: u64 },

    #[error("Bridge unavailable: {0}")]
    BridgeUnavailable(String),

    #[error("Mint failed for {model_id}/{window_id} after {attempts} attempt(s): {reason}")]
    MintFailed {
        model_id: String,
        window_id: WindowId,
        attempts: u32,
        reason: String,
    },

    #[error("Transfer failed for {model_id} after {attempts} attempt(s): {reason}")]
    TransferFailed {
        model_id: String,
        attempts: u32,
        reason: String,
    },

    #[error("Mint rejected for {model_id}/{window_id}: Q-score {composite:.1} below {threshold:.0}")]
    MintRejected {
        model_id: String,
        window_id: WindowId,
        composite: f64,
        threshold: f64,
    },

    #[error("Unknown window: {model_id}/{window_id}")]
    UnknownWindow { model_id: String, window_id: WindowId },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    /// Transient bridge errors are retried with backoff; everything else is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoreError::BridgeTimeout { .. } | CoreError::BridgeUnavailable(_)
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // -- WindowId --

    #[test]
    fn test_window_id_is_transparent_in_json() {
        let id = WindowId::new("w-0001");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"w-0001\"");
        let parsed: WindowId = serde_json::from_str("\"w-0002\"").unwrap();
        assert_eq!(parsed, WindowId::from("w-0002"));
    }

    #[test]
    fn test_window_id_display() {
        assert_eq!(format!("{}", WindowId::from("2026-10-19T12")), "2026-10-19T12");
    }

    // -- QScore --

    #[test]
    fn test_qscore_components_order() {
        let score = QScore {
            model_id: "m".into(),
            latency_score: 1.0,
            throughput_score: 2.0,
            quality_score: 3.0,
            reliability_score: 4.0,
            composite: 2.5,
            computed_at: Utc::now(),
        };
        assert_eq!(score.components(), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_qscore_display() {
        let score = QScore::with_composite("model-alpha", 79.5);
        let s = format!("{score}");
        assert!(s.contains("model-alpha"));
        assert!(s.contains("Q=79.5"));
    }

    #[test]
    fn test_score_ref_from_qscore() {
        let score = QScore::with_composite("m", 61.0);
        let r = ScoreRef::from(&score);
        assert_eq!(r.composite, 61.0);
        assert_eq!(r.computed_at, score.computed_at);
    }

    // -- MintReason / MintState --

    #[test]
    fn test_mint_reason_display() {
        let ok = MintReason::MeetsThreshold { composite: 79.5, threshold: 50.0 };
        assert_eq!(format!("{ok}"), "Q-score 79.5 meets mint threshold 50");
        let low = MintReason::BelowThreshold { composite: 42.3, threshold: 50.0 };
        assert_eq!(format!("{low}"), "Q-score 42.3 below mint threshold 50");
        let failed = MintReason::MintFailed { attempts: 3 };
        assert!(format!("{failed}").starts_with("MintFailed"));
    }

    #[test]
    fn test_mint_state_terminal() {
        assert!(!MintState::Pending.is_terminal());
        assert!(!MintState::Eligible { failures: 2 }.is_terminal());
        assert!(MintState::Minted.is_terminal());
        assert!(MintState::Rejected {
            reason: MintReason::MintFailed { attempts: 3 }
        }
        .is_terminal());
    }

    // -- Holding --

    #[test]
    fn test_holding_empty() {
        let h = Holding::empty("Nowner", "model-alpha");
        assert!(h.is_empty());
        assert!(h.token_id.is_none());
        assert!(format!("{h}").contains("token -"));
    }

    // -- TradeAction / TradeIntent --

    #[test]
    fn test_trade_action_display_and_actionable() {
        assert_eq!(format!("{}", TradeAction::Buy), "BUY");
        assert_eq!(format!("{}", TradeAction::Sell), "SELL");
        assert_eq!(format!("{}", TradeAction::Hold), "HOLD");
        assert!(TradeAction::Buy.is_actionable());
        assert!(TradeAction::Sell.is_actionable());
        assert!(!TradeAction::Hold.is_actionable());
    }

    #[test]
    fn test_trade_intent_display() {
        let intent = TradeIntent {
            action: TradeAction::Buy,
            model_id: "model-alpha".into(),
            size_hint: 0.5,
            confidence: 0.8,
            price_hint: dec!(0.865),
            reason: "strong and rising".into(),
            triggered_by: QScore::with_composite("model-alpha", 85.0),
        };
        let s = format!("{intent}");
        assert!(s.contains("BUY model-alpha"));
        assert!(s.contains("size=50%"));
        assert!(s.contains("conf=80%"));
    }

    // -- TxOutcome --

    #[test]
    fn test_tx_outcome_success() {
        assert!(TxOutcome::Confirmed { tx_id: "0xabc".into() }.is_success());
        assert!(!TxOutcome::Failed { error: "FAULT".into() }.is_success());
    }

    // -- OutcomeEvent --

    #[test]
    fn test_outcome_event_display_with_tx() {
        let e = OutcomeEvent::new("model-alpha", "w-1", OutcomeKind::Minted, "confirmed")
            .with_tx("0xdead");
        assert_eq!(format!("{e}"), "[model-alpha/w-1] Minted: confirmed (tx 0xdead)");
        assert!(!e.is_failure());
    }

    #[test]
    fn test_outcome_event_failure_kinds() {
        for kind in [OutcomeKind::MintFailed, OutcomeKind::TradeFailed, OutcomeKind::SampleDiscarded] {
            assert!(OutcomeEvent::new("m", "c", kind, "x").is_failure());
        }
        assert!(!OutcomeEvent::new("m", "c", OutcomeKind::MintRejected, "x").is_failure());
    }

    // -- AgentState --

    #[test]
    fn test_agent_state_new() {
        let state = AgentState::new();
        assert_eq!(state.cycle_count, 0);
        assert!(state.is_running());
        assert_eq!(state.mint_success_rate(), 0.0);
    }

    #[test]
    fn test_agent_state_record_outcome() {
        let mut state = AgentState::new();
        state.record_outcome(&OutcomeEvent::new("m", "w1", OutcomeKind::Minted, ""));
        state.record_outcome(&OutcomeEvent::new("m", "w2", OutcomeKind::Minted, ""));
        state.record_outcome(&OutcomeEvent::new("m", "w3", OutcomeKind::MintFailed, ""));
        state.record_outcome(&OutcomeEvent::new("m", "w4", OutcomeKind::MintRejected, ""));
        state.record_outcome(&OutcomeEvent::new("m", "BUY", OutcomeKind::TradeExecuted, ""));
        state.record_outcome(&OutcomeEvent::new("m", "w5", OutcomeKind::SampleDiscarded, ""));

        assert_eq!(state.mints_confirmed, 2);
        assert_eq!(state.mints_failed, 1);
        assert_eq!(state.windows_rejected, 1);
        assert_eq!(state.trades_executed, 1);
        assert_eq!(state.samples_discarded, 1);
        assert!((state.mint_success_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_agent_state_serialization_roundtrip() {
        let mut state = AgentState::new();
        state.cycle_count = 7;
        state.status = AgentStatus::Paused;
        let json = serde_json::to_string(&state).unwrap();
        let parsed: AgentState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.cycle_count, 7);
        assert_eq!(parsed.status, AgentStatus::Paused);
    }

    // -- CoreError --

    #[test]
    fn test_error_display() {
        let e = CoreError::BridgeTimeout {
            operation: "mint".into(),
            timeout_ms: 5000,
        };
        assert_eq!(format!("{e}"), "Bridge timeout: mint exceeded 5000ms");

        let e = CoreError::InsufficientHistory {
            model_id: "m".into(),
            have: 1,
            need: 2,
        };
        assert!(format!("{e}").contains("have 1 sample(s), need 2"));
    }

    #[test]
    fn test_error_transient_classification() {
        assert!(CoreError::BridgeUnavailable("rpc down".into()).is_transient());
        assert!(CoreError::BridgeTimeout { operation: "x".into(), timeout_ms: 1 }.is_transient());
        assert!(!CoreError::InvalidInput("negative latency".into()).is_transient());
        assert!(!CoreError::MintFailed {
            model_id: "m".into(),
            window_id: "w".into(),
            attempts: 3,
            reason: "x".into(),
        }
        .is_transient());
    }
}
