//! Cycle coordinator.
//!
//! One cycle at a time. Within a cycle every configured model is evaluated
//! in its own task under a semaphore of `worker_limit` permits:
//! sample → score → mint decision → holding → trade intent. Decisions are
//! logged and recorded before anything reaches the bridge; executions are
//! spawned once the worker permit is released and are all joined before
//! the cycle closes.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::executor::BridgeExecutor;
use super::with_timeout;
use crate::collaborators::{LedgerView, MetricSource};
use crate::config::{AppConfig, ScoringConfig};
use crate::mint::MintGate;
use crate::scoring::analysis::{self, ScoreStanding};
use crate::scoring::ScoreEngine;
use crate::trading::TradingPolicy;
use crate::types::{
    CoreError, Holding, MintDecision, OutcomeEvent, OutcomeKind, QScore, TradeIntent, WindowId,
    WindowedSample,
};

// ---------------------------------------------------------------------------
// Settings and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub models: Vec<String>,
    /// Address whose holdings drive the trading policy.
    pub owner: String,
    pub worker_limit: usize,
    /// Timeout for metric source and ledger calls.
    pub call_timeout_ms: u64,
    pub scoring: ScoringConfig,
}

impl CoordinatorSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            models: cfg.agent.models.clone(),
            owner: cfg.agent.owner_address.clone(),
            worker_limit: cfg.agent.worker_limit.max(1),
            call_timeout_ms: cfg.execution.call_timeout_ms,
            scoring: cfg.scoring.clone(),
        }
    }
}

/// Everything one cycle produced, before accounting.
#[derive(Debug, Clone, Default)]
pub struct CycleOutcome {
    pub scores: Vec<QScore>,
    /// Decisions made this cycle (cached re-evaluations excluded).
    pub decisions: Vec<MintDecision>,
    pub intents: Vec<TradeIntent>,
    pub events: Vec<OutcomeEvent>,
    /// This cycle's scores ranked, with improvement hints.
    pub standings: Vec<ScoreStanding>,
}

/// A spawned bridge execution and what to report if it dies.
struct Execution {
    model_id: String,
    context: String,
    kind_on_panic: OutcomeKind,
    handle: JoinHandle<Option<OutcomeEvent>>,
}

#[derive(Default)]
struct ModelReport {
    score: Option<QScore>,
    decision: Option<MintDecision>,
    intent: Option<TradeIntent>,
    events: Vec<OutcomeEvent>,
    executions: Vec<Execution>,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct Coordinator {
    settings: CoordinatorSettings,
    engine: ScoreEngine,
    gate: Arc<MintGate>,
    policy: Arc<TradingPolicy>,
    source: Arc<dyn MetricSource>,
    ledger: Arc<dyn LedgerView>,
    executor: Arc<BridgeExecutor>,
}

impl Coordinator {
    pub fn new(
        settings: CoordinatorSettings,
        engine: ScoreEngine,
        gate: Arc<MintGate>,
        policy: Arc<TradingPolicy>,
        source: Arc<dyn MetricSource>,
        ledger: Arc<dyn LedgerView>,
        executor: Arc<BridgeExecutor>,
    ) -> Self {
        Self {
            settings,
            engine,
            gate,
            policy,
            source,
            ledger,
            executor,
        }
    }

    pub fn gate(&self) -> &Arc<MintGate> {
        &self.gate
    }

    pub fn policy(&self) -> &Arc<TradingPolicy> {
        &self.policy
    }

    /// Run one full cycle and wait for every execution it started.
    pub async fn run_cycle(self: &Arc<Self>) -> CycleOutcome {
        let mut executions = Vec::new();

        // Windows left eligible by an earlier cycle or restored from disk
        for window in self.gate.retryable() {
            info!(
                model_id = %window.model_id,
                window_id = %window.window_id,
                failures = window.failures,
                "Resubmitting eligible window"
            );
            executions.push(self.spawn_mint(window.score, window.window_id));
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.worker_limit));
        let (models, tasks): (Vec<String>, Vec<_>) = self
            .settings
            .models
            .iter()
            .map(|model_id| {
                let this = Arc::clone(self);
                let semaphore = Arc::clone(&semaphore);
                let id = model_id.clone();
                let task = tokio::spawn(async move { this.evaluate_model(id, semaphore).await });
                (model_id.clone(), task)
            })
            .unzip();

        let mut outcome = CycleOutcome::default();
        for (model_id, result) in models.into_iter().zip(join_all(tasks).await) {
            match result {
                Ok(report) => {
                    outcome.scores.extend(report.score);
                    outcome.decisions.extend(report.decision);
                    outcome.intents.extend(report.intent);
                    outcome.events.extend(report.events);
                    executions.extend(report.executions);
                }
                Err(e) => {
                    warn!(model_id = %model_id, error = %e, "Evaluation task failed");
                    outcome.events.push(OutcomeEvent::new(
                        &model_id,
                        "evaluation",
                        OutcomeKind::SampleDiscarded,
                        format!("evaluation task failed: {e}"),
                    ));
                }
            }
        }

        debug!(pending = executions.len(), "Waiting for executions");
        let (labels, handles): (Vec<_>, Vec<_>) = executions
            .into_iter()
            .map(|e| ((e.model_id, e.context, e.kind_on_panic), e.handle))
            .unzip();
        for ((model_id, context, kind), result) in labels.into_iter().zip(join_all(handles).await) {
            match result {
                Ok(Some(event)) => outcome.events.push(event),
                Ok(None) => {}
                Err(e) => {
                    warn!(model_id = %model_id, context = %context, error = %e, "Execution task failed");
                    outcome.events.push(OutcomeEvent::new(
                        &model_id,
                        context,
                        kind,
                        format!("execution task failed: {e}"),
                    ));
                }
            }
        }

        outcome.standings = analysis::standings(&outcome.scores, self.gate.mint_threshold());
        outcome
    }

    async fn evaluate_model(self: Arc<Self>, model_id: String, semaphore: Arc<Semaphore>) -> ModelReport {
        let mut report = ModelReport::default();
        let Ok(permit) = semaphore.acquire_owned().await else {
            return report;
        };
        let timeout_ms = self.settings.call_timeout_ms;

        let WindowedSample { window_id, sample } = match with_timeout(
            "next_sample",
            timeout_ms,
            self.source.next_sample(&model_id),
        )
        .await
        {
            Ok(Some(w)) => w,
            Ok(None) => {
                debug!(model_id = %model_id, "No new sample");
                return report;
            }
            Err(e) => {
                warn!(model_id = %model_id, error = %e, "Metric source failed");
                return report;
            }
        };

        let scored = if sample.model_id != model_id {
            Err(CoreError::InvalidInput(format!(
                "sample for {} delivered as {model_id}",
                sample.model_id
            )))
        } else {
            self.engine
                .compute(&sample, &self.settings.scoring.baseline_for(&model_id))
        };
        let score = match scored {
            Ok(s) => s,
            Err(e) => {
                warn!(model_id = %model_id, window_id = %window_id, error = %e, "Sample discarded");
                report.events.push(OutcomeEvent::new(
                    &model_id,
                    window_id.as_str(),
                    OutcomeKind::SampleDiscarded,
                    e.to_string(),
                ));
                return report;
            }
        };

        let (decision, fresh) = self.gate.judge(&score, &window_id);
        // A window the gate already decided was scored before; keep it out
        // of the trend history.
        if !fresh {
            debug!(model_id = %model_id, window_id = %window_id, "Window already decided, not trading");
            report.score = Some(score);
            return report;
        }

        if !decision.eligible {
            let threshold = self.gate.mint_threshold();
            let rejection = CoreError::MintRejected {
                model_id: model_id.clone(),
                window_id: window_id.clone(),
                composite: score.composite,
                threshold,
            };
            let reason = match analysis::recommendations(&score, threshold).first() {
                Some(hint) => format!("{rejection}. {hint}"),
                None => rejection.to_string(),
            };
            report.events.push(OutcomeEvent::new(
                &model_id,
                window_id.as_str(),
                OutcomeKind::MintRejected,
                reason,
            ));
        }

        let trade = match with_timeout(
            "get_holding",
            timeout_ms,
            self.ledger.get_holding(&self.settings.owner, &model_id),
        )
        .await
        {
            Ok(holding) => Some((self.policy.decide(&score, &holding), holding)),
            Err(e) => {
                warn!(model_id = %model_id, error = %e, "Holding unavailable, score recorded without trading");
                self.policy.observe(&score);
                None
            }
        };

        drop(permit);

        if decision.eligible {
            report.executions.push(self.spawn_mint(score.clone(), window_id));
        }
        if let Some((intent, holding)) = trade {
            if intent.action.is_actionable() {
                report.executions.push(self.spawn_trade(intent.clone(), holding));
            }
            report.intent = Some(intent);
        }
        report.decision = Some(decision);
        report.score = Some(score);
        report
    }

    fn spawn_mint(&self, score: QScore, window_id: WindowId) -> Execution {
        let executor = Arc::clone(&self.executor);
        let model_id = score.model_id.clone();
        let context = window_id.to_string();
        let handle = tokio::spawn(async move { executor.execute_mint(&score, &window_id).await });
        Execution {
            model_id,
            context,
            kind_on_panic: OutcomeKind::MintFailed,
            handle,
        }
    }

    fn spawn_trade(&self, intent: TradeIntent, holding: Holding) -> Execution {
        let executor = Arc::clone(&self.executor);
        let model_id = intent.model_id.clone();
        let context = intent.action.to_string();
        let handle = tokio::spawn(async move { executor.execute_trade(&intent, &holding).await });
        Execution {
            model_id,
            context,
            kind_on_panic: OutcomeKind::TradeFailed,
            handle,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
