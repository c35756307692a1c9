//! Scripted collaborators for integration testing.
//!
//! Provides a deterministic `MetricSource` whose samples and failures are
//! fully controllable from test code, and a `Rig` that wires it to the
//! simulated chain and the real decision pipeline. Everything stays
//! in-memory, with no external dependencies.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chatten::collaborators::simulated::SimulatedChain;
use chatten::collaborators::MetricSource;
use chatten::config::{CoreConfig, ExecutionConfig, ScoringConfig};
use chatten::engine::coordinator::{Coordinator, CoordinatorSettings};
use chatten::engine::executor::{BridgeExecutor, ExecutorSettings};
use chatten::mint::MintGate;
use chatten::scoring::ScoreEngine;
use chatten::trading::TradingPolicy;
use chatten::types::*;

pub const OWNER: &str = "NagentXXXXXXXXXXXXXXXXXXXXXXXXXXXX";
pub const MARKET: &str = "NmarketXXXXXXXXXXXXXXXXXXXXXXXXXXX";

/// Build a sample from raw telemetry.
pub fn sample(
    model_id: &str,
    latency_ms: f64,
    throughput_ops: f64,
    accuracy_pct: f64,
    uptime_pct: f64,
    error_rate_pct: f64,
) -> PerformanceSample {
    PerformanceSample {
        model_id: model_id.to_string(),
        latency_ms,
        throughput_ops,
        accuracy_pct,
        uptime_pct,
        error_rate_pct,
        observed_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Scripted metric source
// ---------------------------------------------------------------------------

/// A metric source that serves exactly what the test pushed.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    queues: Arc<Mutex<HashMap<String, VecDeque<WindowedSample>>>>,
    /// If set, every call returns this error.
    force_error: Arc<Mutex<Option<String>>>,
    calls: Arc<Mutex<usize>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a sample for its model under `window`.
    pub fn push(&self, window: &str, sample: PerformanceSample) {
        self.queues
            .lock()
            .unwrap()
            .entry(sample.model_id.clone())
            .or_default()
            .push_back(WindowedSample {
                window_id: WindowId::from(window),
                sample,
            });
    }

    /// Force all subsequent calls to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl MetricSource for ScriptedSource {
    async fn next_sample(&self, model_id: &str) -> CoreResult<Option<WindowedSample>> {
        *self.calls.lock().unwrap() += 1;
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(CoreError::BridgeUnavailable(msg));
        }
        Ok(self
            .queues
            .lock()
            .unwrap()
            .get_mut(model_id)
            .and_then(|q| q.pop_front()))
    }
}

// ---------------------------------------------------------------------------
// Rig
// ---------------------------------------------------------------------------

/// The full pipeline over a scripted source and a simulated chain.
pub struct Rig {
    pub source: ScriptedSource,
    pub chain: Arc<SimulatedChain>,
    pub gate: Arc<MintGate>,
    pub policy: Arc<TradingPolicy>,
    pub coordinator: Arc<Coordinator>,
}

/// Fast retries so failure paths finish quickly.
pub fn fast_execution() -> ExecutionConfig {
    ExecutionConfig {
        compute_units_per_mint: 100,
        max_trade_units: 50,
        call_timeout_ms: 1_000,
        base_backoff_ms: 1,
        max_backoff_ms: 4,
    }
}

impl Rig {
    pub fn new(models: &[&str]) -> Self {
        Self::with_gate(models, Arc::new(MintGate::new(&CoreConfig::default())))
    }

    /// Build around an existing gate, e.g. one restored from a snapshot.
    pub fn with_gate(models: &[&str], gate: Arc<MintGate>) -> Self {
        let core = CoreConfig::default();
        let source = ScriptedSource::new();
        let chain = Arc::new(SimulatedChain::new(OWNER));
        let policy = Arc::new(TradingPolicy::new(&core));

        let executor = Arc::new(BridgeExecutor::new(
            chain.clone(),
            chain.clone(),
            gate.clone(),
            ExecutorSettings {
                owner: OWNER.into(),
                market: MARKET.into(),
                retry_limit: core.retry_limit,
                target_holding_cap: core.target_holding_cap,
                execution: fast_execution(),
            },
        ));
        let coordinator = Arc::new(Coordinator::new(
            CoordinatorSettings {
                models: models.iter().map(|m| m.to_string()).collect(),
                owner: OWNER.into(),
                worker_limit: 2,
                call_timeout_ms: 1_000,
                scoring: ScoringConfig::default(),
            },
            ScoreEngine::default(),
            gate.clone(),
            policy.clone(),
            Arc::new(source.clone()),
            chain.clone(),
            executor,
        ));

        Self {
            source,
            chain,
            gate,
            policy,
            coordinator,
        }
    }
}
