//! CHATTEN agent binary.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores counters and mint windows from disk (or starts fresh), and
//! runs the sample→score→decide→execute loop with graceful shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use chatten::collaborators::replay::ReplaySource;
use chatten::collaborators::simulated::SimulatedChain;
use chatten::config;
use chatten::dashboard::{self, DashboardState};
use chatten::engine::accountant::{Accountant, CycleReport};
use chatten::engine::coordinator::{Coordinator, CoordinatorSettings};
use chatten::engine::executor::{BridgeExecutor, ExecutorSettings};
use chatten::mint::MintGate;
use chatten::scoring::{ScoreEngine, ScoreWeights};
use chatten::storage::{self, JsonSnapshotStore, SnapshotStore};
use chatten::trading::TradingPolicy;
use chatten::types::AgentState;

const BANNER: &str = r#"
  ____ _   _    _  _____ _____ _____ _   _
 / ___| | | |  / \|_   _|_   _| ____| \ | |
| |   | |_| | / _ \ | |   | | |  _| |  \| |
| |___|  _  |/ ___ \| |   | | | |___| |\  |
 \____|_| |_/_/   \_\_|   |_| |_____|_| \_|

  Q-Score mint and trade agent for AI compute
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;
    init_logging();

    println!("{BANNER}");
    info!(
        agent_name = %cfg.agent.name,
        models = cfg.agent.models.len(),
        cycle_interval_secs = cfg.agent.cycle_interval_secs,
        worker_limit = cfg.agent.worker_limit,
        "CHATTEN starting up"
    );

    // -- Restore or create state -----------------------------------------

    let state_path = cfg.storage.state_path.as_str();
    let mut state = match storage::load_state(Some(state_path))? {
        Some(s) => {
            info!(cycles = s.cycle_count, minted = s.mints_confirmed, "Resumed from saved state");
            s
        }
        None => {
            info!("Fresh start");
            AgentState::new()
        }
    };

    let snapshots = JsonSnapshotStore::new(&cfg.storage.mint_snapshot_path);
    let gate = Arc::new(match snapshots.load()? {
        Some(snapshot) => MintGate::restore(&cfg.core, snapshot),
        None => MintGate::new(&cfg.core),
    });

    // -- Initialise components -------------------------------------------

    let chain = Arc::new(SimulatedChain::new(&cfg.agent.owner_address));
    if cfg.simulation.seed_units > 0 {
        for model_id in &cfg.agent.models {
            chain.seed(&cfg.agent.market_address, model_id, cfg.simulation.seed_units);
        }
        info!(units = cfg.simulation.seed_units, "Market supply seeded");
    }

    let source = Arc::new(ReplaySource::load(&cfg.agent.samples_path)?);

    let engine = match cfg.scoring.weights {
        Some(w) => ScoreEngine::new(ScoreWeights::from_array(w).context("Invalid [scoring] weights")?),
        None => ScoreEngine::default(),
    };
    let policy = Arc::new(TradingPolicy::new(&cfg.core));
    let executor = Arc::new(BridgeExecutor::new(
        chain.clone(),
        chain.clone(),
        gate.clone(),
        ExecutorSettings::from_config(&cfg),
    ));
    let coordinator = Arc::new(Coordinator::new(
        CoordinatorSettings::from_config(&cfg),
        engine,
        gate.clone(),
        policy,
        source,
        chain,
        executor,
    ));

    let dashboard_state = if cfg.dashboard.enabled {
        let ds = Arc::new(DashboardState::new(state.clone(), gate.clone()));
        dashboard::spawn_dashboard(ds.clone(), cfg.dashboard.port);
        Some(ds)
    } else {
        None
    };

    // -- Main loop -------------------------------------------------------

    let mut interval = tokio::time::interval(Duration::from_secs(cfg.agent.cycle_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_secs = cfg.agent.cycle_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    let mut previous_avg: Option<f64> = None;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                info!(cycle = state.cycle_count + 1, "Starting cycle");
                let outcome = coordinator.run_cycle().await;
                let report = Accountant::reconcile(&mut state, outcome, previous_avg);
                if report.analysis.total_models > 0 {
                    previous_avg = Some(report.analysis.avg_q_score);
                }
                log_cycle_report(&report);

                // Persist after each cycle
                if let Err(e) = storage::save_state(&state, Some(state_path)) {
                    error!(error = %e, "Failed to save state");
                }
                if let Err(e) = snapshots.save(&gate.snapshot()) {
                    error!(error = %e, "Failed to save mint windows");
                }
                if let Some(ds) = &dashboard_state {
                    ds.record_cycle(&state, &report).await;
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    storage::save_state(&state, Some(state_path))?;
    snapshots.save(&gate.snapshot())?;
    info!(
        cycles = state.cycle_count,
        minted = state.mints_confirmed,
        mint_success = format!("{:.1}%", state.mint_success_rate()),
        trades = state.trades_executed,
        "CHATTEN shut down cleanly."
    );

    Ok(())
}

/// Log a human-readable cycle summary.
fn log_cycle_report(report: &CycleReport) {
    for intent in report.intents.iter().filter(|i| i.action.is_actionable()) {
        info!(intent = %intent, "Intent");
    }
    info!(
        cycle = report.cycle_number,
        scored = report.samples_scored,
        decisions = report.decisions,
        minted = report.mints_confirmed,
        rejected = report.windows_rejected,
        mint_failed = report.mints_failed,
        trades = report.trades_executed,
        trade_failed = report.trades_failed,
        discarded = report.samples_discarded,
        market = %report.analysis,
        "Cycle complete"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatten=info"));

    if std::env::var("CHATTEN_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
