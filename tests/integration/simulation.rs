//! Multi-cycle simulation harness.
//!
//! Replays scripted telemetry through the full sample→score→decide→execute
//! pipeline against the simulated chain and checks the counters, the mint
//! windows and the trades that come out the other end.

use std::collections::HashMap;
use std::sync::Arc;

use chatten::collaborators::LedgerView;
use chatten::config::CoreConfig;
use chatten::engine::accountant::{Accountant, CycleReport};
use chatten::mint::MintGate;
use chatten::scoring::analysis::MarketTrend;
use chatten::scoring::ScoreEngine;
use chatten::storage::{self, JsonSnapshotStore, SnapshotStore};
use chatten::types::*;

use crate::mock_collaborators::{sample, Rig, MARKET, OWNER};

/// Telemetry per window: (latency, throughput, accuracy, uptime, errors).
type Telemetry = (f64, f64, f64, f64, f64);

const ALPHA: [Telemetry; 6] = [
    (95.0, 850.0, 91.0, 99.5, 0.5),
    (90.0, 880.0, 92.0, 99.6, 0.4),
    (88.0, 900.0, 92.0, 99.7, 0.3),
    (85.0, 920.0, 93.0, 99.8, 0.3),
    (84.0, 940.0, 93.0, 99.8, 0.2),
    (80.0, 960.0, 94.0, 99.9, 0.2),
];

// Degrades steadily: composites 73.5, 69, 61.4, 51.8, 46, 41
const BETA: [Telemetry; 6] = [
    (120.0, 700.0, 86.0, 99.0, 1.0),
    (140.0, 650.0, 84.0, 98.5, 1.5),
    (170.0, 560.0, 80.0, 97.0, 2.5),
    (210.0, 420.0, 74.0, 95.0, 4.0),
    (260.0, 300.0, 68.0, 92.0, 6.0),
    (300.0, 220.0, 60.0, 90.0, 8.0),
];

// Third window carries a negative latency and must be discarded
const GAMMA: [Telemetry; 6] = [
    (150.0, 500.0, 70.0, 97.0, 3.0),
    (145.0, 520.0, 71.0, 97.5, 2.5),
    (-1.0, 510.0, 72.0, 97.0, 2.0),
    (140.0, 560.0, 73.0, 98.0, 2.0),
    (130.0, 600.0, 75.0, 98.2, 1.8),
    (125.0, 640.0, 76.0, 98.5, 1.5),
];

fn window(i: usize) -> String {
    format!("2026-10-19T{:02}:00Z", 12 + i)
}

fn push_series(rig: &Rig, model_id: &str, series: &[Telemetry]) {
    for (i, (l, t, a, u, e)) in series.iter().enumerate() {
        rig.source.push(&window(i), sample(model_id, *l, *t, *a, *u, *e));
    }
}

fn good(model_id: &str) -> PerformanceSample {
    sample(model_id, 100.0, 800.0, 90.0, 99.0, 1.0)
}

async fn run_cycles(rig: &Rig, state: &mut AgentState, n: usize) -> Vec<CycleReport> {
    let mut reports = Vec::new();
    let mut previous_avg = None;
    for _ in 0..n {
        let outcome = rig.coordinator.run_cycle().await;
        let report = Accountant::reconcile(state, outcome, previous_avg);
        if report.analysis.total_models > 0 {
            previous_avg = Some(report.analysis.avg_q_score);
        }
        reports.push(report);
    }
    reports
}

/// Mint outcomes only; trades on a replayed series are checked elsewhere.
fn mint_events(events: &[OutcomeEvent]) -> Vec<&OutcomeEvent> {
    events
        .iter()
        .filter(|e| {
            matches!(
                e.kind,
                OutcomeKind::Minted | OutcomeKind::MintRejected | OutcomeKind::MintFailed
            )
        })
        .collect()
}

fn temp_path(prefix: &str) -> String {
    std::env::temp_dir()
        .join(format!("{prefix}_{}.json", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string()
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_six_cycles_three_models() {
    let rig = Rig::new(&["model-alpha", "model-beta", "model-gamma"]);
    rig.chain.seed(MARKET, "model-alpha", 500);
    rig.chain.seed(OWNER, "model-beta", 200);
    push_series(&rig, "model-alpha", &ALPHA);
    push_series(&rig, "model-beta", &BETA);
    push_series(&rig, "model-gamma", &GAMMA);

    let mut state = AgentState::new();
    let reports = run_cycles(&rig, &mut state, 6).await;

    // 6 alpha + 4 beta + 5 gamma windows clear the threshold
    assert_eq!(state.cycle_count, 6);
    assert_eq!(state.samples_scored, 17);
    assert_eq!(state.mints_confirmed, 15);
    assert_eq!(state.windows_rejected, 2);
    assert_eq!(state.samples_discarded, 1);
    assert_eq!(state.mints_failed, 0);
    assert_eq!(state.trades_failed, 0);
    assert_eq!(rig.chain.mints_submitted(), 15);
    assert_eq!(rig.gate.minted_windows().len(), 15);

    let events: Vec<&OutcomeEvent> = reports.iter().flat_map(|r| r.events.iter()).collect();

    let rejected: Vec<_> = events
        .iter()
        .filter(|e| e.kind == OutcomeKind::MintRejected)
        .map(|e| (e.model_id.as_str(), e.context.clone()))
        .collect();
    assert_eq!(
        rejected,
        vec![("model-beta", window(4)), ("model-beta", window(5))]
    );

    let discarded = events
        .iter()
        .find(|e| e.kind == OutcomeKind::SampleDiscarded)
        .unwrap();
    assert_eq!(discarded.model_id, "model-gamma");
    assert_eq!(discarded.context, window(2));

    // Alpha rises and gets bought, beta falls and gets sold, gamma never trades
    let trades: HashMap<(&str, &str), usize> = events
        .iter()
        .filter(|e| e.kind == OutcomeKind::TradeExecuted)
        .fold(HashMap::new(), |mut acc, e| {
            *acc.entry((e.model_id.as_str(), e.context.as_str())).or_default() += 1;
            acc
        });
    assert_eq!(trades.get(&("model-alpha", "BUY")), Some(&5));
    assert!(trades.get(&("model-beta", "SELL")).copied().unwrap_or(0) >= 1);
    assert!(!trades.keys().any(|(m, _)| *m == "model-gamma"));
    assert!(!trades.contains_key(&("model-alpha", "SELL")));

    // The first cycle never trades: no history yet
    assert!(reports[0]
        .intents
        .iter()
        .all(|i| i.action == TradeAction::Hold));
    // Beta's first sell comes on the third sample, after two falling evaluations
    let first_beta_sell = reports
        .iter()
        .position(|r| {
            r.events
                .iter()
                .any(|e| e.model_id == "model-beta" && e.kind == OutcomeKind::TradeExecuted)
        })
        .unwrap();
    assert_eq!(first_beta_sell, 2);

    let alpha = rig.chain.get_holding(OWNER, "model-alpha").await.unwrap();
    assert_eq!(alpha.compute_units, 6 * 100 + 5 * 50);
    let market_alpha = rig.chain.get_holding(MARKET, "model-alpha").await.unwrap();
    assert_eq!(market_alpha.compute_units, 500 - 5 * 50);
}

#[tokio::test]
async fn test_market_analysis_follows_scores() {
    let rig = Rig::new(&["model-alpha", "model-beta"]);
    push_series(&rig, "model-alpha", &ALPHA[..2]);
    push_series(&rig, "model-beta", &BETA[..2]);

    let mut state = AgentState::new();
    let reports = run_cycles(&rig, &mut state, 2).await;

    let first = &reports[0].analysis;
    assert_eq!(first.total_models, 2);
    assert_eq!(first.top_performers, vec!["model-alpha".to_string()]);
    // (81.875 + 73.5) / 2
    assert!((first.avg_q_score - 77.6875).abs() < 1e-9);
    assert_eq!(first.trend, MarketTrend::Stable);
    // Second cycle averages (83.55 + 69) / 2, more than a point lower
    assert!((reports[1].analysis.avg_q_score - 76.275).abs() < 1e-9);
    assert_eq!(reports[1].analysis.trend, MarketTrend::Down);
}

// ---------------------------------------------------------------------------
// Bridge failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_transient_failures_recover_within_cycle() {
    let rig = Rig::new(&["m"]);
    rig.source.push("w1", good("m"));
    rig.chain.fail_next(2);

    let outcome = rig.coordinator.run_cycle().await;

    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].kind, OutcomeKind::Minted);
    assert!(outcome.events[0].tx_id.is_some());
    assert_eq!(rig.gate.state("m", &WindowId::from("w1")), MintState::Minted);
    assert_eq!(rig.chain.mints_submitted(), 1);
}

#[tokio::test]
async fn test_outage_rejects_window_after_retry_limit() {
    let rig = Rig::new(&["m"]);
    rig.source.push("w1", good("m"));
    rig.chain.fail_next(3);

    let outcome = rig.coordinator.run_cycle().await;
    assert_eq!(outcome.events.len(), 1);
    assert_eq!(outcome.events[0].kind, OutcomeKind::MintFailed);
    assert!(outcome.events[0].reason.contains("after 3 attempt(s)"));
    assert!(matches!(
        rig.gate.state("m", &WindowId::from("w1")),
        MintState::Rejected {
            reason: MintReason::MintFailed { attempts: 3 }
        }
    ));

    // Same window again: cached, nothing submitted. A new window mints.
    rig.source.push("w1", good("m"));
    rig.source.push("w2", good("m"));
    let second = rig.coordinator.run_cycle().await;
    assert!(mint_events(&second.events).is_empty());
    let third = rig.coordinator.run_cycle().await;
    let minted = mint_events(&third.events);
    assert_eq!(minted.len(), 1);
    assert_eq!(minted[0].kind, OutcomeKind::Minted);
    assert_eq!(minted[0].context, "w2");
    assert_eq!(rig.chain.mints_submitted(), 1);
}

#[tokio::test]
async fn test_below_threshold_never_minted() {
    let rig = Rig::new(&["m"]);
    rig.source.push("w1", sample("m", 400.0, 200.0, 40.0, 80.0, 10.0));

    let outcome = rig.coordinator.run_cycle().await;
    assert_eq!(outcome.events[0].kind, OutcomeKind::MintRejected);

    // A confirmation arriving for a rejected window changes nothing
    let w1 = WindowId::from("w1");
    let state = rig.gate.record_outcome("m", &w1, true).unwrap();
    assert!(matches!(state, MintState::Rejected { .. }));
    assert!(rig.gate.minted_windows().is_empty());
    assert!(rig.gate.retryable().is_empty());
    assert_eq!(rig.chain.mints_submitted(), 0);
}

// ---------------------------------------------------------------------------
// Source failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_source_outage_skips_models() {
    let rig = Rig::new(&["a", "b"]);
    rig.source.push("w1", good("a"));
    rig.source.set_error("telemetry feed down");

    let outcome = rig.coordinator.run_cycle().await;
    assert!(outcome.scores.is_empty());
    assert!(outcome.events.is_empty());
    assert_eq!(rig.source.calls(), 2);

    rig.source.clear_error();
    let outcome = rig.coordinator.run_cycle().await;
    assert_eq!(outcome.scores.len(), 1);
    assert_eq!(outcome.events[0].kind, OutcomeKind::Minted);
}

// ---------------------------------------------------------------------------
// Restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_restart_resumes_from_snapshot() {
    let core = CoreConfig::default();
    let store = JsonSnapshotStore::new(temp_path("chatten_it_mints"));
    let state_path = temp_path("chatten_it_state");

    // First run: w1 mints, w2 is left eligible after a failed attempt
    let rig = Rig::new(&["m"]);
    rig.source.push("w1", good("m"));
    let mut state = AgentState::new();
    run_cycles(&rig, &mut state, 1).await;

    let score = ScoreEngine::default()
        .compute(&good("m"), &Baseline::default())
        .unwrap();
    let w2 = WindowId::from("w2");
    assert!(rig.gate.evaluate(&score, &w2).eligible);
    rig.gate.record_outcome("m", &w2, false).unwrap();

    store.save(&rig.gate.snapshot()).unwrap();
    storage::save_state(&state, Some(&state_path)).unwrap();

    // Second run: fresh chain and policy, restored gate and counters
    let gate = Arc::new(MintGate::restore(&core, store.load().unwrap().unwrap()));
    let rig = Rig::with_gate(&["m"], gate);
    let mut state = storage::load_state(Some(&state_path)).unwrap().unwrap();
    assert_eq!(state.mints_confirmed, 1);

    // w1 shows up again from the source; only w2 goes to the bridge
    rig.source.push("w1", good("m"));
    let reports = run_cycles(&rig, &mut state, 1).await;

    assert_eq!(rig.chain.mints_submitted(), 1);
    assert_eq!(reports[0].mints_confirmed, 1);
    assert_eq!(reports[0].events[0].context, "w2");
    assert_eq!(reports[0].decisions, 0);
    assert_eq!(state.cycle_count, 2);
    assert_eq!(state.mints_confirmed, 2);
    assert_eq!(rig.gate.minted_windows().len(), 2);

    std::fs::remove_file(store.path()).unwrap();
    storage::delete_state(Some(&state_path)).unwrap();
}
