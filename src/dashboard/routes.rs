//! Status API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::accountant::CycleReport;
use crate::mint::{MintGate, WindowSnapshot};
use crate::scoring::analysis::ScoreStanding;
use crate::types::{AgentState, OutcomeEvent};

/// Cycles kept for `/api/cycles`.
const CYCLE_LOG_LIMIT: usize = 100;
/// Outcomes kept for `/api/events`.
const EVENT_LOG_LIMIT: usize = 500;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub agent: RwLock<AgentState>,
    pub cycle_log: RwLock<VecDeque<CycleLogEntry>>,
    pub recent_events: RwLock<VecDeque<OutcomeEvent>>,
    /// Ranking from the latest cycle that scored anything.
    pub standings: RwLock<Vec<ScoreStanding>>,
    pub gate: Arc<MintGate>,
}

impl DashboardState {
    pub fn new(initial_state: AgentState, gate: Arc<MintGate>) -> Self {
        Self {
            agent: RwLock::new(initial_state),
            cycle_log: RwLock::new(VecDeque::new()),
            recent_events: RwLock::new(VecDeque::new()),
            standings: RwLock::new(Vec::new()),
            gate,
        }
    }

    /// Publish the counters and report of a finished cycle.
    pub async fn record_cycle(&self, state: &AgentState, report: &CycleReport) {
        *self.agent.write().await = state.clone();

        {
            let mut log = self.cycle_log.write().await;
            log.push_back(CycleLogEntry::from(report));
            while log.len() > CYCLE_LOG_LIMIT {
                log.pop_front();
            }
        }

        if !report.standings.is_empty() {
            *self.standings.write().await = report.standings.clone();
        }

        let mut events = self.recent_events.write().await;
        events.extend(report.events.iter().cloned());
        while events.len() > EVENT_LOG_LIMIT {
            events.pop_front();
        }
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub cycle_count: u64,
    pub samples_scored: u64,
    pub samples_discarded: u64,
    pub mints_confirmed: u64,
    pub mints_failed: u64,
    pub windows_rejected: u64,
    pub mint_success_rate: f64,
    pub trades_executed: u64,
    pub trades_failed: u64,
    pub windows_tracked: usize,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleLogEntry {
    pub cycle_number: u64,
    pub timestamp: String,
    pub samples_scored: usize,
    pub mints_confirmed: usize,
    pub windows_rejected: usize,
    pub mints_failed: usize,
    pub trades_executed: usize,
    pub trades_failed: usize,
    pub avg_q_score: f64,
    pub market_trend: String,
    pub status: String,
}

impl From<&CycleReport> for CycleLogEntry {
    fn from(report: &CycleReport) -> Self {
        Self {
            cycle_number: report.cycle_number,
            timestamp: report.timestamp.to_rfc3339(),
            samples_scored: report.samples_scored,
            mints_confirmed: report.mints_confirmed,
            windows_rejected: report.windows_rejected,
            mints_failed: report.mints_failed,
            trades_executed: report.trades_executed,
            trades_failed: report.trades_failed,
            avg_q_score: report.analysis.avg_q_score,
            market_trend: report.analysis.trend.to_string(),
            status: report.status.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let agent = state.agent.read().await;

    Json(StatusResponse {
        status: agent.status.to_string(),
        cycle_count: agent.cycle_count,
        samples_scored: agent.samples_scored,
        samples_discarded: agent.samples_discarded,
        mints_confirmed: agent.mints_confirmed,
        mints_failed: agent.mints_failed,
        windows_rejected: agent.windows_rejected,
        mint_success_rate: agent.mint_success_rate(),
        trades_executed: agent.trades_executed,
        trades_failed: agent.trades_failed,
        windows_tracked: state.gate.window_count(),
        uptime_secs: agent.uptime().num_seconds(),
    })
}

/// GET /api/cycles
pub async fn get_cycles(State(state): State<AppState>) -> Json<Vec<CycleLogEntry>> {
    let log = state.cycle_log.read().await;
    Json(log.iter().cloned().collect())
}

/// GET /api/events
pub async fn get_events(State(state): State<AppState>) -> Json<Vec<OutcomeEvent>> {
    let events = state.recent_events.read().await;
    // Newest first
    Json(events.iter().rev().cloned().collect())
}

/// GET /api/scores
pub async fn get_scores(State(state): State<AppState>) -> Json<Vec<ScoreStanding>> {
    Json(state.standings.read().await.clone())
}

/// GET /api/windows
pub async fn get_windows(State(state): State<AppState>) -> Json<Vec<WindowSnapshot>> {
    Json(state.gate.snapshot().windows)
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
