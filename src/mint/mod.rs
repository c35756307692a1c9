//! Mint gate.
//!
//! Decides, once per (model_id, window_id), whether a Q-score may be minted
//! and tracks each window until it is minted or rejected. All state sits
//! behind a single mutex that is never held across an `.await`.
//!
//! Lifecycle: `Pending → Eligible → Minted`, or `Pending → Rejected`, or
//! `Eligible → Rejected(MintFailed)` once the bridge has failed
//! `retry_limit` times.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::CoreConfig;
use crate::types::{
    CoreError, CoreResult, MintDecision, MintReason, MintState, QScore, ScoreRef, WindowId,
};

/// Identifies one observation window of one model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowKey {
    pub model_id: String,
    pub window_id: WindowId,
}

impl WindowKey {
    pub fn new(model_id: &str, window_id: &WindowId) -> Self {
        Self {
            model_id: model_id.to_string(),
            window_id: window_id.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct WindowRecord {
    decision: MintDecision,
    state: MintState,
    /// Score the decision was made on; needed to resubmit a mint.
    score: QScore,
    in_flight: bool,
}

/// An eligible window with no bridge call in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryableWindow {
    pub model_id: String,
    pub window_id: WindowId,
    pub score: QScore,
    pub failures: u32,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Serializable copy of the gate's window map. In-flight claims are not kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MintGateSnapshot {
    pub windows: Vec<WindowSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub decision: MintDecision,
    pub state: MintState,
    pub score: QScore,
}

impl MintGateSnapshot {
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

pub struct MintGate {
    mint_threshold: f64,
    retry_limit: u32,
    windows: Mutex<HashMap<WindowKey, WindowRecord>>,
}

impl MintGate {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            mint_threshold: config.mint_threshold,
            retry_limit: config.retry_limit,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Rebuild a gate from a snapshot taken by [`MintGate::snapshot`].
    pub fn restore(config: &CoreConfig, snapshot: MintGateSnapshot) -> Self {
        let gate = Self::new(config);
        {
            let mut windows = gate.lock();
            for w in snapshot.windows {
                let key = WindowKey::new(&w.decision.model_id, &w.decision.window_id);
                windows.insert(
                    key,
                    WindowRecord {
                        decision: w.decision,
                        state: w.state,
                        score: w.score,
                        in_flight: false,
                    },
                );
            }
            info!(windows = windows.len(), "Mint gate restored");
        }
        gate
    }

    pub fn mint_threshold(&self) -> f64 {
        self.mint_threshold
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    /// A poisoned lock still holds a consistent map: every mutation is a
    /// single assignment made before any code that could panic.
    fn lock(&self) -> MutexGuard<'_, HashMap<WindowKey, WindowRecord>> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Judge a window. The first call for a window decides it; later calls
    /// return the stored decision unchanged, whatever score they carry.
    pub fn evaluate(&self, score: &QScore, window_id: &WindowId) -> MintDecision {
        self.judge(score, window_id).0
    }

    /// Like [`MintGate::evaluate`], also reporting whether this call made
    /// the decision (`true`) or returned a stored one (`false`).
    pub fn judge(&self, score: &QScore, window_id: &WindowId) -> (MintDecision, bool) {
        let key = WindowKey::new(&score.model_id, window_id);
        let mut windows = self.lock();

        if let Some(record) = windows.get(&key) {
            debug!(
                model_id = %key.model_id,
                window_id = %key.window_id,
                state = %record.state,
                "Window already decided, returning cached decision"
            );
            return (record.decision.clone(), false);
        }

        let eligible = score.composite >= self.mint_threshold;
        let reason = if eligible {
            MintReason::MeetsThreshold {
                composite: score.composite,
                threshold: self.mint_threshold,
            }
        } else {
            MintReason::BelowThreshold {
                composite: score.composite,
                threshold: self.mint_threshold,
            }
        };
        let decision = MintDecision {
            model_id: score.model_id.clone(),
            window_id: window_id.clone(),
            score_ref: ScoreRef::from(score),
            eligible,
            reason: reason.clone(),
            decided_at: Utc::now(),
        };
        let state = if eligible {
            MintState::Eligible { failures: 0 }
        } else {
            MintState::Rejected { reason }
        };

        info!(
            model_id = %key.model_id,
            window_id = %key.window_id,
            composite = format!("{:.1}", score.composite),
            eligible,
            "Mint decision"
        );

        windows.insert(
            key,
            WindowRecord {
                decision: decision.clone(),
                state,
                score: score.clone(),
                in_flight: false,
            },
        );
        (decision, true)
    }

    /// Current state of a window; `Pending` if the gate has never seen it.
    pub fn state(&self, model_id: &str, window_id: &WindowId) -> MintState {
        self.lock()
            .get(&WindowKey::new(model_id, window_id))
            .map(|r| r.state.clone())
            .unwrap_or(MintState::Pending)
    }

    /// Stored decision for a window, if it has been judged.
    pub fn decision(&self, model_id: &str, window_id: &WindowId) -> Option<MintDecision> {
        self.lock()
            .get(&WindowKey::new(model_id, window_id))
            .map(|r| r.decision.clone())
    }

    /// Claim an eligible window for a bridge submission.
    ///
    /// Returns the failures recorded so far, or `None` if the window is not
    /// eligible or another caller already holds the claim.
    pub fn begin_attempt(&self, model_id: &str, window_id: &WindowId) -> Option<u32> {
        let mut windows = self.lock();
        let record = windows.get_mut(&WindowKey::new(model_id, window_id))?;
        match record.state {
            MintState::Eligible { failures } if !record.in_flight => {
                record.in_flight = true;
                Some(failures)
            }
            _ => None,
        }
    }

    /// Drop a claim taken by [`MintGate::begin_attempt`]. Idempotent.
    pub fn release(&self, model_id: &str, window_id: &WindowId) {
        if let Some(record) = self.lock().get_mut(&WindowKey::new(model_id, window_id)) {
            record.in_flight = false;
        }
    }

    /// Apply the bridge's verdict for one mint attempt.
    pub fn record_outcome(
        &self,
        model_id: &str,
        window_id: &WindowId,
        success: bool,
    ) -> CoreResult<MintState> {
        let mut windows = self.lock();
        let record = windows
            .get_mut(&WindowKey::new(model_id, window_id))
            .ok_or_else(|| CoreError::UnknownWindow {
                model_id: model_id.to_string(),
                window_id: window_id.clone(),
            })?;

        let failures = match record.state {
            MintState::Eligible { failures } => failures,
            ref terminal => {
                debug!(
                    model_id,
                    window_id = %window_id,
                    state = %terminal,
                    "Outcome for settled window ignored"
                );
                return Ok(terminal.clone());
            }
        };

        if success {
            record.state = MintState::Minted;
            record.in_flight = false;
            info!(model_id, window_id = %window_id, "Window minted");
            return Ok(MintState::Minted);
        }

        let failures = failures + 1;
        if failures >= self.retry_limit {
            let reason = MintReason::MintFailed { attempts: failures };
            record.state = MintState::Rejected {
                reason: reason.clone(),
            };
            record.decision.eligible = false;
            record.decision.reason = reason;
            record.in_flight = false;
            warn!(
                model_id,
                window_id = %window_id,
                attempts = failures,
                "Mint retries exhausted, window rejected"
            );
        } else {
            record.state = MintState::Eligible { failures };
            debug!(
                model_id,
                window_id = %window_id,
                failures,
                retry_limit = self.retry_limit,
                "Mint attempt failed"
            );
        }
        Ok(record.state.clone())
    }

    /// Eligible windows with no attempt in flight, in key order.
    pub fn retryable(&self) -> Vec<RetryableWindow> {
        let windows = self.lock();
        let mut out: Vec<RetryableWindow> = windows
            .iter()
            .filter_map(|(key, record)| match record.state {
                MintState::Eligible { failures } if !record.in_flight => Some(RetryableWindow {
                    model_id: key.model_id.clone(),
                    window_id: key.window_id.clone(),
                    score: record.score.clone(),
                    failures,
                }),
                _ => None,
            })
            .collect();
        out.sort_by(|a, b| {
            (&a.model_id, &a.window_id).cmp(&(&b.model_id, &b.window_id))
        });
        out
    }

    pub fn minted_windows(&self) -> BTreeSet<WindowKey> {
        self.lock()
            .iter()
            .filter(|(_, r)| r.state == MintState::Minted)
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn window_count(&self) -> usize {
        self.lock().len()
    }

    pub fn snapshot(&self) -> MintGateSnapshot {
        let windows = self.lock();
        let mut entries: Vec<(&WindowKey, &WindowRecord)> = windows.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        MintGateSnapshot {
            windows: entries
                .into_iter()
                .map(|(_, r)| WindowSnapshot {
                    decision: r.decision.clone(),
                    state: r.state.clone(),
                    score: r.score.clone(),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
