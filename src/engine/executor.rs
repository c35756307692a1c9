//! Bridge executor.
//!
//! Carries mint decisions and trade intents to the bridge. Every call is
//! bounded by a timeout; failures are retried with capped exponential
//! backoff. Once a transaction has a handle it is never submitted again:
//! an outcome that times out is polled through the same handle. Mint
//! attempts are counted by the mint gate, which decides when a window has
//! failed for good.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::with_timeout;
use crate::collaborators::{Bridge, LedgerView, TransferData};
use crate::config::{AppConfig, ExecutionConfig};
use crate::mint::MintGate;
use crate::trading::sizing;
use crate::types::{
    CoreError, CoreResult, Holding, MintState, OutcomeEvent, OutcomeKind, QScore, TradeAction,
    TradeIntent, TxHandle, TxOutcome, WindowId,
};

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Address that receives mints and holds the agent's tokens.
    pub owner: String,
    /// Counterparty for buys and sells.
    pub market: String,
    /// Attempts per transfer before it is reported as failed.
    pub retry_limit: u32,
    pub target_holding_cap: u64,
    pub execution: ExecutionConfig,
}

impl ExecutorSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            owner: cfg.agent.owner_address.clone(),
            market: cfg.agent.market_address.clone(),
            retry_limit: cfg.core.retry_limit,
            target_holding_cap: cfg.core.target_holding_cap,
            execution: cfg.execution.clone(),
        }
    }

    /// Delay before retry number `attempt` (1-based), capped.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1).min(32);
        self.execution
            .base_backoff_ms
            .saturating_mul(2u64.saturating_pow(exp))
            .min(self.execution.max_backoff_ms)
    }
}

/// Holds a mint gate claim and gives it back when dropped, including on
/// cancellation or panic.
struct AttemptClaim<'a> {
    gate: &'a MintGate,
    model_id: &'a str,
    window_id: &'a WindowId,
}

impl Drop for AttemptClaim<'_> {
    fn drop(&mut self) {
        self.gate.release(self.model_id, self.window_id);
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct BridgeExecutor {
    bridge: Arc<dyn Bridge>,
    ledger: Arc<dyn LedgerView>,
    gate: Arc<MintGate>,
    settings: ExecutorSettings,
}

impl BridgeExecutor {
    pub fn new(
        bridge: Arc<dyn Bridge>,
        ledger: Arc<dyn LedgerView>,
        gate: Arc<MintGate>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            bridge,
            ledger,
            gate,
            settings,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    fn timeout_ms(&self) -> u64 {
        self.settings.execution.call_timeout_ms
    }

    async fn backoff(&self, attempt: u32, what: &str, model_id: &str) {
        let delay = self.settings.backoff_ms(attempt);
        debug!(model_id, attempt, delay_ms = delay, "Retrying {what}");
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    /// Mint an eligible window.
    ///
    /// Returns `None` when the window cannot be claimed (not eligible, or
    /// another task is already submitting it). Otherwise keeps submitting
    /// until the bridge confirms or the gate rejects the window.
    pub async fn execute_mint(&self, score: &QScore, window_id: &WindowId) -> Option<OutcomeEvent> {
        let model_id = score.model_id.as_str();
        let prior_failures = match self.gate.begin_attempt(model_id, window_id) {
            Some(f) => f,
            None => {
                debug!(model_id, window_id = %window_id, "Window not claimable, skipping mint");
                return None;
            }
        };
        let _claim = AttemptClaim {
            gate: &self.gate,
            model_id,
            window_id,
        };
        if prior_failures > 0 {
            info!(model_id, window_id = %window_id, prior_failures, "Resuming mint");
        }

        let units = self.settings.execution.compute_units_per_mint;
        // A submitted mint whose outcome is still unknown; polled, never resubmitted
        let mut pending: Option<TxHandle> = None;
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                self.backoff(attempt, "mint", model_id).await;
            }
            attempt += 1;

            let handle = match pending.take() {
                Some(handle) => Ok(handle),
                None => {
                    with_timeout(
                        "mint",
                        self.timeout_ms(),
                        self.bridge.mint(&score.model_id, score, units),
                    )
                    .await
                }
            };
            let error = match handle {
                Err(e) => e.to_string(),
                Ok(handle) => {
                    let outcome = self.confirm(&handle).await;
                    match outcome {
                        Ok(TxOutcome::Confirmed { tx_id }) => {
                            if let Err(e) = self.gate.record_outcome(model_id, window_id, true) {
                                warn!(model_id, window_id = %window_id, error = %e, "Gate refused mint outcome");
                            }
                            info!(
                                model_id,
                                window_id = %window_id,
                                tx_id = %tx_id,
                                composite = format!("{:.1}", score.composite),
                                units,
                                "Mint confirmed"
                            );
                            let reason = format!(
                                "{units} compute units minted at Q {:.1}, amount {}",
                                score.composite,
                                sizing::minted_amount(units, score.composite)
                            );
                            return Some(
                                OutcomeEvent::new(model_id, window_id.as_str(), OutcomeKind::Minted, reason)
                                    .with_tx(tx_id),
                            );
                        }
                        Ok(TxOutcome::Failed { error }) => error,
                        Err(e) => {
                            debug!(model_id, tx_id = %handle.id, "Mint outcome unknown, polling again");
                            pending = Some(handle);
                            e.to_string()
                        }
                    }
                }
            };

            warn!(model_id, window_id = %window_id, attempt, error = %error, "Mint attempt failed");

            match self.gate.record_outcome(model_id, window_id, false) {
                Ok(MintState::Eligible { .. }) => continue,
                Ok(MintState::Rejected { reason }) => {
                    let failure = CoreError::MintFailed {
                        model_id: model_id.to_string(),
                        window_id: window_id.clone(),
                        attempts: attempt + prior_failures,
                        reason: error,
                    };
                    return Some(OutcomeEvent::new(
                        model_id,
                        window_id.as_str(),
                        OutcomeKind::MintFailed,
                        format!("{reason} ({failure})"),
                    ));
                }
                Ok(MintState::Minted) => {
                    return Some(OutcomeEvent::new(
                        model_id,
                        window_id.as_str(),
                        OutcomeKind::Minted,
                        "already minted",
                    ));
                }
                Ok(MintState::Pending) | Err(_) => {
                    return Some(OutcomeEvent::new(
                        model_id,
                        window_id.as_str(),
                        OutcomeKind::MintFailed,
                        format!("window no longer tracked: {error}"),
                    ));
                }
            }
        }
    }

    /// Wait for a submitted transaction, bounded by the call timeout.
    async fn confirm(&self, handle: &TxHandle) -> CoreResult<TxOutcome> {
        with_timeout("await_outcome", self.timeout_ms(), self.bridge.await_outcome(handle)).await
    }

    /// Carry out a trade intent against the current holding.
    ///
    /// Buys take a lot from the market address, sells hand one back.
    /// Transient bridge errors are retried; a transaction the chain
    /// rejects is reported at once.
    pub async fn execute_trade(&self, intent: &TradeIntent, holding: &Holding) -> Option<OutcomeEvent> {
        let model_id = intent.model_id.as_str();
        let action = intent.action;
        let failed = |reason: String| {
            warn!(model_id, action = %action, reason = %reason, "Trade failed");
            Some(OutcomeEvent::new(model_id, action.to_string(), OutcomeKind::TradeFailed, reason))
        };

        let (from, to, token_id, units) = match action {
            TradeAction::Hold => return None,
            TradeAction::Buy => {
                let supply = match with_timeout(
                    "get_holding",
                    self.timeout_ms(),
                    self.ledger.get_holding(&self.settings.market, model_id),
                )
                .await
                {
                    Ok(h) => h,
                    Err(e) => return failed(format!("market holding unavailable: {e}")),
                };
                let Some(token_id) = supply.token_id.clone() else {
                    return failed(format!("market has no supply of {model_id}"));
                };
                let units = sizing::buy_units(
                    intent.size_hint,
                    holding.compute_units,
                    self.settings.target_holding_cap,
                    self.settings.execution.max_trade_units,
                );
                (self.settings.market.clone(), self.settings.owner.clone(), token_id, units)
            }
            TradeAction::Sell => {
                let Some(token_id) = holding.token_id.clone() else {
                    return failed(format!("no {model_id} token to sell"));
                };
                let units = sizing::sell_units(
                    intent.size_hint,
                    holding.compute_units,
                    self.settings.execution.max_trade_units,
                );
                (self.settings.owner.clone(), self.settings.market.clone(), token_id, units)
            }
        };

        // Only one token moves per transfer
        let lot = match self.lot_size(&token_id).await {
            Ok(lot) => lot,
            Err(e) => return failed(format!("token {token_id} unavailable: {e}")),
        };
        let units = units.min(lot);
        if units == 0 {
            debug!(model_id, action = %action, "Nothing to trade");
            return None;
        }

        let data = TransferData {
            action,
            units,
            unit_price: intent.price_hint,
        }
        .to_bytes();

        let mut pending: Option<TxHandle> = None;
        let mut last_error = String::new();
        for attempt in 0..self.settings.retry_limit {
            if attempt > 0 {
                self.backoff(attempt, "transfer", model_id).await;
            }

            let handle = match pending.take() {
                Some(handle) => handle,
                None => match with_timeout(
                    "transfer",
                    self.timeout_ms(),
                    self.bridge.transfer(&from, &token_id, &to, Some(data.clone())),
                )
                .await
                {
                    Ok(handle) => handle,
                    Err(e) if e.is_transient() => {
                        debug!(model_id, attempt, error = %e, "Transfer submission failed");
                        last_error = e.to_string();
                        continue;
                    }
                    Err(e) => return failed(e.to_string()),
                },
            };

            let outcome = self.confirm(&handle).await;
            match outcome {
                Ok(TxOutcome::Confirmed { tx_id }) => {
                    info!(
                        model_id,
                        action = %action,
                        units,
                        price = %intent.price_hint,
                        tx_id = %tx_id,
                        "Trade executed"
                    );
                    let reason = format!("{action} {units} units @ {}", intent.price_hint);
                    return Some(
                        OutcomeEvent::new(model_id, action.to_string(), OutcomeKind::TradeExecuted, reason)
                            .with_tx(tx_id),
                    );
                }
                Ok(TxOutcome::Failed { error }) => {
                    return failed(format!("transfer rejected: {error}"));
                }
                Err(e) if e.is_transient() => {
                    debug!(model_id, attempt, tx_id = %handle.id, error = %e, "Transfer outcome unknown");
                    last_error = e.to_string();
                    pending = Some(handle);
                }
                Err(e) => return failed(e.to_string()),
            }
        }

        failed(
            CoreError::TransferFailed {
                model_id: model_id.to_string(),
                attempts: self.settings.retry_limit,
                reason: last_error,
            }
            .to_string(),
        )
    }

    async fn lot_size(&self, token_id: &str) -> CoreResult<u64> {
        match with_timeout("properties", self.timeout_ms(), self.ledger.properties(token_id)).await? {
            Some(props) => Ok(props.compute_units),
            None => Err(CoreError::InvalidInput(format!("unknown token {token_id}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
