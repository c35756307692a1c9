//! In-memory chain.
//!
//! Implements `Bridge` and `LedgerView` over a token map with the compute
//! token contract's rules:
//! - mint requires a Q-score of at least 50 and a positive unit count
//! - minted amount is `compute_units * q_score / 100` (integer math)
//! - only the current owner can transfer a token
//! - a transfer carrying `TransferData` with fewer units than the token
//!   splits it, the remainder staying with the sender
//!
//! Contract violations confirm as `TxOutcome::Failed`, like a faulted
//! transaction. `fail_next` makes submissions error out for tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{Bridge, LedgerView, TransferData};
use crate::trading::sizing::minted_amount;
use crate::types::{
    CoreError, CoreResult, Holding, QScore, TokenProperties, TxHandle, TxKind, TxOutcome,
};

/// Minimum integer Q-score the contract accepts for a mint.
pub const MIN_Q_SCORE_FOR_MINT: u32 = 50;

#[derive(Debug, Clone)]
struct Token {
    owner: String,
    properties: TokenProperties,
}

#[derive(Debug, Default)]
struct ChainState {
    tokens: HashMap<String, Token>,
    outcomes: HashMap<String, TxOutcome>,
    fail_next: u32,
    mints_submitted: usize,
    transfers_submitted: usize,
}

pub struct SimulatedChain {
    /// Address that receives minted tokens.
    minter: String,
    confirm_delay: Duration,
    state: Mutex<ChainState>,
}

impl SimulatedChain {
    pub fn new(minter: &str) -> Self {
        Self {
            minter: minter.to_string(),
            confirm_delay: Duration::ZERO,
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Delay every `await_outcome` call by `delay`.
    pub fn with_confirm_delay(mut self, delay: Duration) -> Self {
        self.confirm_delay = delay;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next `n` submissions fail with `BridgeUnavailable`.
    pub fn fail_next(&self, n: u32) {
        self.lock().fail_next = n;
    }

    /// Give `owner` a token of `units` compute units for `model_id`.
    pub fn seed(&self, owner: &str, model_id: &str, units: u64) -> String {
        let token_id = Uuid::new_v4().to_string();
        let properties = TokenProperties {
            token_id: token_id.clone(),
            name: format!("Compute Token #{token_id}"),
            model_id: model_id.to_string(),
            q_score: 0,
            compute_units: units,
            minted_amount: units,
            minted_at: Utc::now(),
        };
        self.lock().tokens.insert(
            token_id.clone(),
            Token {
                owner: owner.to_string(),
                properties,
            },
        );
        token_id
    }

    pub fn owner_of(&self, token_id: &str) -> Option<String> {
        self.lock().tokens.get(token_id).map(|t| t.owner.clone())
    }

    pub fn mints_submitted(&self) -> usize {
        self.lock().mints_submitted
    }

    pub fn transfers_submitted(&self) -> usize {
        self.lock().transfers_submitted
    }

    fn take_injected_failure(state: &mut ChainState, operation: &str) -> CoreResult<()> {
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(CoreError::BridgeUnavailable(format!(
                "injected failure on {operation}"
            )));
        }
        Ok(())
    }

    fn record(state: &mut ChainState, kind: TxKind, outcome: impl FnOnce(&str) -> TxOutcome) -> TxHandle {
        let tx_id = format!("0x{}", Uuid::new_v4().simple());
        let result = outcome(&tx_id);
        state.outcomes.insert(tx_id.clone(), result);
        TxHandle::new(tx_id, kind)
    }
}

#[async_trait]
impl Bridge for SimulatedChain {
    async fn mint(
        &self,
        model_id: &str,
        q_score: &QScore,
        compute_units: u64,
    ) -> CoreResult<TxHandle> {
        let mut state = self.lock();
        Self::take_injected_failure(&mut state, "mint")?;
        state.mints_submitted += 1;

        let q = q_score.composite.clamp(0.0, 100.0).floor() as u32;
        if q < MIN_Q_SCORE_FOR_MINT || compute_units == 0 {
            let error = if compute_units == 0 {
                "FAULT: compute_units must be positive".to_string()
            } else {
                format!("FAULT: q_score {q} below minimum {MIN_Q_SCORE_FOR_MINT}")
            };
            return Ok(Self::record(&mut state, TxKind::Mint, |_| TxOutcome::Failed { error }));
        }

        let token_id = Uuid::new_v4().to_string();
        let properties = TokenProperties {
            token_id: token_id.clone(),
            name: format!("Compute Token #{token_id}"),
            model_id: model_id.to_string(),
            q_score: q,
            compute_units,
            minted_amount: minted_amount(compute_units, q_score.composite),
            minted_at: Utc::now(),
        };
        state.tokens.insert(
            token_id.clone(),
            Token {
                owner: self.minter.clone(),
                properties,
            },
        );
        debug!(model_id, token_id = %token_id, q_score = q, "Simulated mint");
        Ok(Self::record(&mut state, TxKind::Mint, |tx| TxOutcome::Confirmed {
            tx_id: tx.to_string(),
        }))
    }

    async fn transfer(
        &self,
        owner: &str,
        token_id: &str,
        to: &str,
        data: Option<Vec<u8>>,
    ) -> CoreResult<TxHandle> {
        let mut state = self.lock();
        Self::take_injected_failure(&mut state, "transfer")?;
        state.transfers_submitted += 1;

        let current_owner = state.tokens.get(token_id).map(|t| t.owner.clone());
        let fault = match current_owner {
            None => Some(format!("FAULT: unknown token {token_id}")),
            Some(o) if o != owner => Some(format!("FAULT: {owner} does not own {token_id}")),
            Some(_) => None,
        };
        if let Some(error) = fault {
            return Ok(Self::record(&mut state, TxKind::Transfer, |_| TxOutcome::Failed { error }));
        }

        let units = data.as_deref().and_then(TransferData::from_bytes).map(|d| d.units);
        let Some(token) = state.tokens.get_mut(token_id) else {
            return Err(CoreError::BridgeUnavailable(format!("token {token_id} vanished")));
        };
        match units {
            Some(n) if n > 0 && n < token.properties.compute_units => {
                token.properties.compute_units -= n;
                let mut split = token.properties.clone();
                let split_id = Uuid::new_v4().to_string();
                split.token_id = split_id.clone();
                split.name = format!("Compute Token #{split_id}");
                split.compute_units = n;
                state.tokens.insert(
                    split_id,
                    Token {
                        owner: to.to_string(),
                        properties: split,
                    },
                );
            }
            _ => token.owner = to.to_string(),
        }
        debug!(token_id, from = owner, to, ?units, "Simulated transfer");
        Ok(Self::record(&mut state, TxKind::Transfer, |tx| TxOutcome::Confirmed {
            tx_id: tx.to_string(),
        }))
    }

    async fn await_outcome(&self, handle: &TxHandle) -> CoreResult<TxOutcome> {
        if !self.confirm_delay.is_zero() {
            tokio::time::sleep(self.confirm_delay).await;
        }
        self.lock()
            .outcomes
            .get(&handle.id)
            .cloned()
            .ok_or_else(|| CoreError::BridgeUnavailable(format!("unknown transaction {}", handle.id)))
    }
}

#[async_trait]
impl LedgerView for SimulatedChain {
    async fn get_holding(&self, owner: &str, model_id: &str) -> CoreResult<Holding> {
        let state = self.lock();
        let mut owned: Vec<&Token> = state
            .tokens
            .values()
            .filter(|t| t.owner == owner && t.properties.model_id == model_id)
            .collect();
        if owned.is_empty() {
            return Ok(Holding::empty(owner, model_id));
        }
        // Largest token first so trades move the biggest lot available
        owned.sort_by(|a, b| {
            b.properties
                .compute_units
                .cmp(&a.properties.compute_units)
                .then_with(|| a.properties.token_id.cmp(&b.properties.token_id))
        });
        Ok(Holding {
            owner: owner.to_string(),
            token_id: Some(owned[0].properties.token_id.clone()),
            compute_units: owned.iter().map(|t| t.properties.compute_units).sum(),
            model_id: model_id.to_string(),
        })
    }

    async fn balance_of(&self, owner: &str) -> CoreResult<u64> {
        Ok(self
            .lock()
            .tokens
            .values()
            .filter(|t| t.owner == owner)
            .map(|t| t.properties.compute_units)
            .sum())
    }

    async fn tokens_of(&self, owner: &str) -> CoreResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .lock()
            .tokens
            .values()
            .filter(|t| t.owner == owner)
            .map(|t| t.properties.token_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn properties(&self, token_id: &str) -> CoreResult<Option<TokenProperties>> {
        Ok(self.lock().tokens.get(token_id).map(|t| t.properties.clone()))
    }
}
