//! External collaborators.
//!
//! Defines the three seams between the decision core and the outside world:
//! - `MetricSource`: yields windowed performance samples per model
//! - `LedgerView`: read-only projection of the token ledger
//! - `Bridge`: submits mints and transfers and reports their outcome
//!
//! Ships a JSON replay source and an in-memory simulated chain so the agent
//! runs without a live node.

pub mod replay;
pub mod simulated;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{
    CoreResult, Holding, QScore, TokenProperties, TradeAction, TxHandle, TxOutcome, WindowedSample,
};

/// Source of performance telemetry.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Next unseen sample for a model, or `None` if nothing new is available.
    async fn next_sample(&self, model_id: &str) -> CoreResult<Option<WindowedSample>>;
}

/// Read-only view of token ownership.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerView: Send + Sync {
    /// What `owner` holds for `model_id`.
    async fn get_holding(&self, owner: &str, model_id: &str) -> CoreResult<Holding>;

    /// Total compute units held by `owner` across all models.
    async fn balance_of(&self, owner: &str) -> CoreResult<u64>;

    /// Token ids owned by `owner`.
    async fn tokens_of(&self, owner: &str) -> CoreResult<Vec<String>>;

    async fn properties(&self, token_id: &str) -> CoreResult<Option<TokenProperties>>;
}

/// Transaction submission. Submitting and confirming are separate calls so
/// the caller can bound each with its own timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn mint(
        &self,
        model_id: &str,
        q_score: &QScore,
        compute_units: u64,
    ) -> CoreResult<TxHandle>;

    async fn transfer(
        &self,
        owner: &str,
        token_id: &str,
        to: &str,
        data: Option<Vec<u8>>,
    ) -> CoreResult<TxHandle>;

    async fn await_outcome(&self, handle: &TxHandle) -> CoreResult<TxOutcome>;
}

/// Payload attached to trade transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferData {
    pub action: TradeAction,
    /// Compute units to move; the rest of the token stays with the sender.
    pub units: u64,
    pub unit_price: Decimal,
}

impl TransferData {
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        serde_json::from_slice(bytes).ok()
    }
}
