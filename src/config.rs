//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The file is read once at startup; the resulting structs are passed by
//! reference into component constructors. No component reads the process
//! environment.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use crate::types::{Baseline, CoreError, CoreResult};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    #[serde(default)]
    pub core: CoreConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    /// Address that receives mints and holds the agent's tokens.
    pub owner_address: String,
    /// Counterparty address for buys and sells.
    pub market_address: String,
    pub cycle_interval_secs: u64,
    /// Maximum number of models evaluated concurrently.
    pub worker_limit: usize,
    pub models: Vec<String>,
    /// JSON file of windowed samples replayed as the metric source.
    pub samples_path: String,
}

/// Thresholds and limits of the decision core.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// Minimum composite for a window to be mint-eligible.
    pub mint_threshold: f64,
    /// Compute units above which the policy stops buying a model.
    pub target_holding_cap: u64,
    /// Number of composites kept per model for trend detection.
    pub trend_window_k: usize,
    /// Bridge failures tolerated per window before it is rejected.
    pub retry_limit: u32,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            mint_threshold: 50.0,
            target_holding_cap: 1000,
            trend_window_k: 5,
            retry_limit: 3,
            buy_threshold: 70.0,
            sell_threshold: 40.0,
        }
    }
}

impl CoreConfig {
    /// Check ranges and orderings. Call once after loading.
    pub fn validate(&self) -> CoreResult<()> {
        for (name, v) in [
            ("mint_threshold", self.mint_threshold),
            ("buy_threshold", self.buy_threshold),
            ("sell_threshold", self.sell_threshold),
        ] {
            if !v.is_finite() || !(0.0..=100.0).contains(&v) {
                return Err(CoreError::Config(format!("{name} must lie in [0, 100], got {v}")));
            }
        }
        if self.sell_threshold >= self.buy_threshold {
            return Err(CoreError::Config(format!(
                "sell_threshold ({}) must be below buy_threshold ({})",
                self.sell_threshold, self.buy_threshold
            )));
        }
        if self.trend_window_k < 2 {
            return Err(CoreError::Config(format!(
                "trend_window_k must be at least 2, got {}",
                self.trend_window_k
            )));
        }
        if self.retry_limit == 0 {
            return Err(CoreError::Config("retry_limit must be at least 1".into()));
        }
        Ok(())
    }
}

/// Score weights and per-model baselines.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ScoringConfig {
    /// `[latency, throughput, quality, reliability]`; equal weights if absent.
    pub weights: Option<[f64; 4]>,
    pub default_baseline: Baseline,
    pub baselines: HashMap<String, Baseline>,
}

impl ScoringConfig {
    /// Baseline for a model, falling back to the default.
    pub fn baseline_for(&self, model_id: &str) -> Baseline {
        self.baselines
            .get(model_id)
            .copied()
            .unwrap_or(self.default_baseline)
    }
}

/// Bridge call timing and trade sizing.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    pub compute_units_per_mint: u64,
    /// Largest number of units moved by a single trade.
    pub max_trade_units: u64,
    pub call_timeout_ms: u64,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            compute_units_per_mint: 100,
            max_trade_units: 50,
            call_timeout_ms: 5_000,
            base_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub state_path: String,
    pub mint_snapshot_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: "chatten_state.json".into(),
            mint_snapshot_path: "chatten_mint_windows.json".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SimulationConfig {
    /// Units of each model given to the market address at startup.
    pub seed_units: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.core.validate()?;
        if config.agent.worker_limit == 0 {
            anyhow::bail!("agent.worker_limit must be at least 1");
        }
        if config.agent.cycle_interval_secs == 0 {
            anyhow::bail!("agent.cycle_interval_secs must be at least 1");
        }
        Ok(config)
    }
}
