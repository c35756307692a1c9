//! Replay metric source.
//!
//! Serves windowed samples from a JSON file, per model, in file order.
//! Used for demos and for the agent binary when no live telemetry feed
//! is wired in.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use super::MetricSource;
use crate::types::{CoreResult, WindowedSample};

pub struct ReplaySource {
    queues: Mutex<HashMap<String, VecDeque<WindowedSample>>>,
}

impl ReplaySource {
    pub fn from_samples(samples: Vec<WindowedSample>) -> Self {
        let mut queues: HashMap<String, VecDeque<WindowedSample>> = HashMap::new();
        for s in samples {
            queues
                .entry(s.sample.model_id.clone())
                .or_default()
                .push_back(s);
        }
        Self {
            queues: Mutex::new(queues),
        }
    }

    /// Load a JSON array of `WindowedSample`s.
    pub fn load(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read samples from {path}"))?;
        let samples: Vec<WindowedSample> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse samples in {path}"))?;
        info!(path, samples = samples.len(), "Replay samples loaded");
        Ok(Self::from_samples(samples))
    }

    /// Samples still queued for a model.
    pub fn remaining(&self, model_id: &str) -> usize {
        self.queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(model_id)
            .map(|q| q.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl MetricSource for ReplaySource {
    async fn next_sample(&self, model_id: &str) -> CoreResult<Option<WindowedSample>> {
        let next = self
            .queues
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(model_id)
            .and_then(|q| q.pop_front());
        if next.is_none() {
            debug!(model_id, "No replay sample left");
        }
        Ok(next)
    }
}
