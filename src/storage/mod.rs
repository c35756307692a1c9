//! Persistence layer.
//!
//! Agent counters and the mint gate's window table are saved as JSON after
//! every cycle. A missing file means a fresh start.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::mint::MintGateSnapshot;
use crate::types::AgentState;

/// Default state file path.
const DEFAULT_STATE_FILE: &str = "chatten_state.json";

/// Write `json` next to `path`, then rename it into place, so a crash
/// never leaves a half-written file.
fn write_atomic(path: &Path, json: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

/// Save agent state to a JSON file.
pub fn save_state(state: &AgentState, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(state).context("Failed to serialise agent state")?;

    write_atomic(Path::new(path), &json).context(format!("Failed to save state to {path}"))?;

    debug!(path, cycle_count = state.cycle_count, "State saved");
    Ok(())
}

/// Load agent state from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> Result<Option<AgentState>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path).context(format!("Failed to read state from {path}"))?;
    let state: AgentState =
        serde_json::from_str(&json).context(format!("Failed to parse state from {path}"))?;

    info!(
        path,
        cycle_count = state.cycle_count,
        minted = state.mints_confirmed,
        trades = state.trades_executed,
        "State loaded from disk"
    );

    Ok(Some(state))
}

/// Delete the state file (for testing or reset).
pub fn delete_state(path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    if Path::new(path).exists() {
        std::fs::remove_file(path).context(format!("Failed to delete state file {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Mint gate snapshots
// ---------------------------------------------------------------------------

/// Durable home for the mint gate's window table.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, snapshot: &MintGateSnapshot) -> Result<()>;
    /// `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<MintGateSnapshot>>;
}

pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for JsonSnapshotStore {
    fn save(&self, snapshot: &MintGateSnapshot) -> Result<()> {
        let json =
            serde_json::to_string_pretty(snapshot).context("Failed to serialise mint snapshot")?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("Failed to save mint snapshot to {}", self.path.display()))?;
        debug!(path = %self.path.display(), windows = snapshot.len(), "Mint snapshot saved");
        Ok(())
    }

    fn load(&self) -> Result<Option<MintGateSnapshot>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No mint snapshot found, starting with no windows");
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read mint snapshot from {}", self.path.display()))?;
        let snapshot: MintGateSnapshot = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse mint snapshot in {}", self.path.display()))?;
        info!(path = %self.path.display(), windows = snapshot.len(), "Mint snapshot loaded");
        Ok(Some(snapshot))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::mint::MintGate;
    use crate::types::{AgentStatus, MintState, QScore, WindowId};
    use tokio_test::{assert_err, assert_ok};

    fn temp_path(prefix: &str) -> String {
        let mut p = std::env::temp_dir();
        p.push(format!("{prefix}_{}.json", uuid::Uuid::new_v4()));
        p.to_string_lossy().to_string()
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("chatten_test_state");
        let state = AgentState::new();
        assert_ok!(save_state(&state, Some(&path)));

        let loaded = load_state(Some(&path)).unwrap();
        assert!(loaded.is_some());
        let loaded = loaded.unwrap();
        assert_eq!(loaded.cycle_count, 0);
        assert_eq!(loaded.status, AgentStatus::Running);
        assert_eq!(loaded.start_time, state.start_time);

        delete_state(Some(&path)).unwrap();
    }

    #[test]
    fn test_load_nonexistent() {
        let path = "/tmp/chatten_nonexistent_state_12345.json";
        let loaded = load_state(Some(path)).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_preserves_fields() {
        let path = temp_path("chatten_test_state");
        let mut state = AgentState::new();
        state.cycle_count = 42;
        state.samples_scored = 120;
        state.mints_confirmed = 30;
        state.mints_failed = 2;
        state.trades_executed = 9;

        save_state(&state, Some(&path)).unwrap();
        let loaded = load_state(Some(&path)).unwrap().unwrap();

        assert_eq!(loaded.cycle_count, 42);
        assert_eq!(loaded.samples_scored, 120);
        assert_eq!(loaded.mints_confirmed, 30);
        assert_eq!(loaded.mints_failed, 2);
        assert_eq!(loaded.trades_executed, 9);

        delete_state(Some(&path)).unwrap();
    }

    #[test]
    fn test_save_state_replaces_file_without_leftovers() {
        let path = temp_path("chatten_test_state");
        let mut state = AgentState::new();
        save_state(&state, Some(&path)).unwrap();
        state.cycle_count = 7;
        save_state(&state, Some(&path)).unwrap();

        assert_eq!(load_state(Some(&path)).unwrap().unwrap().cycle_count, 7);
        assert!(!Path::new(&path).with_extension("json.tmp").exists());

        delete_state(Some(&path)).unwrap();
    }

    #[test]
    fn test_load_corrupt_state_fails() {
        let path = temp_path("chatten_test_state");
        std::fs::write(&path, "{ not json").unwrap();
        assert_err!(load_state(Some(&path)));
        delete_state(Some(&path)).unwrap();
    }

    #[test]
    fn test_delete_nonexistent_ok() {
        let result = delete_state(Some("/tmp/chatten_does_not_exist_xyz.json"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_snapshot_store_roundtrip() {
        let store = JsonSnapshotStore::new(temp_path("chatten_test_mints"));
        assert!(store.load().unwrap().is_none());

        let core = CoreConfig::default();
        let gate = MintGate::new(&core);
        gate.evaluate(&QScore::with_composite("a", 80.0), &WindowId::from("w1"));
        gate.record_outcome("a", &WindowId::from("w1"), true).unwrap();
        gate.evaluate(&QScore::with_composite("b", 20.0), &WindowId::from("w1"));
        gate.evaluate(&QScore::with_composite("c", 65.0), &WindowId::from("w1"));

        store.save(&gate.snapshot()).unwrap();
        let restored = MintGate::restore(&core, store.load().unwrap().unwrap());

        assert_eq!(restored.window_count(), 3);
        assert_eq!(restored.state("a", &WindowId::from("w1")), MintState::Minted);
        assert!(restored.state("b", &WindowId::from("w1")).is_terminal());
        assert_eq!(restored.retryable().len(), 1);

        std::fs::remove_file(store.path()).unwrap();
    }
}
