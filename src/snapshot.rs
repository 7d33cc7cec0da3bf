use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::commands::load_state;
use crate::state::{GameState, StateSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub scenario: String,
    pub tick: u64,
    pub date: String,
    /// Wall-clock time of the write, RFC 3339.
    pub written_at: String,
    pub summary: StateSummary,
}

#[derive(Serialize)]
struct SnapshotFile<'a> {
    metadata: SnapshotMetadata,
    state: &'a GameState,
}

#[derive(Deserialize)]
struct StoredSnapshot {
    metadata: SnapshotMetadata,
    state: serde_json::Value,
}

/// Writes a full state checkpoint every `interval_ticks` ticks to
/// `<root>/<scenario>/tick_NNNNNN.json`.
pub struct SnapshotWriter {
    root: PathBuf,
    interval_ticks: u64,
}

impl SnapshotWriter {
    pub fn new(root: impl AsRef<Path>, interval_ticks: u64) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            interval_ticks,
        }
    }

    pub fn maybe_write(&self, state: &GameState, scenario: &str) -> Result<Option<PathBuf>> {
        let tick = state.tick();
        if self.interval_ticks == 0 || tick == 0 || tick % self.interval_ticks != 0 {
            return Ok(None);
        }
        self.write(state, scenario).map(Some)
    }

    pub fn write(&self, state: &GameState, scenario: &str) -> Result<PathBuf> {
        let tick = state.tick();
        let dir = self.root.join(scenario);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot dir {}", dir.display()))?;
        let path = dir.join(format!("tick_{tick:06}.json"));

        let file = SnapshotFile {
            metadata: SnapshotMetadata {
                scenario: scenario.to_string(),
                tick,
                date: state.calendar.to_string(),
                written_at: chrono::Utc::now().to_rfc3339(),
                summary: state.summary(),
            },
            state,
        };
        let json = serde_json::to_string_pretty(&file).context("Failed to serialize snapshot")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
        debug!(tick, path = %path.display(), "snapshot written");
        Ok(path)
    }
}

/// Read a checkpoint back, running the same checks as an imported blob.
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<(SnapshotMetadata, GameState)> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let stored: StoredSnapshot = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let state = load_state(&stored.state.to_string())
        .with_context(|| format!("Snapshot {} holds an invalid state", path.display()))?;
    Ok((stored.metadata, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::state::Settings;

    #[test]
    fn writes_only_on_interval_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path(), 10);
        let mut state = GameState::new(Grid::new(6, true), Settings::default(), 4);
        assert!(writer.maybe_write(&state, "demo").unwrap().is_none());

        state.calendar = crate::clock::Calendar::at(10, &state.settings.calendar);
        let path = writer.maybe_write(&state, "demo").unwrap().unwrap();
        assert_eq!(path, dir.path().join("demo").join("tick_000010.json"));

        let (metadata, restored) = read_snapshot(&path).unwrap();
        assert_eq!(metadata.tick, 10);
        assert_eq!(metadata.scenario, "demo");
        assert_eq!(restored.tick(), 10);
        assert_eq!(restored.ledger, state.ledger);
    }
}
