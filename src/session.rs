//! One running game: the current state, the engine that advances it and the
//! single place commands and ticks are serialized through.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use tracing::{debug, info};

use crate::commands::{self, Applied, Command, CommandError, LoadError};
use crate::engine::{Engine, EngineBuilder, EngineSettings, TickSummary};
use crate::grid::Coord;
use crate::scenario::Scenario;
use crate::state::{GameState, StateSummary};
use crate::storage::{BlobStore, RoomStore};

/// Wall-clock delay between ticks at `speed`; `None` when paused.
pub fn tick_interval(speed: u8) -> Option<Duration> {
    match speed {
        0 => None,
        1 => Some(Duration::from_millis(200)),
        2 => Some(Duration::from_millis(100)),
        _ => Some(Duration::from_millis(50)),
    }
}

pub struct Session {
    state: Arc<GameState>,
    engine: Engine,
}

impl Session {
    pub fn new(state: GameState, engine: Engine) -> Self {
        Self {
            state: Arc::new(state),
            engine,
        }
    }

    /// Build the opening state and a standard engine; autosave is enabled
    /// when `snapshot_dir` is set and the scenario has a non-zero interval.
    pub fn from_scenario(scenario: &Scenario, snapshot_dir: Option<PathBuf>) -> Result<Self> {
        let state = scenario
            .build_state()
            .with_context(|| format!("Failed to build scenario `{}`", scenario.name))?;
        let engine = EngineBuilder::standard(EngineSettings {
            scenario_name: scenario.name.clone(),
            snapshot_interval_ticks: scenario.snapshot_interval_ticks,
            snapshot_dir,
        })
        .build();
        info!(
            scenario = %scenario.name,
            size = state.size,
            balance = state.ledger.balance(),
            "session ready"
        );
        Ok(Self::new(state, engine))
    }

    pub fn scenario_name(&self) -> &str {
        self.engine.scenario_name()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// The last completed state. Cheap; readers never see a tick in progress.
    pub fn snapshot(&self) -> Arc<GameState> {
        Arc::clone(&self.state)
    }

    pub fn summary(&self) -> StateSummary {
        self.state.summary()
    }

    pub fn tick_interval(&self) -> Option<Duration> {
        tick_interval(self.state.speed)
    }

    pub fn tick(&mut self) -> Result<TickSummary> {
        let (next, summary) = self.engine.step(&self.state)?;
        self.state = Arc::new(next);
        Ok(summary)
    }

    pub fn run(&mut self, ticks: u64) -> Result<()> {
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(())
    }

    pub fn apply(&mut self, command: &Command) -> Result<Applied, CommandError> {
        match commands::apply(&self.state, command) {
            Ok((next, applied)) => {
                self.state = Arc::new(next);
                Ok(applied)
            }
            Err(err) => {
                debug!(?command, error = %err, "command rejected");
                Err(err)
            }
        }
    }

    pub fn place_at(&mut self, x: i32, y: i32, tool: &str) -> Result<Applied, CommandError> {
        self.apply(&Command::PlaceAt {
            x,
            y,
            tool: Some(tool.to_string()),
        })
    }

    pub fn remove_at(&mut self, x: i32, y: i32) -> Result<Applied, CommandError> {
        self.apply(&Command::RemoveAt { x, y })
    }

    pub fn set_speed(&mut self, speed: u8) -> Result<Applied, CommandError> {
        self.apply(&Command::SetSpeed { speed })
    }

    pub fn set_tool(&mut self, tool: &str) -> Result<Applied, CommandError> {
        self.apply(&Command::SetTool {
            tool: tool.to_string(),
        })
    }

    pub fn export_state(&self) -> Result<String, serde_json::Error> {
        commands::export_state(&self.state)
    }

    /// Replace the running state with an imported one. On failure the
    /// current state stays in place.
    pub fn load_state(&mut self, blob: &str) -> Result<(), LoadError> {
        let loaded = commands::load_state(blob)?;
        info!(tick = loaded.tick(), agents = loaded.agents.len(), "state loaded");
        self.state = Arc::new(loaded);
        Ok(())
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.state.grid.is_walkable(Coord::new(x, y))
    }

    pub fn save_to_room<S: BlobStore, R: Rng>(
        &self,
        rooms: &mut RoomStore<S>,
        rng: &mut R,
    ) -> Result<String> {
        let blob = self.export_state().context("Failed to export state")?;
        let code = rooms
            .create(blob.as_bytes(), rng)
            .context("Failed to store room")?;
        Ok(code)
    }

    pub fn load_from_room<S: BlobStore>(&mut self, rooms: &RoomStore<S>, code: &str) -> Result<()> {
        let bytes = rooms
            .load(code)
            .with_context(|| format!("Failed to read room {code}"))?;
        let blob = String::from_utf8(bytes).context("Room blob is not UTF-8")?;
        self.load_state(&blob)
            .with_context(|| format!("Room {code} holds an invalid state"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::state::Settings;
    use crate::storage::MemoryStore;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn session() -> Session {
        let state = GameState::new(Grid::new(8, true), Settings::default(), 2);
        let engine = EngineBuilder::standard(EngineSettings::headless("test")).build();
        Session::new(state, engine)
    }

    #[test]
    fn speed_maps_to_interval() {
        assert_eq!(tick_interval(0), None);
        assert_eq!(tick_interval(1), Some(Duration::from_millis(200)));
        assert_eq!(tick_interval(3), Some(Duration::from_millis(50)));
    }

    #[test]
    fn snapshots_are_not_disturbed_by_later_ticks() {
        let mut session = session();
        let before = session.snapshot();
        session.run(3).unwrap();
        assert_eq!(before.tick(), 0);
        assert_eq!(session.state().tick(), 3);
    }

    #[test]
    fn failed_load_keeps_the_current_state() {
        let mut session = session();
        session.place_at(0, 0, "path").unwrap();
        assert!(session.load_state("{\"version\": 1}").is_err());
        assert!(session.is_walkable(0, 0));
    }

    #[test]
    fn rooms_carry_saved_games() {
        let mut session = session();
        session.place_at(2, 2, "path").unwrap();
        let mut rooms = RoomStore::new(MemoryStore::new());
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let code = session.save_to_room(&mut rooms, &mut rng).unwrap();

        let mut other = self::session();
        other.load_from_room(&rooms, &code).unwrap();
        assert_eq!(other.export_state().unwrap(), session.export_state().unwrap());
    }
}
