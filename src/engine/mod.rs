use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::warn;

use crate::{
    rng::{RngManager, SystemId, SystemRng},
    snapshot::SnapshotWriter,
    state::GameState,
    systems::{
        AgentSystem, CalendarSystem, CoasterSystem, EconomySystem, StatsSystem, WeatherSystem,
    },
};

/// Simulated time per tick. Fixed so runs replay exactly.
pub const TICK_DELTA: f32 = 1.0;

pub struct EngineSettings {
    pub scenario_name: String,
    pub snapshot_interval_ticks: u64,
    /// Autosave root; `None` disables autosave.
    pub snapshot_dir: Option<PathBuf>,
}

impl EngineSettings {
    pub fn headless(scenario_name: impl Into<String>) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            snapshot_interval_ticks: 0,
            snapshot_dir: None,
        }
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System + Send>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    /// Calendar, agents, coasters, economy, weather, stats: the per-tick
    /// order every game mode runs.
    pub fn standard(settings: EngineSettings) -> Self {
        Self::new(settings)
            .with_system(CalendarSystem::new())
            .with_system(AgentSystem::new())
            .with_system(CoasterSystem::new())
            .with_system(EconomySystem::new())
            .with_system(WeatherSystem::new())
            .with_system(StatsSystem::new())
    }

    pub fn with_system(mut self, system: impl System + Send + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + Send + 'static) {
        self.systems.push(Box::new(system));
    }

    pub fn build(self) -> Engine {
        let snapshot_writer = self
            .settings
            .snapshot_dir
            .as_ref()
            .filter(|_| self.settings.snapshot_interval_ticks > 0)
            .map(|dir| SnapshotWriter::new(dir, self.settings.snapshot_interval_ticks));
        Engine {
            systems: self.systems,
            snapshot_writer,
            settings: self.settings,
        }
    }
}

pub struct Engine {
    systems: Vec<Box<dyn System + Send>>,
    snapshot_writer: Option<SnapshotWriter>,
    settings: EngineSettings,
}

impl Engine {
    pub fn scenario_name(&self) -> &str {
        &self.settings.scenario_name
    }

    /// Produce the state one tick after `state`. The input is never touched;
    /// on error the caller keeps its previous state.
    pub fn step(&mut self, state: &GameState) -> Result<(GameState, TickSummary)> {
        let mut next = state.clone();
        let tick = state.tick() + 1;
        let rng = RngManager::new(state.seed);
        let mut system_reports = Vec::with_capacity(self.systems.len());

        for system in &mut self.systems {
            let started = Instant::now();
            let ctx = SystemContext {
                tick,
                dt: TICK_DELTA,
                rng,
                scenario_name: &self.settings.scenario_name,
            };
            let mut stream = rng.stream(system.stream(), tick);
            system
                .run(&ctx, &mut next, &mut stream)
                .with_context(|| format!("system `{}` failed on tick {tick}", system.name()))?;
            system_reports.push(SystemRunReport {
                name: system.name().to_string(),
                duration_ms: started.elapsed().as_secs_f64() * 1_000.0,
            });
        }

        let snapshot_path = match &self.snapshot_writer {
            Some(writer) => match writer.maybe_write(&next, &self.settings.scenario_name) {
                Ok(path) => path,
                Err(err) => {
                    warn!(tick, error = %err, "autosave failed");
                    None
                }
            },
            None => None,
        };

        let summary = TickSummary {
            tick,
            date: next.calendar.to_string(),
            system_reports,
            snapshot_path,
        };
        Ok((next, summary))
    }

    pub fn run(&mut self, state: GameState, ticks: u64) -> Result<GameState> {
        self.run_with_hook(state, ticks, |_, _| {})
    }

    /// Run `ticks` ticks, handing every completed state to `hook`.
    pub fn run_with_hook<F>(&mut self, mut state: GameState, ticks: u64, mut hook: F) -> Result<GameState>
    where
        F: FnMut(&GameState, &TickSummary),
    {
        for _ in 0..ticks {
            let (next, summary) = self.step(&state)?;
            hook(&next, &summary);
            state = next;
        }
        Ok(state)
    }
}

#[derive(Clone, Debug)]
pub struct SystemRunReport {
    pub name: String,
    pub duration_ms: f64,
}

#[derive(Clone, Debug)]
pub struct TickSummary {
    pub tick: u64,
    pub date: String,
    pub system_reports: Vec<SystemRunReport>,
    pub snapshot_path: Option<PathBuf>,
}

pub struct SystemContext<'a> {
    /// The tick being produced.
    pub tick: u64,
    pub dt: f32,
    pub rng: RngManager,
    pub scenario_name: &'a str,
}

pub trait System {
    fn name(&self) -> &str;
    /// Random stream this system draws from.
    fn stream(&self) -> SystemId;
    fn run(&mut self, ctx: &SystemContext, state: &mut GameState, rng: &mut SystemRng) -> Result<()>;
}
