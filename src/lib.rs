pub mod agents;
pub mod catalog;
pub mod clock;
pub mod coaster;
pub mod commands;
pub mod engine;
pub mod grid;
pub mod ledger;
pub mod pathfinding;
pub mod rng;
pub mod scenario;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod systems;
pub mod weather;
pub mod web;

pub use commands::{Applied, Command, CommandError, LoadError};
pub use engine::{Engine, EngineBuilder, EngineSettings, TickSummary};
pub use scenario::{Scenario, ScenarioLoader};
pub use session::Session;
pub use state::{GameState, Settings, StateSummary};
