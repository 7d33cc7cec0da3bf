use anyhow::Result;
use tracing::{debug, info};

use crate::{
    catalog::StructureKind,
    coaster::{trace_circuit, Coaster},
    engine::{System, SystemContext},
    grid::Coord,
    rng::{SystemId, SystemRng, COASTER_STREAM},
    state::GameState,
};

/// Keeps one [`Coaster`] per station with a closed circuit and runs its
/// trains. Coasters are rebuilt, with fresh trains, whenever their track
/// changes.
pub struct CoasterSystem;

impl CoasterSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CoasterSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for CoasterSystem {
    fn name(&self) -> &str {
        "coasters"
    }

    fn stream(&self) -> SystemId {
        COASTER_STREAM
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut GameState, _rng: &mut SystemRng) -> Result<()> {
        let stations: Vec<(Coord, bool)> = state
            .grid
            .structures()
            .filter(|(_, structure)| structure.kind == StructureKind::CoasterStation)
            .map(|(at, structure)| (at, structure.broken))
            .collect();
        let mut previous = std::mem::take(&mut state.coasters);
        let mut coasters = Vec::with_capacity(stations.len());

        for (station, broken) in stations {
            let existing = previous
                .iter()
                .position(|coaster| coaster.station == station)
                .map(|index| previous.swap_remove(index));
            let Some(circuit) = trace_circuit(&state.grid, station) else {
                if existing.is_some() {
                    info!(x = station.x, y = station.y, "coaster circuit broken, closing");
                }
                continue;
            };
            let mut coaster = match existing {
                Some(coaster) if coaster.runs_on(&state.grid, &circuit) => coaster,
                _ => {
                    info!(
                        x = station.x,
                        y = station.y,
                        length = circuit.len(),
                        "coaster circuit complete"
                    );
                    Coaster::new(&state.grid, station, circuit, &state.settings.coasters)
                }
            };
            coaster.step(!broken, &state.settings.coasters, ctx.dt);
            coasters.push(coaster);
        }
        for gone in previous {
            debug!(x = gone.station.x, y = gone.station.y, "coaster station removed");
        }
        state.coasters = coasters;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TrackPiece;
    use crate::coaster::TrainState;
    use crate::grid::{Grid, Structure};
    use crate::rng::RngManager;
    use crate::state::Settings;

    fn run_once(system: &mut CoasterSystem, state: &mut GameState) {
        let ctx = SystemContext {
            tick: state.tick(),
            dt: 1.0,
            rng: RngManager::new(1),
            scenario_name: "test",
        };
        let mut rng = RngManager::new(1).stream(COASTER_STREAM, ctx.tick);
        system.run(&ctx, state, &mut rng).unwrap();
    }

    /// Station at (1, 1) with a 3 x 3 ring of track around an empty middle.
    fn ring_state() -> GameState {
        let mut grid = Grid::new(6, true);
        for x in 1..=3 {
            for y in 1..=3 {
                let at = Coord::new(x, y);
                if at == Coord::new(2, 2) {
                    continue;
                }
                let tile = grid.tile_mut(at).unwrap();
                if at == Coord::new(1, 1) {
                    tile.structure = Some(Structure::new(StructureKind::CoasterStation, 0));
                } else {
                    tile.track = Some(TrackPiece::Straight);
                }
            }
        }
        GameState::new(grid, Settings::default(), 1)
    }

    #[test]
    fn complete_circuits_get_a_coaster_and_run() {
        let mut state = ring_state();
        let mut system = CoasterSystem::new();
        run_once(&mut system, &mut state);
        assert_eq!(state.coasters.len(), 1);
        assert_eq!(state.coasters[0].circuit.len(), 8);

        for _ in 0..400 {
            run_once(&mut system, &mut state);
        }
        assert!(state.coasters[0].laps > 0);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn broken_track_closes_the_coaster_and_new_track_rebuilds_it() {
        let mut state = ring_state();
        let mut system = CoasterSystem::new();
        for _ in 0..20 {
            run_once(&mut system, &mut state);
        }
        assert_eq!(state.coasters[0].trains[0].state, TrainState::Running);

        state.grid.tile_mut(Coord::new(3, 2)).unwrap().track = None;
        run_once(&mut system, &mut state);
        assert!(state.coasters.is_empty());

        state.grid.tile_mut(Coord::new(3, 2)).unwrap().track = Some(TrackPiece::SlopeDown);
        run_once(&mut system, &mut state);
        assert_eq!(state.coasters.len(), 1);
        assert_eq!(state.coasters[0].laps, 0);
        assert_eq!(state.coasters[0].trains[0].state, TrainState::Loading);
    }

    #[test]
    fn broken_down_station_dispatches_nothing() {
        let mut state = ring_state();
        state
            .grid
            .tile_mut(Coord::new(1, 1))
            .unwrap()
            .structure
            .as_mut()
            .unwrap()
            .broken = true;
        let mut system = CoasterSystem::new();
        for _ in 0..50 {
            run_once(&mut system, &mut state);
        }
        assert_eq!(state.coasters[0].trains[0].state, TrainState::Loading);
    }
}
