//! Roller coasters. A coaster is a station plus a closed loop of track tiles;
//! its trains cycle through loading, dispatch, a running lap and braking back
//! into the station.

use serde::{Deserialize, Serialize};

use crate::catalog::{StructureKind, TrackPiece};
use crate::grid::{Coord, Grid};
use crate::state::CoasterSettings;

/// Shortest rideable circuit, station included.
pub const MIN_CIRCUIT: usize = 4;
/// Gap between consecutive cars, in tiles.
pub const CAR_SPACING: f32 = 0.18;

const RUN_SPEED: f32 = 0.08;
const BRAKE_SPEED: f32 = 0.03;
const DISPATCH_SPEED: f32 = 0.02;
const DISPATCH_RAMP: f32 = 0.04;
/// Distance before the station at which running trains start braking.
const BRAKE_ZONE: f32 = 3.0;
/// Distance before the station at which a braking train berths.
const BERTH: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainState {
    #[default]
    Loading,
    Dispatching,
    Running,
    Braking,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Train {
    pub state: TrainState,
    /// Ticks left in the loading or dispatch phase.
    pub timer: u32,
    /// Lead car position along the circuit in tiles; 0 is the station.
    pub progress: f32,
    pub velocity: f32,
    pub cars: u32,
}

impl Train {
    pub fn new(cars: u32, load_ticks: u32) -> Self {
        Self {
            state: TrainState::Loading,
            timer: load_ticks.max(1),
            progress: 0.0,
            velocity: 0.0,
            cars,
        }
    }

    /// Position of every car, lead first, wrapped onto a circuit of `length`
    /// tiles.
    pub fn car_positions(&self, length: usize) -> Vec<f32> {
        let length = length.max(1) as f32;
        (0..self.cars)
            .map(|car| (self.progress - car as f32 * CAR_SPACING).rem_euclid(length))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coaster {
    pub station: Coord,
    /// Tiles in travel order, starting at the station.
    pub circuit: Vec<Coord>,
    /// Piece under each circuit tile; `None` at the station.
    pub pieces: Vec<Option<TrackPiece>>,
    pub trains: Vec<Train>,
    /// Completed laps across all trains.
    pub laps: u64,
}

impl Coaster {
    pub fn new(
        grid: &Grid,
        station: Coord,
        circuit: Vec<Coord>,
        settings: &CoasterSettings,
    ) -> Self {
        let pieces = pieces_along(grid, &circuit);
        let trains = (0..settings.trains.max(1))
            .map(|_| Train::new(settings.cars_per_train, settings.load_ticks))
            .collect();
        Self {
            station,
            circuit,
            pieces,
            trains,
            laps: 0,
        }
    }

    /// True when `circuit` and the track under it are what this coaster was
    /// built from.
    pub fn runs_on(&self, grid: &Grid, circuit: &[Coord]) -> bool {
        self.circuit == circuit && self.pieces == pieces_along(grid, circuit)
    }

    fn speed_factor(&self, progress: f32) -> f32 {
        let length = self.pieces.len().max(1);
        let index = (progress.max(0.0) as usize) % length;
        self.pieces
            .get(index)
            .copied()
            .flatten()
            .map_or(1.0, TrackPiece::speed_factor)
    }

    /// One tick for every train. A closed coaster lets trains on the track
    /// finish their lap but dispatches nothing new.
    ///
    /// Only one train uses the platform at a time: the first loading train
    /// counts down, the rest wait in line, and braking trains hold short of
    /// the station until the platform is free.
    pub fn step(&mut self, open: bool, settings: &CoasterSettings, dt: f32) {
        let length = self.circuit.len() as f32;
        let dispatching = self
            .trains
            .iter()
            .any(|train| train.state == TrainState::Dispatching);
        let platform = if dispatching {
            None
        } else {
            self.trains
                .iter()
                .position(|train| train.state == TrainState::Loading)
        };
        let mut berth_free = !dispatching && platform.is_none();
        let dispatch_ticks = settings.dispatch_ticks.max(1);

        for index in 0..self.trains.len() {
            let factor = self.speed_factor(self.trains[index].progress);
            let train = &mut self.trains[index];
            match train.state {
                TrainState::Loading => {
                    train.progress = 0.0;
                    train.velocity = 0.0;
                    if platform != Some(index) || !open {
                        continue;
                    }
                    train.timer = train.timer.saturating_sub(1);
                    if train.timer == 0 {
                        train.state = TrainState::Dispatching;
                        train.timer = dispatch_ticks;
                    }
                }
                TrainState::Dispatching => {
                    train.timer = train.timer.saturating_sub(1);
                    let ramp = 1.0 - train.timer as f32 / dispatch_ticks as f32;
                    train.velocity = (DISPATCH_SPEED + ramp * DISPATCH_RAMP) * factor;
                    train.progress += train.velocity * dt;
                    if train.timer == 0 {
                        train.state = TrainState::Running;
                    }
                }
                TrainState::Running => {
                    train.velocity = RUN_SPEED * factor;
                    train.progress += train.velocity * dt;
                    if length - train.progress <= BRAKE_ZONE {
                        train.state = TrainState::Braking;
                    }
                }
                TrainState::Braking => {
                    let berth = length - BERTH;
                    train.velocity = BRAKE_SPEED;
                    train.progress = (train.progress + train.velocity * dt).min(berth);
                    if train.progress >= berth {
                        train.velocity = 0.0;
                        if berth_free {
                            berth_free = false;
                            train.state = TrainState::Loading;
                            train.timer = settings.load_ticks.max(1);
                            train.progress = 0.0;
                            self.laps += 1;
                        }
                    }
                }
            }
        }
    }

    /// Checked on load.
    pub fn validate(&self) -> Result<(), String> {
        if self.circuit.len() < MIN_CIRCUIT || self.circuit.first() != Some(&self.station) {
            return Err("circuit must start at the station and span at least four tiles".into());
        }
        if self.pieces.len() != self.circuit.len() {
            return Err("one piece is needed per circuit tile".into());
        }
        let length = self.circuit.len() as f32;
        if self
            .trains
            .iter()
            .any(|train| !(0.0..=length).contains(&train.progress) || !train.velocity.is_finite())
        {
            return Err("train is off the circuit".into());
        }
        Ok(())
    }
}

fn is_station(grid: &Grid, at: Coord) -> bool {
    grid.tile(at)
        .and_then(|tile| tile.structure.as_ref())
        .is_some_and(|structure| structure.kind == StructureKind::CoasterStation)
}

fn pieces_along(grid: &Grid, circuit: &[Coord]) -> Vec<Option<TrackPiece>> {
    circuit
        .iter()
        .map(|at| grid.tile(*at).and_then(|tile| tile.track))
        .collect()
}

/// Walk the track out of `station` and back into it. Every tile on the way
/// must touch exactly two track tiles, no second station may sit on the loop,
/// and the loop must span at least [`MIN_CIRCUIT`] tiles. The first track
/// neighbour in north, east, south, west order sets the direction of travel.
pub fn trace_circuit(grid: &Grid, station: Coord) -> Option<Vec<Coord>> {
    if !is_station(grid, station) {
        return None;
    }
    let links = |at: Coord| -> Vec<Coord> {
        at.neighbors()
            .into_iter()
            .filter(|next| grid.is_track(*next))
            .collect()
    };
    let exits = links(station);
    if exits.len() != 2 {
        return None;
    }

    let limit = grid.size() * grid.size();
    let mut circuit = vec![station];
    let mut previous = station;
    let mut current = exits[0];
    while current != station {
        if circuit.len() > limit || is_station(grid, current) {
            return None;
        }
        let next = links(current);
        if next.len() != 2 {
            return None;
        }
        circuit.push(current);
        let ahead = if next[0] == previous { next[1] } else { next[0] };
        previous = current;
        current = ahead;
    }
    (circuit.len() >= MIN_CIRCUIT).then_some(circuit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Structure;

    /// A rectangular loop with its station in the top-left corner.
    fn loop_grid(width: i32, height: i32) -> (Grid, Coord) {
        let mut grid = Grid::new(10, true);
        let station = Coord::new(1, 1);
        for x in 1..1 + width {
            for y in 1..1 + height {
                let edge = x == 1 || y == 1 || x == width || y == height;
                if !edge {
                    continue;
                }
                let tile = grid.tile_mut(Coord::new(x, y)).unwrap();
                if Coord::new(x, y) == station {
                    tile.structure = Some(Structure::new(StructureKind::CoasterStation, 0));
                } else {
                    tile.track = Some(TrackPiece::Straight);
                }
            }
        }
        (grid, station)
    }

    fn settings() -> CoasterSettings {
        CoasterSettings {
            trains: 1,
            cars_per_train: 3,
            load_ticks: 5,
            dispatch_ticks: 2,
        }
    }

    #[test]
    fn rectangle_traces_as_one_circuit() {
        let (grid, station) = loop_grid(4, 3);
        let circuit = trace_circuit(&grid, station).unwrap();
        assert_eq!(circuit.len(), 10);
        assert_eq!(circuit[0], station);
        // South (x + 1) is the first track neighbour in expansion order.
        assert_eq!(circuit[1], Coord::new(2, 1));
        assert_eq!(circuit[9], Coord::new(1, 2));
        for pair in circuit.windows(2) {
            assert!(pair[0].is_adjacent(pair[1]));
        }
    }

    #[test]
    fn smallest_loop_is_a_square() {
        let (grid, station) = loop_grid(2, 2);
        assert_eq!(trace_circuit(&grid, station).map(|c| c.len()), Some(4));
    }

    #[test]
    fn gaps_spurs_and_second_stations_break_the_circuit() {
        let (mut gap, station) = loop_grid(4, 3);
        gap.tile_mut(Coord::new(4, 2)).unwrap().track = None;
        assert_eq!(trace_circuit(&gap, station), None);

        let (mut spur, station) = loop_grid(4, 3);
        spur.tile_mut(Coord::new(5, 2)).unwrap().track = Some(TrackPiece::Straight);
        assert_eq!(trace_circuit(&spur, station), None);

        let (mut twin, station) = loop_grid(4, 3);
        let tile = twin.tile_mut(Coord::new(4, 3)).unwrap();
        tile.track = None;
        tile.structure = Some(Structure::new(StructureKind::CoasterStation, 0));
        assert_eq!(trace_circuit(&twin, station), None);

        let (plain, _) = loop_grid(4, 3);
        assert_eq!(trace_circuit(&plain, Coord::new(2, 1)), None);
    }

    #[test]
    fn trains_cycle_back_to_the_station() {
        let (grid, station) = loop_grid(4, 3);
        let circuit = trace_circuit(&grid, station).unwrap();
        let settings = settings();
        let mut coaster = Coaster::new(&grid, station, circuit, &settings);
        assert_eq!(coaster.trains[0].state, TrainState::Loading);

        let mut seen = vec![TrainState::Loading];
        for _ in 0..400 {
            coaster.step(true, &settings, 1.0);
            let state = coaster.trains[0].state;
            if seen.last() != Some(&state) {
                seen.push(state);
            }
            if coaster.laps == 1 {
                break;
            }
        }
        assert_eq!(coaster.laps, 1);
        assert_eq!(
            seen,
            vec![
                TrainState::Loading,
                TrainState::Dispatching,
                TrainState::Running,
                TrainState::Braking,
                TrainState::Loading
            ]
        );
        assert_eq!(coaster.trains[0].progress, 0.0);
        assert_eq!(coaster.trains[0].timer, settings.load_ticks);
    }

    #[test]
    fn slopes_change_train_speed() {
        let (mut grid, station) = loop_grid(4, 3);
        grid.tile_mut(Coord::new(2, 1)).unwrap().track = Some(TrackPiece::SlopeUp);
        let circuit = trace_circuit(&grid, station).unwrap();
        let coaster = Coaster::new(&grid, station, circuit, &settings());
        assert_eq!(coaster.speed_factor(0.5), 1.0);
        assert_eq!(coaster.speed_factor(1.2), 0.5);
        assert_eq!(coaster.speed_factor(2.0), 1.0);
    }

    #[test]
    fn closed_coaster_holds_trains_at_the_station() {
        let (grid, station) = loop_grid(4, 3);
        let circuit = trace_circuit(&grid, station).unwrap();
        let settings = settings();
        let mut coaster = Coaster::new(&grid, station, circuit, &settings);
        for _ in 0..50 {
            coaster.step(false, &settings, 1.0);
        }
        assert_eq!(coaster.trains[0].state, TrainState::Loading);
        assert_eq!(coaster.trains[0].timer, settings.load_ticks);
        assert_eq!(coaster.laps, 0);
    }

    #[test]
    fn trains_share_the_platform() {
        let (grid, station) = loop_grid(5, 4);
        let circuit = trace_circuit(&grid, station).unwrap();
        let settings = CoasterSettings {
            trains: 2,
            ..settings()
        };
        let mut coaster = Coaster::new(&grid, station, circuit, &settings);
        for _ in 0..1_000 {
            coaster.step(true, &settings, 1.0);
            let at_platform = coaster
                .trains
                .iter()
                .filter(|train| {
                    train.state == TrainState::Dispatching
                        || (train.state == TrainState::Loading && train.timer < settings.load_ticks)
                })
                .count();
            assert!(at_platform <= 1);
        }
        assert!(coaster.laps >= 4);
        assert!(coaster.validate().is_ok());
    }

    #[test]
    fn cars_trail_the_lead_and_wrap() {
        let train = Train {
            progress: 0.2,
            cars: 3,
            ..Train::new(3, 5)
        };
        let positions = train.car_positions(10);
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0], 0.2);
        assert!((positions[1] - 0.02).abs() < 1e-5);
        assert!((positions[2] - 9.84).abs() < 1e-4);
    }

    #[test]
    fn runs_on_notices_swapped_pieces() {
        let (mut grid, station) = loop_grid(4, 3);
        let circuit = trace_circuit(&grid, station).unwrap();
        let coaster = Coaster::new(&grid, station, circuit.clone(), &settings());
        assert!(coaster.runs_on(&grid, &circuit));
        grid.tile_mut(Coord::new(4, 3)).unwrap().track = Some(TrackPiece::SlopeDown);
        assert!(!coaster.runs_on(&grid, &circuit));
    }
}
