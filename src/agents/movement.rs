use serde::{Deserialize, Serialize};

use crate::grid::{Coord, Direction, Grid};

/// Position and route shared by every agent kind.
///
/// While a path is active `path[cursor]` is the tile the agent stands on and
/// `progress` measures the walk along the edge into `path[cursor + 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub tile: Coord,
    pub progress: f32,
    pub facing: Direction,
    #[serde(default)]
    pub path: Vec<Coord>,
    #[serde(default)]
    pub cursor: usize,
    pub speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// No path to follow.
    Idle,
    /// Still between tiles.
    Moving,
    /// Entered a new tile with more path ahead.
    Entered(Coord),
    /// Entered the final tile of the path; the path has been cleared.
    Arrived(Coord),
    /// The next tile stopped being walkable; the path has been cleared.
    Blocked,
}

impl Motion {
    pub fn at(tile: Coord, speed: f32) -> Self {
        Self {
            tile,
            progress: 0.0,
            facing: Direction::default(),
            path: Vec::new(),
            cursor: 0,
            speed,
        }
    }

    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }

    pub fn next_node(&self) -> Option<Coord> {
        self.path.get(self.cursor + 1).copied()
    }

    pub fn destination(&self) -> Option<Coord> {
        self.path.last().copied()
    }

    pub fn clear_path(&mut self) {
        self.path.clear();
        self.cursor = 0;
        self.progress = 0.0;
    }

    /// Adopt a route that starts on the current tile. A single-node route is
    /// already complete and leaves the agent without a path. Returns false
    /// (and changes nothing) when the route does not start here.
    pub fn set_path(&mut self, path: Vec<Coord>) -> bool {
        if path.first() != Some(&self.tile) {
            return false;
        }
        self.clear_path();
        if path.len() < 2 {
            return true;
        }
        if let Some(direction) = Direction::between(path[0], path[1]) {
            self.facing = direction;
        }
        self.path = path;
        true
    }

    /// Advance along the path by `speed * multiplier * dt`.
    pub fn step(&mut self, grid: &Grid, dt: f32, multiplier: f32) -> Step {
        self.step_over(dt, multiplier, |at| grid.is_walkable(at))
    }

    /// [`Motion::step`] with the caller deciding which tiles can be entered.
    pub fn step_over<P>(&mut self, dt: f32, multiplier: f32, passable: P) -> Step
    where
        P: Fn(Coord) -> bool,
    {
        let Some(next) = self.next_node() else {
            self.clear_path();
            return Step::Idle;
        };
        if !passable(next) {
            self.clear_path();
            return Step::Blocked;
        }

        self.progress += self.speed * multiplier * dt;
        if self.progress < 1.0 {
            return Step::Moving;
        }

        let from = self.tile;
        self.tile = next;
        self.progress = 0.0;
        self.cursor += 1;
        if let Some(direction) = Direction::between(from, next) {
            self.facing = direction;
        }
        if self.cursor + 1 >= self.path.len() {
            self.clear_path();
            Step::Arrived(next)
        } else {
            Step::Entered(next)
        }
    }

    /// Checked on load: an active path must start from where the agent stands.
    pub fn is_consistent(&self) -> bool {
        if self.path.is_empty() {
            return self.cursor == 0;
        }
        self.cursor + 1 < self.path.len()
            && self.path[self.cursor] == self.tile
            && (0.0..1.0).contains(&self.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor() -> (Grid, Vec<Coord>) {
        let grid = Grid::new(4, false);
        let path = vec![Coord::new(0, 0), Coord::new(1, 0), Coord::new(1, 1)];
        (grid, path)
    }

    #[test]
    fn progress_resets_exactly_when_tile_changes() {
        let (grid, path) = corridor();
        let mut motion = Motion::at(Coord::new(0, 0), 0.5);
        assert!(motion.set_path(path));
        assert_eq!(motion.step(&grid, 1.0, 1.0), Step::Moving);
        assert_eq!(motion.tile, Coord::new(0, 0));
        assert_eq!(motion.step(&grid, 1.0, 1.0), Step::Entered(Coord::new(1, 0)));
        assert_eq!(motion.progress, 0.0);
        assert_eq!(motion.facing, Direction::South);
        assert_eq!(motion.path[motion.cursor], motion.tile);
    }

    #[test]
    fn arriving_clears_the_path() {
        let (grid, path) = corridor();
        let mut motion = Motion::at(Coord::new(0, 0), 1.0);
        motion.set_path(path);
        motion.step(&grid, 1.0, 1.0);
        assert_eq!(motion.step(&grid, 1.0, 1.0), Step::Arrived(Coord::new(1, 1)));
        assert_eq!(motion.facing, Direction::West);
        assert!(!motion.has_path());
        assert_eq!(motion.cursor, 0);
        assert_eq!(motion.step(&grid, 1.0, 1.0), Step::Idle);
        assert!(motion.is_consistent());
    }

    #[test]
    fn rejects_paths_that_start_elsewhere() {
        let (_, path) = corridor();
        let mut motion = Motion::at(Coord::new(3, 3), 1.0);
        assert!(!motion.set_path(path));
        assert!(!motion.has_path());
    }

    #[test]
    fn slow_multiplier_scales_advance() {
        let (grid, path) = corridor();
        let mut motion = Motion::at(Coord::new(0, 0), 0.5);
        motion.set_path(path);
        assert_eq!(motion.step(&grid, 1.0, 0.5), Step::Moving);
        assert_eq!(motion.progress, 0.25);
    }

    #[test]
    fn step_over_uses_the_given_rule() {
        let grid = Grid::new(4, true);
        let path = vec![Coord::new(0, 0), Coord::new(1, 0)];
        let mut motion = Motion::at(Coord::new(0, 0), 1.0);
        motion.set_path(path.clone());
        assert_eq!(motion.step(&grid, 1.0, 1.0), Step::Blocked);

        motion.set_path(path);
        assert_eq!(
            motion.step_over(1.0, 1.0, |at| grid.is_open_ground(at)),
            Step::Arrived(Coord::new(1, 0))
        );
    }

    #[test]
    fn blocked_tile_drops_route() {
        let (mut grid, path) = corridor();
        grid.tile_mut(Coord::new(1, 0)).unwrap().terrain = crate::grid::Terrain::Water;
        let mut motion = Motion::at(Coord::new(0, 0), 1.0);
        motion.set_path(path);
        assert_eq!(motion.step(&grid, 1.0, 1.0), Step::Blocked);
        assert!(!motion.has_path());
    }
}
