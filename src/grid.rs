//! Tile grid - the data model every other layer reads and writes

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::{Service, StructureKind, TrackPiece};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Neighbours in fixed expansion order: north, east, south, west.
    pub fn neighbors(self) -> [Coord; 4] {
        Direction::ALL.map(|direction| self.step(direction))
    }

    pub fn manhattan(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn is_adjacent(self, other: Coord) -> bool {
        self.manhattan(other) == 1
    }
}

/// Facing of an agent. The mapping is screen-relative: x runs north to south
/// and y runs east to west.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    #[default]
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (-1, 0),
            Direction::East => (0, -1),
            Direction::South => (1, 0),
            Direction::West => (0, 1),
        }
    }

    /// Facing for a one-tile move; `None` when the tiles are not 4-adjacent.
    pub fn between(from: Coord, to: Coord) -> Option<Direction> {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        match (dx, dy) {
            (d, 0) if d < 0 => Some(Direction::North),
            (d, 0) if d > 0 => Some(Direction::South),
            (0, d) if d < 0 => Some(Direction::East),
            (0, d) if d > 0 => Some(Direction::West),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Grass,
    Sand,
    Rock,
    Water,
}

impl Terrain {
    pub fn is_obstacle(self) -> bool {
        matches!(self, Terrain::Water)
    }

    pub fn accepts_footway(self) -> bool {
        matches!(self, Terrain::Grass | Terrain::Sand)
    }

    pub fn accepts_structure(self) -> bool {
        matches!(self, Terrain::Grass)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Footway {
    Path,
    Queue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    #[default]
    Unzoned,
    Residential,
    Commercial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub kind: StructureKind,
    /// Cumulative spend on this structure, the basis for bulldoze refunds.
    pub invested: i64,
    #[serde(default)]
    pub broken: bool,
}

impl Structure {
    pub fn new(kind: StructureKind, invested: i64) -> Self {
        Self {
            kind,
            invested,
            broken: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub terrain: Terrain,
    #[serde(default)]
    pub footway: Option<Footway>,
    #[serde(default)]
    pub structure: Option<Structure>,
    #[serde(default)]
    pub zone: Zone,
    #[serde(default)]
    pub litter: u8,
    /// Coaster track laid on bare ground. Stations are structures instead.
    #[serde(default)]
    pub track: Option<TrackPiece>,
    /// Spend on the footway, track and zoning of this tile.
    #[serde(default)]
    pub invested: i64,
}

impl Tile {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            terrain: Terrain::Grass,
            footway: None,
            structure: None,
            zone: Zone::Unzoned,
            litter: 0,
            track: None,
            invested: 0,
        }
    }

    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }

    /// The single walkability predicate: open ground that carries its
    /// footway marker when the map asks for one.
    pub fn is_walkable(&self, require_footway: bool) -> bool {
        self.is_open_ground() && (!require_footway || self.footway.is_some())
    }

    /// Passable on foot ignoring footway markers: no water, no track and no
    /// blocking structure.
    pub fn is_open_ground(&self) -> bool {
        !self.terrain.is_obstacle()
            && self.track.is_none()
            && !self
                .structure
                .as_ref()
                .is_some_and(|structure| structure.kind.blocks_movement())
    }

    /// Part of a coaster circuit: laid track or a station.
    pub fn is_track(&self) -> bool {
        self.track.is_some()
            || self
                .structure
                .as_ref()
                .is_some_and(|structure| structure.kind == StructureKind::CoasterStation)
    }

    /// True when the tile holds something a bulk terrain edit must not clobber.
    pub fn is_developed(&self) -> bool {
        self.footway.is_some() || self.structure.is_some() || self.track.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayMode {
    #[default]
    Preserve,
    Replace,
}

/// Hand-authored water masks selectable by name from scenario files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "preset", rename_all = "snake_case")]
pub enum OverlayPreset {
    Lakes { seed: u64, count: u32 },
    River { column: i32, width: i32 },
    Moat { width: i32 },
}

/// Square tile grid. Rows are shared between clones and copied on first write,
/// so a snapshot of the previous tick stays valid while the next one mutates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    size: usize,
    require_footway: bool,
    rows: Vec<Arc<Vec<Tile>>>,
}

impl Grid {
    pub fn new(size: usize, require_footway: bool) -> Self {
        let rows = (0..size)
            .map(|y| {
                Arc::new(
                    (0..size)
                        .map(|x| Tile::new(x as i32, y as i32))
                        .collect::<Vec<_>>(),
                )
            })
            .collect();
        Self {
            size,
            require_footway,
            rows,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn requires_footway(&self) -> bool {
        self.require_footway
    }

    pub fn in_bounds(&self, at: Coord) -> bool {
        at.x >= 0 && at.y >= 0 && (at.x as usize) < self.size && (at.y as usize) < self.size
    }

    pub fn tile(&self, at: Coord) -> Option<&Tile> {
        if !self.in_bounds(at) {
            return None;
        }
        self.rows
            .get(at.y as usize)
            .and_then(|row| row.get(at.x as usize))
    }

    pub fn tile_mut(&mut self, at: Coord) -> Option<&mut Tile> {
        if !self.in_bounds(at) {
            return None;
        }
        self.rows
            .get_mut(at.y as usize)
            .and_then(|row| Arc::make_mut(row).get_mut(at.x as usize))
    }

    /// Out-of-range coordinates are simply not walkable.
    pub fn is_walkable(&self, at: Coord) -> bool {
        self.tile(at)
            .is_some_and(|tile| tile.is_walkable(self.require_footway))
    }

    pub fn is_open_ground(&self, at: Coord) -> bool {
        self.tile(at).is_some_and(Tile::is_open_ground)
    }

    pub fn is_track(&self, at: Coord) -> bool {
        self.tile(at).is_some_and(Tile::is_track)
    }

    /// Size of the connected run of queue tiles touching `site`.
    pub fn queue_run(&self, site: Coord) -> usize {
        let is_queue = |at: Coord| {
            self.tile(at).is_some_and(|tile| {
                tile.footway == Some(Footway::Queue) && tile.is_open_ground()
            })
        };
        let mut seen: HashSet<Coord> = site
            .neighbors()
            .into_iter()
            .filter(|at| is_queue(*at))
            .collect();
        let mut frontier: VecDeque<Coord> = seen.iter().copied().collect();
        while let Some(current) = frontier.pop_front() {
            for next in current.neighbors() {
                if next != site && is_queue(next) && seen.insert(next) {
                    frontier.push_back(next);
                }
            }
        }
        seen.len()
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.rows.iter().flat_map(|row| row.iter())
    }

    /// Structures in row-major order.
    pub fn structures(&self) -> impl Iterator<Item = (Coord, &Structure)> {
        self.tiles().filter_map(|tile| {
            tile.structure
                .as_ref()
                .map(|structure| (tile.coord(), structure))
        })
    }

    /// Walkable footway tiles on the map edge, sorted.
    pub fn entrances(&self) -> Vec<Coord> {
        let last = self.size as i32 - 1;
        let mut found: Vec<Coord> = self
            .tiles()
            .filter(|tile| tile.x == 0 || tile.y == 0 || tile.x == last || tile.y == last)
            .filter(|tile| tile.footway.is_some() && tile.is_walkable(self.require_footway))
            .map(Tile::coord)
            .collect();
        found.sort();
        found
    }

    /// Bulk terrain edit. `mask` returns the terrain a tile should take, or
    /// `None` to leave it alone. Returns the number of tiles changed.
    pub fn apply_overlay<F>(&mut self, mode: OverlayMode, mask: F) -> usize
    where
        F: Fn(Coord) -> Option<Terrain>,
    {
        let mut changed = 0;
        for y in 0..self.size {
            let needs_edit = self.rows[y].iter().any(|tile| {
                mask(tile.coord()).is_some_and(|terrain| {
                    terrain != tile.terrain
                        && (mode == OverlayMode::Replace || !tile.is_developed())
                })
            });
            if !needs_edit {
                continue;
            }
            let row = Arc::make_mut(&mut self.rows[y]);
            for tile in row.iter_mut() {
                let Some(terrain) = mask(tile.coord()) else {
                    continue;
                };
                if terrain == tile.terrain {
                    continue;
                }
                if tile.is_developed() {
                    if mode == OverlayMode::Preserve {
                        continue;
                    }
                    if !terrain.accepts_footway() {
                        tile.footway = None;
                        tile.track = None;
                        tile.invested = 0;
                    }
                    if !terrain.accepts_structure() {
                        tile.structure = None;
                    }
                }
                tile.terrain = terrain;
                changed += 1;
            }
        }
        changed
    }

    pub fn apply_preset(&mut self, preset: &OverlayPreset, mode: OverlayMode) -> usize {
        let size = self.size as i32;
        match *preset {
            OverlayPreset::Lakes { seed, count } => {
                let water = lake_mask(self.size, seed, count);
                self.apply_overlay(mode, |at| water.contains(&at).then_some(Terrain::Water))
            }
            OverlayPreset::River { column, width } => self.apply_overlay(mode, |at| {
                (at.x >= column && at.x < column + width).then_some(Terrain::Water)
            }),
            OverlayPreset::Moat { width } => self.apply_overlay(mode, |at| {
                let edge_distance = at.x.min(at.y).min(size - 1 - at.x).min(size - 1 - at.y);
                (edge_distance < width).then_some(Terrain::Water)
            }),
        }
    }

    /// Derived coverage scalar: each provider within `radius` (Manhattan)
    /// contributes `1 - d / (radius + 1)`.
    pub fn service_coverage(&self, at: Coord, service: Service, radius: u32) -> f32 {
        let r = radius as i32;
        let mut total = 0.0;
        for dy in -r..=r {
            for dx in -r..=r {
                let near = Coord::new(at.x + dx, at.y + dy);
                let distance = at.manhattan(near);
                if distance > radius {
                    continue;
                }
                let provides = self
                    .tile(near)
                    .and_then(|tile| tile.structure.as_ref())
                    .is_some_and(|structure| structure.kind.service() == Some(service));
                if provides {
                    total += 1.0 - distance as f32 / (radius as f32 + 1.0);
                }
            }
        }
        total
    }

    /// Structural check used before adopting a deserialized grid.
    pub fn validate(&self) -> Result<(), String> {
        if self.size == 0 {
            return Err("grid size must be greater than zero".into());
        }
        if self.rows.len() != self.size {
            return Err(format!(
                "grid has {} rows, expected {}",
                self.rows.len(),
                self.size
            ));
        }
        for (y, row) in self.rows.iter().enumerate() {
            if row.len() != self.size {
                return Err(format!("row {y} has {} tiles, expected {}", row.len(), self.size));
            }
            for (x, tile) in row.iter().enumerate() {
                if tile.x != x as i32 || tile.y != y as i32 {
                    return Err(format!(
                        "tile at ({x}, {y}) claims coordinates ({}, {})",
                        tile.x, tile.y
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn shares_row_with(&self, other: &Grid, y: usize) -> bool {
        match (self.rows.get(y), other.rows.get(y)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn lake_mask(size: usize, seed: u64, count: u32) -> HashSet<Coord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let size_f = size as f64;
    let margin = (size_f * 0.15).max(8.0) as i32;
    let span = size as i32 - 2 * margin;
    let mut water = HashSet::new();
    if span <= 0 {
        return water;
    }

    let min_spacing = (size_f * 0.2).max(10.0);
    let mut centers: Vec<Coord> = Vec::new();
    for _ in 0..count {
        for _attempt in 0..50 {
            let candidate = Coord::new(
                margin + rng.gen_range(0..span),
                margin + rng.gen_range(0..span),
            );
            let crowded = centers.iter().any(|c| {
                let dx = (candidate.x - c.x) as f64;
                let dy = (candidate.y - c.y) as f64;
                (dx * dx + dy * dy).sqrt() < min_spacing
            });
            if !crowded {
                centers.push(candidate);
                break;
            }
        }
    }

    for center in centers {
        let radius: f64 = rng.gen_range(4.0..10.0);
        let reach = radius as i32 + 2;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let at = Coord::new(center.x + dx, center.y + dy);
                if at.x < 0 || at.y < 0 || at.x >= size as i32 || at.y >= size as i32 {
                    continue;
                }
                let distance = ((dx * dx + dy * dy) as f64).sqrt();
                let wobble: f64 = rng.gen_range(-1.5..1.5);
                if distance <= radius + wobble {
                    water.insert(at);
                }
            }
        }
    }
    water
}
