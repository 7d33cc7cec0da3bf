use rand::Rng;
use serde::{Deserialize, Serialize};

use super::movement::{Motion, Step};
use super::AgentContext;
use crate::catalog::StaffRole;
use crate::grid::Coord;
use crate::pathfinding::{find_nearest_over, find_path, find_path_to_structure};
use crate::rng::{RngExt, SystemRng};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffState {
    #[default]
    Idle,
    Walking,
    Working,
    Responding,
    /// Walking over open ground back to the nearest walkable tile.
    Returning,
}

/// Ticks before a failed search is tried again.
const RETRY_TICKS: u64 = 60;

/// Inclusive rectangle a staff member patrols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub min: Coord,
    pub max: Coord,
}

impl Area {
    pub fn around(center: Coord, radius: i32, size: usize) -> Self {
        let last = size as i32 - 1;
        Self {
            min: Coord::new((center.x - radius).max(0), (center.y - radius).max(0)),
            max: Coord::new((center.x + radius).min(last), (center.y + radius).min(last)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn contains(&self, at: Coord) -> bool {
        (self.min.x..=self.max.x).contains(&at.x) && (self.min.y..=self.max.y).contains(&at.y)
    }

    /// Row-major walk over the rectangle.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (self.min.y..=self.max.y)
            .flat_map(move |y| (self.min.x..=self.max.x).map(move |x| Coord::new(x, y)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub role: StaffRole,
    pub state: StaffState,
    pub area: Area,
    /// Litter tile or broken ride being handled.
    pub job: Option<Coord>,
    pub timer: u32,
    /// Searches for work or a way back are skipped before this tick.
    #[serde(default)]
    pub retry_at: u64,
}

impl Staff {
    pub fn new(role: StaffRole, area: Area) -> Self {
        Self {
            role,
            state: StaffState::Idle,
            area,
            job: None,
            timer: 0,
            retry_at: 0,
        }
    }
}

pub fn advance(staff: &mut Staff, motion: &mut Motion, ctx: &mut AgentContext<'_>, rng: &mut SystemRng) {
    if staff.state != StaffState::Returning && !ctx.grid.is_walkable(motion.tile) {
        head_back(staff, motion, ctx);
        return;
    }
    match staff.state {
        StaffState::Idle => plan(staff, motion, ctx, rng),
        StaffState::Walking | StaffState::Responding => match motion.step(ctx.grid, ctx.dt, 1.0) {
            Step::Moving | Step::Entered(_) => {}
            Step::Arrived(_) | Step::Idle => arrive(staff, motion, ctx),
            Step::Blocked => {
                staff.state = StaffState::Idle;
                staff.job = None;
            }
        },
        StaffState::Working => {
            staff.timer = staff.timer.saturating_sub(1);
            if staff.timer == 0 {
                finish(staff, motion, ctx);
            }
        }
        StaffState::Returning => {
            let grid = ctx.grid;
            match motion.step_over(ctx.dt, 1.0, |at| grid.is_open_ground(at)) {
                Step::Moving | Step::Entered(_) => {}
                Step::Arrived(_) | Step::Idle | Step::Blocked => staff.state = StaffState::Idle,
            }
        }
    }
}

/// The footway under this staff member is gone; walk over open ground to the
/// closest tile that is walkable again.
fn head_back(staff: &mut Staff, motion: &mut Motion, ctx: &AgentContext<'_>) {
    staff.job = None;
    staff.state = StaffState::Idle;
    motion.clear_path();
    if ctx.tick < staff.retry_at {
        return;
    }
    let grid = ctx.grid;
    let route = find_nearest_over(
        grid,
        motion.tile,
        |at| grid.is_open_ground(at),
        |at| grid.is_walkable(at),
    );
    match route {
        Some(path) if motion.set_path(path.clone()) => staff.state = StaffState::Returning,
        _ => staff.retry_at = ctx.tick + RETRY_TICKS,
    }
}

fn plan(staff: &mut Staff, motion: &mut Motion, ctx: &AgentContext<'_>, rng: &mut SystemRng) {
    if ctx.tick >= staff.retry_at && respond(staff, motion, ctx) {
        return;
    }

    if staff.area.is_empty() || !rng.chance(ctx.settings.staff.patrol_chance) {
        return;
    }
    for _ in 0..4 {
        let spot = Coord::new(
            rng.gen_range(staff.area.min.x..=staff.area.max.x),
            rng.gen_range(staff.area.min.y..=staff.area.max.y),
        );
        if spot == motion.tile || !ctx.grid.is_walkable(spot) {
            continue;
        }
        if let Some(path) = find_path(ctx.grid, motion.tile, spot) {
            motion.set_path(path);
            staff.state = StaffState::Walking;
            return;
        }
    }
}

/// Head for litter or a breakdown in the area. A job that cannot be reached
/// puts further searches on hold for [`RETRY_TICKS`].
fn respond(staff: &mut Staff, motion: &mut Motion, ctx: &AgentContext<'_>) -> bool {
    let (job, route) = match staff.role {
        StaffRole::Handyman => match dirtiest_tile(staff, ctx) {
            Some(job) => (job, find_path(ctx.grid, motion.tile, job)),
            None => return false,
        },
        StaffRole::Mechanic => match nearest_breakdown(staff, motion.tile, ctx) {
            Some(job) => (job, find_path_to_structure(ctx.grid, motion.tile, job)),
            None => return false,
        },
    };
    let Some(path) = route else {
        staff.retry_at = ctx.tick + RETRY_TICKS;
        return false;
    };
    staff.job = Some(job);
    staff.state = StaffState::Responding;
    motion.set_path(path);
    true
}

fn dirtiest_tile(staff: &Staff, ctx: &AgentContext<'_>) -> Option<Coord> {
    let threshold = ctx.settings.staff.litter_threshold.max(1);
    let mut best: Option<(u8, Coord)> = None;
    for at in staff.area.coords() {
        let Some(tile) = ctx.grid.tile(at) else {
            continue;
        };
        if tile.litter >= threshold && best.map_or(true, |(litter, _)| tile.litter > litter) {
            best = Some((tile.litter, at));
        }
    }
    best.map(|(_, at)| at)
}

fn nearest_breakdown(staff: &Staff, from: Coord, ctx: &AgentContext<'_>) -> Option<Coord> {
    ctx.sites
        .attractions
        .iter()
        .filter(|site| site.broken && staff.area.contains(site.at))
        .min_by_key(|site| (site.at.manhattan(from), site.at))
        .map(|site| site.at)
}

fn arrive(staff: &mut Staff, motion: &Motion, ctx: &AgentContext<'_>) {
    let has_litter = ctx
        .grid
        .tile(motion.tile)
        .is_some_and(|tile| tile.litter > 0);
    let start_work = match staff.role {
        StaffRole::Handyman => staff.state == StaffState::Responding || has_litter,
        StaffRole::Mechanic => staff.job.is_some_and(|job| job.is_adjacent(motion.tile)),
    };
    if start_work {
        staff.state = StaffState::Working;
        staff.timer = ctx.settings.staff.work_ticks.max(1);
    } else {
        staff.state = StaffState::Idle;
        staff.job = None;
    }
}

fn finish(staff: &mut Staff, motion: &Motion, ctx: &mut AgentContext<'_>) {
    match staff.role {
        StaffRole::Handyman => {
            ctx.outcomes.swept.push(motion.tile);
            ctx.outcomes.swept.extend(
                motion
                    .tile
                    .neighbors()
                    .into_iter()
                    .filter(|at| staff.area.contains(*at) && ctx.grid.in_bounds(*at)),
            );
        }
        StaffRole::Mechanic => {
            if let Some(job) = staff.job.filter(|job| job.is_adjacent(motion.tile)) {
                ctx.outcomes.repaired.push(job);
            }
        }
    }
    staff.state = StaffState::Idle;
    staff.job = None;
}
