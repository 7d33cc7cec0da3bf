use serde::{Deserialize, Serialize};

use super::movement::{Motion, Step};
use super::AgentContext;
use crate::catalog::StructureKind;
use crate::grid::{Coord, Grid};
use crate::pathfinding::{find_nearest, find_path_to_structure};

/// Ticks to wait before retrying a failed commute search.
const RETRY_TICKS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitizenState {
    #[default]
    AtHome,
    CommutingToWork,
    Working,
    CommutingHome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citizen {
    pub state: CitizenState,
    pub home: Coord,
    pub workplace: Option<Coord>,
    pub age: u64,
    pub max_age: u64,
    #[serde(default)]
    pub retry_at: u64,
}

impl Citizen {
    pub fn new(home: Coord, max_age: u64) -> Self {
        Self {
            state: CitizenState::AtHome,
            home,
            workplace: None,
            age: 0,
            max_age,
            retry_at: 0,
        }
    }

    pub fn is_employed(&self) -> bool {
        self.workplace.is_some()
    }
}

/// First walkable tile next to a house, where its residents appear.
pub fn doorstep(grid: &Grid, house: Coord) -> Option<Coord> {
    house.neighbors().into_iter().find(|at| grid.is_walkable(*at))
}

pub fn advance(citizen: &mut Citizen, motion: &mut Motion, ctx: &mut AgentContext<'_>) {
    citizen.age += 1;
    let home_stands = ctx
        .grid
        .tile(citizen.home)
        .and_then(|tile| tile.structure.as_ref())
        .is_some_and(|structure| structure.kind == StructureKind::House);
    if !home_stands {
        // Demolished home: the household moves away.
        citizen.age = citizen.age.max(citizen.max_age);
        return;
    }
    if let Some(office) = citizen.workplace {
        let office_stands = ctx
            .grid
            .tile(office)
            .and_then(|tile| tile.structure.as_ref())
            .is_some_and(|structure| structure.kind == StructureKind::Office);
        if !office_stands {
            citizen.workplace = None;
        }
    }

    let Some(city) = ctx.settings.city.as_ref() else {
        return;
    };
    let work_hours = ctx.calendar.is_between_hours(city.work_start, city.work_end);

    match citizen.state {
        CitizenState::AtHome => {
            if work_hours && ctx.tick >= citizen.retry_at {
                head_to_work(citizen, motion, ctx);
            }
        }
        CitizenState::CommutingToWork => match motion.step(ctx.grid, ctx.dt, 1.0) {
            Step::Moving | Step::Entered(_) => {}
            Step::Arrived(_) => citizen.state = CitizenState::Working,
            Step::Blocked | Step::Idle => {
                if ctx.tick >= citizen.retry_at {
                    head_to_work(citizen, motion, ctx);
                }
            }
        },
        CitizenState::Working => {
            let off_duty = citizen.workplace.is_none() || !work_hours;
            if off_duty && ctx.tick >= citizen.retry_at {
                head_home(citizen, motion, ctx);
            }
        }
        CitizenState::CommutingHome => match motion.step(ctx.grid, ctx.dt, 1.0) {
            Step::Moving | Step::Entered(_) => {}
            Step::Arrived(_) => citizen.state = CitizenState::AtHome,
            Step::Blocked | Step::Idle => {
                if ctx.tick >= citizen.retry_at {
                    head_home(citizen, motion, ctx);
                }
            }
        },
    }
}

fn head_to_work(citizen: &mut Citizen, motion: &mut Motion, ctx: &AgentContext<'_>) {
    let offices = &ctx.sites.offices;
    let route = find_nearest(ctx.grid, motion.tile, |at| {
        offices.iter().any(|office| office.is_adjacent(at))
    });
    let Some(path) = route else {
        citizen.retry_at = ctx.tick + RETRY_TICKS;
        return;
    };
    let door = path.last().copied().unwrap_or(motion.tile);
    citizen.workplace = offices.iter().copied().find(|office| office.is_adjacent(door));
    motion.set_path(path);
    citizen.state = if motion.has_path() {
        CitizenState::CommutingToWork
    } else {
        CitizenState::Working
    };
}

fn head_home(citizen: &mut Citizen, motion: &mut Motion, ctx: &AgentContext<'_>) {
    let Some(path) = find_path_to_structure(ctx.grid, motion.tile, citizen.home) else {
        citizen.retry_at = ctx.tick + RETRY_TICKS;
        return;
    };
    motion.set_path(path);
    citizen.state = if motion.has_path() {
        CitizenState::CommutingHome
    } else {
        CitizenState::AtHome
    };
}
