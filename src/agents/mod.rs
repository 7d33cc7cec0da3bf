//! Autonomous agents: one tagged record per walker, advanced once per tick.
//!
//! Every kind shares [`Motion`] and differs only in its state machine. Agents
//! read the grid through an [`AgentContext`] and never write it; their side
//! effects are collected in [`Outcomes`] and applied by the agent system once
//! the whole pass is done, so iteration order cannot leak into the result.

pub mod citizen;
pub mod enemy;
pub mod guest;
pub mod movement;
pub mod staff;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use citizen::{Citizen, CitizenState};
pub use enemy::{Enemy, EnemyState, Hit};
pub use guest::{Guest, GuestState, Needs};
pub use movement::{Motion, Step};
pub use staff::{Area, Staff, StaffState};

use crate::catalog::{StructureClass, StructureKind, TowerStats};
use crate::clock::Calendar;
use crate::coaster::trace_circuit;
use crate::grid::{Coord, Grid};
use crate::ledger::LedgerDelta;
use crate::rng::{RngManager, AGENT_STREAM};
use crate::state::Settings;
use crate::weather::WeatherState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentKind {
    Guest(Guest),
    Staff(Staff),
    Citizen(Citizen),
    Enemy(Enemy),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub motion: Motion,
    pub kind: AgentKind,
}

impl Agent {
    pub fn new(id: AgentId, motion: Motion, kind: AgentKind) -> Self {
        Self { id, motion, kind }
    }

    /// One tick of behaviour. Each agent draws from its own stream so adding
    /// or removing another agent never changes this one's choices.
    pub fn advance(&mut self, ctx: &mut AgentContext<'_>) {
        let mut rng = ctx
            .rng
            .entity_stream(AGENT_STREAM, self.id.0 as u64, ctx.tick);
        match &mut self.kind {
            AgentKind::Guest(guest) => guest::advance(guest, &mut self.motion, ctx, &mut rng),
            AgentKind::Staff(staff) => staff::advance(staff, &mut self.motion, ctx, &mut rng),
            AgentKind::Citizen(citizen) => citizen::advance(citizen, &mut self.motion, ctx),
            AgentKind::Enemy(enemy) => enemy::advance(self.id, enemy, &mut self.motion, ctx),
        }
    }

    /// Terminal agents are dropped at the end of the agent pass.
    pub fn is_finished(&self) -> bool {
        match &self.kind {
            AgentKind::Guest(guest) => guest.state == GuestState::Left,
            AgentKind::Staff(_) => false,
            AgentKind::Citizen(citizen) => citizen.age >= citizen.max_age,
            AgentKind::Enemy(enemy) => enemy.state != EnemyState::Marching,
        }
    }

    pub fn as_guest(&self) -> Option<&Guest> {
        match &self.kind {
            AgentKind::Guest(guest) => Some(guest),
            _ => None,
        }
    }

    pub fn as_staff(&self) -> Option<&Staff> {
        match &self.kind {
            AgentKind::Staff(staff) => Some(staff),
            _ => None,
        }
    }

    pub fn as_citizen(&self) -> Option<&Citizen> {
        match &self.kind {
            AgentKind::Citizen(citizen) => Some(citizen),
            _ => None,
        }
    }

    pub fn as_enemy(&self) -> Option<&Enemy> {
        match &self.kind {
            AgentKind::Enemy(enemy) => Some(enemy),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            AgentKind::Guest(_) => "guest",
            AgentKind::Staff(_) => "staff",
            AgentKind::Citizen(_) => "citizen",
            AgentKind::Enemy(_) => "enemy",
        }
    }
}

/// A structure guests can visit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Site {
    pub at: Coord,
    pub kind: StructureKind,
    /// Broken down, or a coaster station without a closed circuit.
    pub broken: bool,
    /// Connected queue tiles touching a ride.
    pub queue_tiles: u32,
}

impl Site {
    /// Guests allowed to wait at once.
    pub fn queue_capacity(&self, settings: &Settings) -> u32 {
        let park = &settings.park;
        park.base_queue + park.queue_per_tile * self.queue_tiles
    }
}

/// Structure positions gathered once per tick, in row-major order.
#[derive(Debug, Clone, Default)]
pub struct Sites {
    pub attractions: Vec<Site>,
    pub houses: Vec<Coord>,
    pub offices: Vec<Coord>,
    pub towers: Vec<(Coord, TowerStats)>,
    pub entrances: Vec<Coord>,
}

impl Sites {
    pub fn survey(grid: &Grid) -> Self {
        let mut sites = Sites {
            entrances: grid.entrances(),
            ..Sites::default()
        };
        for (at, structure) in grid.structures() {
            let kind = structure.kind;
            match kind.class() {
                StructureClass::Ride => {
                    let closed = kind == StructureKind::CoasterStation
                        && trace_circuit(grid, at).is_none();
                    sites.attractions.push(Site {
                        at,
                        kind,
                        broken: structure.broken || closed,
                        queue_tiles: grid.queue_run(at) as u32,
                    })
                }
                StructureClass::Food | StructureClass::Shop => sites.attractions.push(Site {
                    at,
                    kind,
                    broken: structure.broken,
                    queue_tiles: 0,
                }),
                StructureClass::Housing => sites.houses.push(at),
                StructureClass::Workplace => sites.offices.push(at),
                StructureClass::Tower => {
                    if let Some(stats) = kind.tower() {
                        sites.towers.push((at, stats));
                    }
                }
                StructureClass::Scenery | StructureClass::Furniture => {}
            }
        }
        sites
    }

    pub fn is_entrance(&self, at: Coord) -> bool {
        self.entrances.binary_search(&at).is_ok()
    }

    pub fn attraction(&self, at: Coord) -> Option<&Site> {
        self.attractions.iter().find(|site| site.at == at)
    }
}

/// Side effects of one agent pass, applied after every agent has moved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcomes {
    pub deltas: Vec<LedgerDelta>,
    pub litter: Vec<Coord>,
    pub swept: Vec<Coord>,
    pub repaired: Vec<Coord>,
    /// Enemies that reached the base this tick.
    pub breaches: u32,
}

/// Read-only world view plus the write-only outcome buffers for one pass.
pub struct AgentContext<'a> {
    pub tick: u64,
    pub dt: f32,
    pub grid: &'a Grid,
    pub calendar: &'a Calendar,
    pub weather: &'a WeatherState,
    pub settings: &'a Settings,
    pub sites: &'a Sites,
    pub rng: RngManager,
    /// Riders aboard each ride, counted before the pass and updated as
    /// guests board.
    pub riders: &'a mut BTreeMap<Coord, u32>,
    /// Guests queuing for each ride, kept the same way.
    pub waiting: &'a mut BTreeMap<Coord, u32>,
    pub hits: &'a BTreeMap<AgentId, Hit>,
    pub outcomes: &'a mut Outcomes,
}
