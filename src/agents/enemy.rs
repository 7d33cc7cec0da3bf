use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::movement::{Motion, Step};
use super::{AgentContext, AgentId};
use crate::catalog::TowerStats;
use crate::grid::Coord;
use crate::ledger::{Category, LedgerDelta};
use crate::pathfinding::find_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyState {
    #[default]
    Marching,
    Slain,
    Breached,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slow {
    pub multiplier: f32,
    pub ticks_left: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    pub state: EnemyState,
    pub wave: u32,
    pub health: f32,
    pub max_health: f32,
    pub bounty: i64,
    pub base: Coord,
    #[serde(default)]
    pub slow: Option<Slow>,
}

impl Enemy {
    pub fn new(wave: u32, health: f32, bounty: i64, base: Coord) -> Self {
        Self {
            state: EnemyState::Marching,
            wave,
            health,
            max_health: health,
            bounty,
            base,
            slow: None,
        }
    }
}

/// Damage landed on one enemy this tick, summed over every tower that fired.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hit {
    pub damage: f32,
    pub slow: Option<(f32, u32)>,
}

/// Resolve tower fire for this tick. A tower fires when `tick` is a multiple
/// of its interval, at the enemy in range furthest along its route; ties go
/// to the lower id.
pub fn aim<'a, I>(towers: &[(Coord, TowerStats)], enemies: I, tick: u64) -> BTreeMap<AgentId, Hit>
where
    I: IntoIterator<Item = (AgentId, &'a Motion)>,
{
    let enemies: Vec<(AgentId, &Motion)> = enemies.into_iter().collect();
    let mut hits: BTreeMap<AgentId, Hit> = BTreeMap::new();
    for (at, stats) in towers {
        if stats.fire_interval == 0 || tick % stats.fire_interval != 0 {
            continue;
        }
        let target = enemies
            .iter()
            .filter(|(_, motion)| motion.tile.manhattan(*at) <= stats.range)
            .max_by(|(a_id, a), (b_id, b)| {
                let a_along = a.cursor as f32 + a.progress;
                let b_along = b.cursor as f32 + b.progress;
                a_along.total_cmp(&b_along).then(b_id.cmp(a_id))
            });
        let Some((id, _)) = target else {
            continue;
        };
        let hit = hits.entry(*id).or_default();
        hit.damage += stats.damage;
        if let Some((multiplier, ticks)) = stats.slow {
            let stronger = hit.slow.map_or(true, |(current, _)| multiplier < current);
            if stronger {
                hit.slow = Some((multiplier, ticks));
            }
        }
    }
    hits
}

pub fn advance(id: AgentId, enemy: &mut Enemy, motion: &mut Motion, ctx: &mut AgentContext<'_>) {
    if enemy.state != EnemyState::Marching {
        return;
    }
    if let Some(hit) = ctx.hits.get(&id) {
        enemy.health -= hit.damage;
        if let Some((multiplier, ticks_left)) = hit.slow {
            enemy.slow = Some(Slow {
                multiplier,
                ticks_left,
            });
        }
    }
    if enemy.health <= 0.0 {
        enemy.state = EnemyState::Slain;
        ctx.outcomes
            .deltas
            .push(LedgerDelta::income(Category::Bounty, enemy.bounty));
        return;
    }

    let multiplier = enemy.slow.map_or(1.0, |slow| slow.multiplier);
    match motion.step(ctx.grid, ctx.dt, multiplier) {
        Step::Moving | Step::Entered(_) => {}
        Step::Arrived(tile) if tile == enemy.base => breach(enemy, ctx),
        Step::Idle if motion.tile == enemy.base => breach(enemy, ctx),
        Step::Arrived(_) | Step::Idle | Step::Blocked => {
            // Route cut by construction: find another way or hold position.
            if let Some(path) = find_path(ctx.grid, motion.tile, enemy.base) {
                motion.set_path(path);
            }
        }
    }

    if let Some(slow) = enemy.slow.as_mut() {
        slow.ticks_left = slow.ticks_left.saturating_sub(1);
        if slow.ticks_left == 0 {
            enemy.slow = None;
        }
    }
}

fn breach(enemy: &mut Enemy, ctx: &mut AgentContext<'_>) {
    enemy.state = EnemyState::Breached;
    ctx.outcomes.breaches += 1;
}
