use std::collections::BTreeMap;

use anyhow::Result;
use rand::Rng;
use tracing::{debug, info};

use crate::{
    agents::{
        citizen, enemy, guest, Agent, AgentContext, AgentKind, Citizen, Enemy, EnemyState,
        GuestState, Motion, Outcomes, Sites,
    },
    catalog::StructureKind,
    clock::Rollover,
    engine::{System, SystemContext},
    grid::Coord,
    ledger::{Category, LedgerDelta},
    pathfinding::find_path,
    rng::{RngExt, SystemId, SystemRng, AGENT_STREAM},
    state::GameState,
};

/// Litter a single tile can hold.
const MAX_LITTER: u8 = 10;

/// Advances, removes and spawns every agent, then folds their side effects
/// back into the state.
pub struct AgentSystem;

impl AgentSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AgentSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for AgentSystem {
    fn name(&self) -> &str {
        "agents"
    }

    fn stream(&self) -> SystemId {
        AGENT_STREAM
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut GameState, rng: &mut SystemRng) -> Result<()> {
        if state.rollover.crosses(Rollover::Day) {
            break_down_rides(state, rng);
        }
        let sites = Sites::survey(&state.grid);

        let mut riders: BTreeMap<Coord, u32> = BTreeMap::new();
        let mut waiting: BTreeMap<Coord, u32> = BTreeMap::new();
        for guest in state.agents.iter().filter_map(Agent::as_guest) {
            match (guest.state, guest.target) {
                (GuestState::OnRide, Some(site)) => *riders.entry(site).or_insert(0) += 1,
                (GuestState::Queuing, Some(site)) => *waiting.entry(site).or_insert(0) += 1,
                _ => {}
            }
        }
        let marching = state.agents.iter().filter(|agent| {
            agent
                .as_enemy()
                .is_some_and(|enemy| enemy.state == EnemyState::Marching)
        });
        let hits = enemy::aim(
            &sites.towers,
            marching.map(|agent| (agent.id, &agent.motion)),
            ctx.tick,
        );

        let mut outcomes = Outcomes::default();
        let mut agents = std::mem::take(&mut state.agents);
        {
            let mut agent_ctx = AgentContext {
                tick: ctx.tick,
                dt: ctx.dt,
                grid: &state.grid,
                calendar: &state.calendar,
                weather: &state.weather,
                settings: &state.settings,
                sites: &sites,
                rng: ctx.rng,
                riders: &mut riders,
                waiting: &mut waiting,
                hits: &hits,
                outcomes: &mut outcomes,
            };
            for agent in agents.iter_mut() {
                agent.advance(&mut agent_ctx);
            }
        }

        let slain = agents
            .iter()
            .filter(|agent| agent.as_enemy().is_some_and(|e| e.state == EnemyState::Slain))
            .count() as u64;
        state.stats.slain_total += slain;
        agents.retain(|agent| !agent.is_finished());
        state.agents = agents;

        apply_outcomes(state, outcomes);
        spawn_guest(ctx, state, &sites, rng);
        spawn_citizen(ctx, state, &sites, rng);
        spawn_enemy(ctx, state);
        Ok(())
    }
}

fn break_down_rides(state: &mut GameState, rng: &mut SystemRng) {
    let candidates: Vec<(Coord, f64)> = state
        .grid
        .structures()
        .filter(|(_, structure)| !structure.broken)
        .filter_map(|(at, structure)| structure.kind.ride().map(|ride| (at, ride.breakdown_chance)))
        .collect();
    for (at, chance) in candidates {
        if !rng.chance(chance) {
            continue;
        }
        if let Some(structure) = state.grid.tile_mut(at).and_then(|tile| tile.structure.as_mut()) {
            structure.broken = true;
            debug!(x = at.x, y = at.y, kind = %structure.kind, "ride broke down");
        }
    }
}

fn apply_outcomes(state: &mut GameState, outcomes: Outcomes) {
    state.pending.extend(outcomes.deltas);
    for at in outcomes.litter {
        if let Some(tile) = state.grid.tile_mut(at) {
            tile.litter = tile.litter.saturating_add(1).min(MAX_LITTER);
        }
    }
    for at in outcomes.swept {
        let dirty = state.grid.tile(at).is_some_and(|tile| tile.litter > 0);
        if dirty {
            if let Some(tile) = state.grid.tile_mut(at) {
                tile.litter = 0;
            }
        }
    }
    for at in outcomes.repaired {
        if let Some(structure) = state.grid.tile_mut(at).and_then(|tile| tile.structure.as_mut()) {
            structure.broken = false;
        }
    }
    if outcomes.breaches > 0 {
        state.defense.lives = state.defense.lives.saturating_sub(outcomes.breaches);
        info!(lives = state.defense.lives, "enemies reached the base");
    }
}

/// At most one guest every `spawn_interval` ticks while the gates are open
/// and the park is below its cap. Bad weather turns some of them away.
fn spawn_guest(ctx: &SystemContext, state: &mut GameState, sites: &Sites, rng: &mut SystemRng) {
    let park = state.settings.park.clone();
    if !park.enabled
        || ctx.tick % park.spawn_interval != 0
        || sites.entrances.is_empty()
        || state.guest_count() >= park.max_guests
        || !state.calendar.is_between_hours(park.open_hour, park.close_hour)
    {
        return;
    }
    let condition = state.weather.condition;
    if park.weather_affects_admission && !rng.chance(condition.admission_factor()) {
        debug!(tick = ctx.tick, weather = ?condition, "arrival stayed home");
        return;
    }
    let entrance = sites.entrances[rng.gen_range(0..sites.entrances.len())];
    let Some((motion, guest)) = guest::admit(entrance, &state.grid, &park, rng) else {
        return;
    };
    let id = state.allocate_id();
    if park.entry_fee > 0 {
        state
            .pending
            .push(LedgerDelta::income(Category::Admissions, park.entry_fee));
    }
    state.stats.admitted_total += 1;
    state.agents.push(Agent::new(id, motion, AgentKind::Guest(guest)));
}

fn spawn_citizen(ctx: &SystemContext, state: &mut GameState, sites: &Sites, rng: &mut SystemRng) {
    let Some(city) = state.settings.city.clone() else {
        return;
    };
    if ctx.tick % city.spawn_interval != 0 || state.citizen_count() >= city.max_citizens {
        return;
    }
    let capacity = StructureKind::House.occupancy() as usize;
    for house in &sites.houses {
        let residents = state
            .agents
            .iter()
            .filter_map(Agent::as_citizen)
            .filter(|citizen| citizen.home == *house)
            .count();
        if residents >= capacity {
            continue;
        }
        let Some(door) = citizen::doorstep(&state.grid, *house) else {
            continue;
        };
        let max_age = rng.gen_range(city.min_lifespan..=city.max_lifespan);
        let id = state.allocate_id();
        state.agents.push(Agent::new(
            id,
            Motion::at(door, city.speed),
            AgentKind::Citizen(Citizen::new(*house, max_age)),
        ));
        return;
    }
}

fn spawn_enemy(ctx: &SystemContext, state: &mut GameState) {
    let Some(defense) = state.settings.defense.clone() else {
        return;
    };
    if state.defense.lives == 0 {
        return;
    }
    if ctx.tick % defense.wave_interval == 0 {
        state.defense.wave += 1;
        state.defense.remaining = defense.wave_size;
        state.defense.wave_started = ctx.tick;
        info!(wave = state.defense.wave, size = defense.wave_size, "wave incoming");
    }
    if state.defense.remaining == 0
        || (ctx.tick - state.defense.wave_started) % defense.spawn_gap != 0
    {
        return;
    }
    if state.defense.level_path.is_none() {
        state.defense.level_path = find_path(&state.grid, defense.entry, defense.base);
    }
    let Some(path) = state.defense.level_path.clone() else {
        debug!(tick = ctx.tick, "no route from entry to base, holding spawn");
        return;
    };

    let wave = state.defense.wave;
    let mut motion = Motion::at(defense.entry, defense.speed);
    motion.set_path(path);
    let enemy = Enemy::new(wave, defense.health_for_wave(wave), defense.bounty, defense.base);
    let id = state.allocate_id();
    state.agents.push(Agent::new(id, motion, AgentKind::Enemy(enemy)));
    state.defense.remaining -= 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Area, Staff};
    use crate::catalog::StaffRole;
    use crate::grid::{Footway, Grid, Structure};
    use crate::rng::RngManager;
    use crate::state::{DefenseSettings, Settings};
    use crate::weather::Condition;

    fn run_once(system: &mut AgentSystem, state: &mut GameState) {
        state.calendar.advance(&state.settings.calendar);
        let tick = state.tick();
        let rng = RngManager::new(state.seed);
        let ctx = SystemContext {
            tick,
            dt: 1.0,
            rng,
            scenario_name: "test",
        };
        system.run(&ctx, state, &mut rng.stream(AGENT_STREAM, tick)).unwrap();
    }

    fn corridor_state(settings: Settings) -> GameState {
        let mut grid = Grid::new(8, true);
        for x in 0..8 {
            grid.tile_mut(Coord::new(x, 3)).unwrap().footway = Some(Footway::Path);
        }
        GameState::new(grid, settings, 4)
    }

    #[test]
    fn guests_spawn_on_interval_and_pay_admission() {
        let mut settings = Settings::default();
        settings.park.spawn_interval = 4;
        let mut state = corridor_state(settings);
        let mut system = AgentSystem::new();
        for _ in 0..8 {
            run_once(&mut system, &mut state);
        }
        assert_eq!(state.guest_count(), 2);
        assert_eq!(
            state.pending,
            vec![
                LedgerDelta::income(Category::Admissions, 20),
                LedgerDelta::income(Category::Admissions, 20)
            ]
        );
    }

    #[test]
    fn bad_weather_thins_out_arrivals() {
        let admitted = |condition: Condition, weather_matters: bool| {
            let mut settings = Settings::default();
            settings.park.spawn_interval = 1;
            settings.park.weather_affects_admission = weather_matters;
            let mut state = corridor_state(settings);
            state.weather.condition = condition;
            let mut system = AgentSystem::new();
            for _ in 0..100 {
                run_once(&mut system, &mut state);
            }
            state.stats.admitted_total
        };
        assert_eq!(admitted(Condition::Sunny, true), 100);
        let rain = admitted(Condition::Rain, true);
        let storm = admitted(Condition::Storm, true);
        assert!(rain < 80, "rain admitted {rain}");
        assert!(storm < rain, "storm admitted {storm}, rain {rain}");
        assert!(storm > 0);
        assert_eq!(admitted(Condition::Storm, false), 100);
    }

    #[test]
    fn litter_and_sweeping_apply_after_the_pass() {
        let mut state = corridor_state(Settings::default());
        let outcomes = Outcomes {
            litter: vec![Coord::new(2, 3), Coord::new(2, 3)],
            swept: vec![Coord::new(5, 3)],
            ..Outcomes::default()
        };
        state.grid.tile_mut(Coord::new(5, 3)).unwrap().litter = 4;
        apply_outcomes(&mut state, outcomes);
        assert_eq!(state.grid.tile(Coord::new(2, 3)).unwrap().litter, 2);
        assert_eq!(state.grid.tile(Coord::new(5, 3)).unwrap().litter, 0);
    }

    #[test]
    fn waves_follow_the_level_path_and_cost_lives() {
        let mut settings = Settings::default();
        settings.park.enabled = false;
        let mut defense = DefenseSettings::new(Coord::new(0, 3), Coord::new(7, 3));
        defense.wave_interval = 20;
        defense.wave_size = 1;
        defense.speed = 1.0;
        settings.defense = Some(defense);
        let mut state = corridor_state(settings);
        let lives = state.defense.lives;
        let mut system = AgentSystem::new();

        for _ in 0..20 {
            run_once(&mut system, &mut state);
        }
        assert_eq!(state.defense.wave, 1);
        assert_eq!(state.agents.len(), 1);
        assert_eq!(state.defense.level_path.as_ref().map(Vec::len), Some(8));

        for _ in 0..7 {
            run_once(&mut system, &mut state);
        }
        assert!(state.agents.is_empty());
        assert_eq!(state.defense.lives, lives - 1);
    }

    #[test]
    fn staff_are_never_despawned() {
        let mut settings = Settings::default();
        settings.park.enabled = false;
        let mut state = corridor_state(settings);
        let id = state.allocate_id();
        state.agents.push(Agent::new(
            id,
            Motion::at(Coord::new(3, 3), 0.06),
            AgentKind::Staff(Staff::new(StaffRole::Handyman, Area::around(Coord::new(3, 3), 3, 8))),
        ));
        let mut system = AgentSystem::new();
        for _ in 0..50 {
            run_once(&mut system, &mut state);
        }
        assert_eq!(state.agents.len(), 1);
    }

    #[test]
    fn citizens_move_into_houses() {
        let mut settings = Settings::default();
        settings.park.enabled = false;
        settings.city = Some(crate::state::CitySettings {
            spawn_interval: 2,
            ..Default::default()
        });
        let mut state = corridor_state(settings);
        state.grid.tile_mut(Coord::new(2, 2)).unwrap().structure =
            Some(Structure::new(StructureKind::House, 800));
        let mut system = AgentSystem::new();
        for _ in 0..20 {
            run_once(&mut system, &mut state);
        }
        assert_eq!(state.citizen_count(), StructureKind::House.occupancy() as usize);
    }
}
