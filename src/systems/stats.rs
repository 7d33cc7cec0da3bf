use anyhow::Result;

use crate::{
    agents::{AgentKind, EnemyState},
    engine::{System, SystemContext},
    rng::{SystemId, SystemRng, STATS_STREAM},
    state::GameState,
};

/// Derived counters for the summary surface. Reads agents, never changes them.
pub struct StatsSystem;

impl StatsSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StatsSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for StatsSystem {
    fn name(&self) -> &str {
        "stats"
    }

    fn stream(&self) -> SystemId {
        STATS_STREAM
    }

    fn run(&mut self, _ctx: &SystemContext, state: &mut GameState, _rng: &mut SystemRng) -> Result<()> {
        let mut guests = 0;
        let mut staff = 0;
        let mut citizens = 0;
        let mut enemies = 0;
        let mut happiness = 0.0f64;
        for agent in &state.agents {
            match &agent.kind {
                AgentKind::Guest(guest) => {
                    guests += 1;
                    happiness += guest.needs.happiness as f64;
                }
                AgentKind::Staff(_) => staff += 1,
                AgentKind::Citizen(_) => citizens += 1,
                AgentKind::Enemy(enemy) if enemy.state == EnemyState::Marching => enemies += 1,
                AgentKind::Enemy(_) => {}
            }
        }

        let stats = &mut state.stats;
        stats.guests = guests;
        stats.staff = staff;
        stats.citizens = citizens;
        stats.enemies = enemies;
        stats.coasters = state.coasters.len();
        // An empty park keeps its last rating.
        if guests > 0 {
            let average = happiness / guests as f64;
            stats.average_happiness = average as f32;
            stats.park_rating = (average * 10.0).round().clamp(0.0, 1_000.0) as u32;
        }
        Ok(())
    }
}
