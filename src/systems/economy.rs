use anyhow::Result;
use tracing::info;

use crate::{
    agents::AgentKind,
    clock::{Calendar, Rollover},
    engine::{System, SystemContext},
    ledger::{Category, LedgerDelta},
    rng::{SystemId, SystemRng, ECONOMY_STREAM},
    state::GameState,
};

/// Resolves agent-produced deltas, charges daily running costs and closes the
/// books at each month boundary.
pub struct EconomySystem;

impl EconomySystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EconomySystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for EconomySystem {
    fn name(&self) -> &str {
        "economy"
    }

    fn stream(&self) -> SystemId {
        ECONOMY_STREAM
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut GameState, _rng: &mut SystemRng) -> Result<()> {
        for delta in std::mem::take(&mut state.pending) {
            state.ledger.apply(delta);
        }

        if state.rollover.crosses(Rollover::Day) {
            for delta in daily_charges(state) {
                state.ledger.apply(delta);
            }
        }

        if state.rollover.crosses(Rollover::Month) {
            let closed = Calendar::at(ctx.tick.saturating_sub(1), &state.settings.calendar);
            state.ledger.rollover(closed.year, closed.month);
            info!(
                year = closed.year,
                month = closed.month,
                balance = state.ledger.balance(),
                "month closed"
            );
        }
        Ok(())
    }
}

/// Upkeep, wages and taxes for one day, in that order.
pub fn daily_charges(state: &GameState) -> Vec<LedgerDelta> {
    let upkeep: i64 = state
        .grid
        .structures()
        .map(|(_, structure)| structure.kind.upkeep_per_day())
        .sum();
    let mut wages = 0;
    let mut employed = 0;
    for agent in &state.agents {
        match &agent.kind {
            AgentKind::Staff(staff) => wages += staff.role.wage_per_day(),
            AgentKind::Citizen(citizen) if citizen.is_employed() => employed += 1,
            _ => {}
        }
    }
    let tax_rate = state.settings.city.as_ref().map_or(0, |city| city.daily_tax);

    let mut charges = Vec::new();
    if upkeep > 0 {
        charges.push(LedgerDelta::expense(Category::Upkeep, upkeep));
    }
    if wages > 0 {
        charges.push(LedgerDelta::expense(Category::Wages, wages));
    }
    if employed > 0 && tax_rate > 0 {
        charges.push(LedgerDelta::income(Category::Taxes, employed * tax_rate));
    }
    charges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Agent, Area, Motion, Staff};
    use crate::catalog::{StaffRole, StructureKind};
    use crate::clock::CalendarConfig;
    use crate::grid::{Coord, Grid, Structure};
    use crate::rng::RngManager;
    use crate::state::Settings;

    fn ctx(tick: u64) -> SystemContext<'static> {
        SystemContext {
            tick,
            dt: 1.0,
            rng: RngManager::new(1),
            scenario_name: "test",
        }
    }

    #[test]
    fn pending_deltas_are_drained_into_the_ledger() {
        let mut state = GameState::new(Grid::new(4, true), Settings::default(), 1);
        state.pending.push(LedgerDelta::income(Category::Food, 12));
        let mut rng = RngManager::new(1).stream(ECONOMY_STREAM, 1);
        EconomySystem::new().run(&ctx(1), &mut state, &mut rng).unwrap();
        assert!(state.pending.is_empty());
        assert_eq!(state.ledger.balance(), 50_012);
        assert!(state.ledger.reconciles());
    }

    #[test]
    fn daily_upkeep_and_wages() {
        let mut state = GameState::new(Grid::new(4, true), Settings::default(), 1);
        state.grid.tile_mut(Coord::new(1, 1)).unwrap().structure =
            Some(Structure::new(StructureKind::Carousel, 5_000));
        let id = state.allocate_id();
        state.agents.push(Agent::new(
            id,
            Motion::at(Coord::new(0, 0), 0.06),
            crate::agents::AgentKind::Staff(Staff::new(
                StaffRole::Mechanic,
                Area::around(Coord::new(0, 0), 2, 4),
            )),
        ));
        state.rollover = Rollover::Day;
        let mut rng = RngManager::new(1).stream(ECONOMY_STREAM, 1);
        EconomySystem::new().run(&ctx(900), &mut state, &mut rng).unwrap();
        assert_eq!(state.ledger.period_total(Category::Upkeep), -25);
        assert_eq!(state.ledger.period_total(Category::Wages), -60);
    }

    #[test]
    fn month_rollover_labels_the_closed_month() {
        let settings = Settings {
            calendar: CalendarConfig {
                days_per_month: 1,
                start_hour: 0,
                ..CalendarConfig::default()
            },
            ..Settings::default()
        };
        let mut state = GameState::new(Grid::new(4, true), settings, 1);
        state.pending.push(LedgerDelta::income(Category::Admissions, 40));
        state.rollover = Rollover::Month;
        let mut rng = RngManager::new(1).stream(ECONOMY_STREAM, 1);
        EconomySystem::new().run(&ctx(1_440), &mut state, &mut rng).unwrap();
        let record = state.ledger.history().next().unwrap();
        assert_eq!((record.year, record.month), (1, 3));
        assert_eq!(record.net(), 40);
        assert!(state.ledger.period_totals().is_empty());
    }
}
