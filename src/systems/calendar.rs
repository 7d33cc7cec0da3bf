use anyhow::{ensure, Result};
use tracing::debug;

use crate::{
    clock::Rollover,
    engine::{System, SystemContext},
    rng::{SystemId, SystemRng, CALENDAR_STREAM},
    state::GameState,
};

/// Advances the clock; every later system reads the rollover it records.
pub struct CalendarSystem;

impl CalendarSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CalendarSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for CalendarSystem {
    fn name(&self) -> &str {
        "calendar"
    }

    fn stream(&self) -> SystemId {
        CALENDAR_STREAM
    }

    fn run(&mut self, ctx: &SystemContext, state: &mut GameState, _rng: &mut SystemRng) -> Result<()> {
        state.rollover = state.calendar.advance(&state.settings.calendar);
        ensure!(
            state.calendar.tick == ctx.tick,
            "calendar reached tick {} while producing tick {}",
            state.calendar.tick,
            ctx.tick
        );
        if state.rollover.crosses(Rollover::Day) {
            debug!(tick = ctx.tick, date = %state.calendar, "new day");
        }
        Ok(())
    }
}
