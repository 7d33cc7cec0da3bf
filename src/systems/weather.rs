use anyhow::Result;

use crate::{
    engine::{System, SystemContext},
    rng::{SystemId, SystemRng, WEATHER_STREAM},
    state::GameState,
};

pub struct WeatherSystem;

impl WeatherSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WeatherSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for WeatherSystem {
    fn name(&self) -> &str {
        "weather"
    }

    fn stream(&self) -> SystemId {
        WEATHER_STREAM
    }

    fn run(&mut self, _ctx: &SystemContext, state: &mut GameState, rng: &mut SystemRng) -> Result<()> {
        let calendar = state.calendar;
        state.weather.update(&calendar, state.rollover, rng);
        Ok(())
    }
}
