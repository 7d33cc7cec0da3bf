//! Weather - the environmental state updated once per tick after the agents

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clock::{Calendar, Rollover};
use crate::rng::RngExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    #[default]
    Sunny,
    Cloudy,
    Rain,
    Storm,
}

impl Condition {
    pub fn is_wet(self) -> bool {
        matches!(self, Condition::Rain | Condition::Storm)
    }

    /// Per-tick happiness drift applied to guests outdoors.
    pub fn mood_effect(self) -> f32 {
        match self {
            Condition::Sunny => 0.01,
            Condition::Cloudy => 0.0,
            Condition::Rain => -0.02,
            Condition::Storm => -0.05,
        }
    }

    /// Share of arrivals that still come through the gate.
    pub fn admission_factor(self) -> f64 {
        match self {
            Condition::Sunny => 1.0,
            Condition::Cloudy => 0.9,
            Condition::Rain => 0.5,
            Condition::Storm => 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherState {
    pub condition: Condition,
    pub temperature_c: f32,
    /// Hours until the condition is re-rolled.
    pub hours_left: u32,
}

impl Default for WeatherState {
    fn default() -> Self {
        Self {
            condition: Condition::Sunny,
            temperature_c: 18.0,
            hours_left: 6,
        }
    }
}

impl WeatherState {
    /// Seasonal baseline: coldest in month 1, warmest in month 7.
    pub fn seasonal_temperature(month: u32) -> f32 {
        let phase = (month as f32 - 1.0) / 12.0 * std::f32::consts::TAU;
        14.0 - 10.0 * phase.cos()
    }

    pub fn update<R: Rng>(&mut self, calendar: &Calendar, rollover: Rollover, rng: &mut R) {
        if !rollover.crosses(Rollover::Hour) {
            return;
        }
        let baseline = Self::seasonal_temperature(calendar.month);
        let diurnal = if (10..18).contains(&calendar.hour) { 3.0 } else { -2.0 };
        let noise = rng.between(-1.5, 1.5);
        self.temperature_c = baseline + diurnal + noise;

        self.hours_left = self.hours_left.saturating_sub(1);
        if self.hours_left > 0 {
            return;
        }
        let roll = rng.unit();
        let wet_bias = if calendar.month >= 10 || calendar.month <= 3 { 0.15 } else { 0.0 };
        self.condition = if roll < 0.45 - wet_bias {
            Condition::Sunny
        } else if roll < 0.75 - wet_bias / 2.0 {
            Condition::Cloudy
        } else if roll < 0.95 {
            Condition::Rain
        } else {
            Condition::Storm
        };
        if self.condition.is_wet() {
            self.temperature_c -= 2.0;
        }
        self.hours_left = rng.gen_range(3..=9);
    }
}
