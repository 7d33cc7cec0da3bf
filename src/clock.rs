//! Simulation calendar derived purely from the tick counter

use std::fmt;

use serde::{Deserialize, Serialize};

fn default_ticks_per_minute() -> u32 {
    1
}

fn default_days_per_month() -> u32 {
    30
}

fn default_start_year() -> u32 {
    1
}

fn default_start_month() -> u32 {
    3
}

fn default_start_day() -> u32 {
    1
}

fn default_start_hour() -> u32 {
    9
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_ticks_per_minute")]
    pub ticks_per_minute: u32,
    #[serde(default = "default_days_per_month")]
    pub days_per_month: u32,
    #[serde(default = "default_start_year")]
    pub start_year: u32,
    #[serde(default = "default_start_month")]
    pub start_month: u32,
    #[serde(default = "default_start_day")]
    pub start_day: u32,
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            ticks_per_minute: default_ticks_per_minute(),
            days_per_month: default_days_per_month(),
            start_year: default_start_year(),
            start_month: default_start_month(),
            start_day: default_start_day(),
            start_hour: default_start_hour(),
        }
    }
}

impl CalendarConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.ticks_per_minute == 0 {
            return Err("ticks_per_minute must be at least 1".into());
        }
        if self.days_per_month == 0 {
            return Err("days_per_month must be at least 1".into());
        }
        if self.start_year == 0 || !(1..=12).contains(&self.start_month) {
            return Err("start date must have year >= 1 and month in 1..=12".into());
        }
        if self.start_day == 0 || self.start_day > self.days_per_month || self.start_hour > 23 {
            return Err("start day or hour out of range".into());
        }
        Ok(())
    }

    pub fn ticks_per_day(&self) -> u64 {
        self.ticks_per_minute as u64 * 60 * 24
    }

    fn start_minutes(&self) -> u64 {
        let months = (self.start_year as u64 - 1) * 12 + (self.start_month as u64 - 1);
        let days = months * self.days_per_month as u64 + (self.start_day as u64 - 1);
        (days * 24 + self.start_hour as u64) * 60
    }
}

/// The largest calendar field that changed on a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rollover {
    #[default]
    None,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl Rollover {
    pub fn crosses(self, boundary: Rollover) -> bool {
        self >= boundary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Calendar {
    pub year: u32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub tick: u64,
}

impl Calendar {
    /// Closed form: the same tick always yields the same date.
    pub fn at(tick: u64, config: &CalendarConfig) -> Self {
        let per_minute = config.ticks_per_minute.max(1) as u64;
        let per_month = config.days_per_month.max(1) as u64;
        let total_minutes = config.start_minutes() + tick / per_minute;
        let total_hours = total_minutes / 60;
        let total_days = total_hours / 24;
        let total_months = total_days / per_month;
        Self {
            year: (total_months / 12) as u32 + 1,
            month: (total_months % 12) as u32 + 1,
            day: (total_days % per_month) as u32 + 1,
            hour: (total_hours % 24) as u32,
            minute: (total_minutes % 60) as u32,
            tick,
        }
    }

    /// Step one tick and report which boundary, if any, was crossed.
    pub fn advance(&mut self, config: &CalendarConfig) -> Rollover {
        let next = Self::at(self.tick + 1, config);
        let rollover = if next.year != self.year {
            Rollover::Year
        } else if next.month != self.month {
            Rollover::Month
        } else if next.day != self.day {
            Rollover::Day
        } else if next.hour != self.hour {
            Rollover::Hour
        } else if next.minute != self.minute {
            Rollover::Minute
        } else {
            Rollover::None
        };
        *self = next;
        rollover
    }

    pub fn is_between_hours(&self, open: u32, close: u32) -> bool {
        if open <= close {
            self.hour >= open && self.hour < close
        } else {
            self.hour >= open || self.hour < close
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Y{} M{:02} D{:02} {:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}
