//! The game state aggregate. A tick consumes one `GameState` and produces the
//! next; nothing outside this value carries simulation state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::agents::{Agent, AgentId, AgentKind};
use crate::catalog::Tool;
use crate::coaster::Coaster;
use crate::clock::{Calendar, CalendarConfig, Rollover};
use crate::grid::{Coord, Grid};
use crate::ledger::{Ledger, LedgerDelta};
use crate::weather::{Condition, WeatherState};

pub const STATE_VERSION: u32 = 1;

fn default_true() -> bool {
    true
}

fn default_starting_cash() -> i64 {
    50_000
}

fn default_refund_ratio() -> f64 {
    0.5
}

fn default_history_months() -> usize {
    12
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomySettings {
    #[serde(default = "default_starting_cash")]
    pub starting_cash: i64,
    #[serde(default = "default_refund_ratio")]
    pub refund_ratio: f64,
    #[serde(default = "default_history_months")]
    pub history_months: usize,
}

impl Default for EconomySettings {
    fn default() -> Self {
        Self {
            starting_cash: default_starting_cash(),
            refund_ratio: default_refund_ratio(),
            history_months: default_history_months(),
        }
    }
}

fn default_max_guests() -> usize {
    500
}

fn default_guest_interval() -> u64 {
    8
}

fn default_open_hour() -> u32 {
    9
}

fn default_close_hour() -> u32 {
    21
}

fn default_entry_fee() -> i64 {
    20
}

fn default_guest_speed() -> f32 {
    0.05
}

fn default_max_visit_ticks() -> u64 {
    720
}

fn default_min_decision_ticks() -> u32 {
    20
}

fn default_max_decision_ticks() -> u32 {
    60
}

fn default_queue_patience() -> u32 {
    120
}

fn default_litter_chance() -> f64 {
    0.25
}

fn default_coverage_radius() -> u32 {
    3
}

fn default_guest_cash_min() -> i64 {
    40
}

fn default_guest_cash_max() -> i64 {
    120
}

fn default_base_queue() -> u32 {
    4
}

fn default_queue_per_tile() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_guests")]
    pub max_guests: usize,
    #[serde(default = "default_guest_interval")]
    pub spawn_interval: u64,
    #[serde(default = "default_open_hour")]
    pub open_hour: u32,
    /// Exclusive; 24 keeps the gates open all day.
    #[serde(default = "default_close_hour")]
    pub close_hour: u32,
    #[serde(default = "default_entry_fee")]
    pub entry_fee: i64,
    #[serde(default = "default_guest_speed")]
    pub guest_speed: f32,
    #[serde(default = "default_max_visit_ticks")]
    pub max_visit_ticks: u64,
    #[serde(default = "default_min_decision_ticks")]
    pub min_decision_ticks: u32,
    #[serde(default = "default_max_decision_ticks")]
    pub max_decision_ticks: u32,
    #[serde(default = "default_queue_patience")]
    pub queue_patience: u32,
    #[serde(default = "default_litter_chance")]
    pub litter_chance: f64,
    #[serde(default = "default_coverage_radius")]
    pub coverage_radius: u32,
    #[serde(default = "default_guest_cash_min")]
    pub guest_cash_min: i64,
    #[serde(default = "default_guest_cash_max")]
    pub guest_cash_max: i64,
    /// Rain and storms turn some arrivals away at the gate.
    #[serde(default = "default_true")]
    pub weather_affects_admission: bool,
    /// Guests that may wait at a ride with no queue tiles.
    #[serde(default = "default_base_queue")]
    pub base_queue: u32,
    /// Extra waiting places per connected queue tile.
    #[serde(default = "default_queue_per_tile")]
    pub queue_per_tile: u32,
}

impl Default for ParkSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_guests: default_max_guests(),
            spawn_interval: default_guest_interval(),
            open_hour: default_open_hour(),
            close_hour: default_close_hour(),
            entry_fee: default_entry_fee(),
            guest_speed: default_guest_speed(),
            max_visit_ticks: default_max_visit_ticks(),
            min_decision_ticks: default_min_decision_ticks(),
            max_decision_ticks: default_max_decision_ticks(),
            queue_patience: default_queue_patience(),
            litter_chance: default_litter_chance(),
            coverage_radius: default_coverage_radius(),
            guest_cash_min: default_guest_cash_min(),
            guest_cash_max: default_guest_cash_max(),
            weather_affects_admission: true,
            base_queue: default_base_queue(),
            queue_per_tile: default_queue_per_tile(),
        }
    }
}

fn default_staff_speed() -> f32 {
    0.06
}

fn default_area_radius() -> i32 {
    6
}

fn default_work_ticks() -> u32 {
    20
}

fn default_litter_threshold() -> u8 {
    2
}

fn default_patrol_chance() -> f64 {
    0.2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffSettings {
    #[serde(default = "default_staff_speed")]
    pub speed: f32,
    #[serde(default = "default_area_radius")]
    pub area_radius: i32,
    #[serde(default = "default_work_ticks")]
    pub work_ticks: u32,
    #[serde(default = "default_litter_threshold")]
    pub litter_threshold: u8,
    #[serde(default = "default_patrol_chance")]
    pub patrol_chance: f64,
}

impl Default for StaffSettings {
    fn default() -> Self {
        Self {
            speed: default_staff_speed(),
            area_radius: default_area_radius(),
            work_ticks: default_work_ticks(),
            litter_threshold: default_litter_threshold(),
            patrol_chance: default_patrol_chance(),
        }
    }
}

fn default_max_citizens() -> usize {
    200
}

fn default_citizen_interval() -> u64 {
    30
}

fn default_citizen_speed() -> f32 {
    0.08
}

fn default_work_start() -> u32 {
    8
}

fn default_work_end() -> u32 {
    17
}

fn default_min_lifespan() -> u64 {
    20_000
}

fn default_max_lifespan() -> u64 {
    40_000
}

fn default_daily_tax() -> i64 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySettings {
    #[serde(default = "default_max_citizens")]
    pub max_citizens: usize,
    #[serde(default = "default_citizen_interval")]
    pub spawn_interval: u64,
    #[serde(default = "default_citizen_speed")]
    pub speed: f32,
    #[serde(default = "default_work_start")]
    pub work_start: u32,
    #[serde(default = "default_work_end")]
    pub work_end: u32,
    #[serde(default = "default_min_lifespan")]
    pub min_lifespan: u64,
    #[serde(default = "default_max_lifespan")]
    pub max_lifespan: u64,
    #[serde(default = "default_daily_tax")]
    pub daily_tax: i64,
}

impl Default for CitySettings {
    fn default() -> Self {
        Self {
            max_citizens: default_max_citizens(),
            spawn_interval: default_citizen_interval(),
            speed: default_citizen_speed(),
            work_start: default_work_start(),
            work_end: default_work_end(),
            min_lifespan: default_min_lifespan(),
            max_lifespan: default_max_lifespan(),
            daily_tax: default_daily_tax(),
        }
    }
}

fn default_trains() -> u32 {
    1
}

fn default_cars_per_train() -> u32 {
    4
}

fn default_load_ticks() -> u32 {
    5
}

fn default_dispatch_ticks() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoasterSettings {
    #[serde(default = "default_trains")]
    pub trains: u32,
    #[serde(default = "default_cars_per_train")]
    pub cars_per_train: u32,
    /// Ticks a train waits at the station before dispatch.
    #[serde(default = "default_load_ticks")]
    pub load_ticks: u32,
    #[serde(default = "default_dispatch_ticks")]
    pub dispatch_ticks: u32,
}

impl Default for CoasterSettings {
    fn default() -> Self {
        Self {
            trains: default_trains(),
            cars_per_train: default_cars_per_train(),
            load_ticks: default_load_ticks(),
            dispatch_ticks: default_dispatch_ticks(),
        }
    }
}

fn default_wave_interval() -> u64 {
    600
}

fn default_wave_size() -> u32 {
    6
}

fn default_spawn_gap() -> u64 {
    10
}

fn default_base_health() -> f32 {
    30.0
}

fn default_health_growth() -> f32 {
    1.25
}

fn default_enemy_speed() -> f32 {
    0.08
}

fn default_bounty() -> i64 {
    15
}

fn default_lives() -> u32 {
    20
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefenseSettings {
    pub entry: Coord,
    pub base: Coord,
    #[serde(default = "default_wave_interval")]
    pub wave_interval: u64,
    #[serde(default = "default_wave_size")]
    pub wave_size: u32,
    #[serde(default = "default_spawn_gap")]
    pub spawn_gap: u64,
    #[serde(default = "default_base_health")]
    pub base_health: f32,
    #[serde(default = "default_health_growth")]
    pub health_growth: f32,
    #[serde(default = "default_enemy_speed")]
    pub speed: f32,
    #[serde(default = "default_bounty")]
    pub bounty: i64,
    #[serde(default = "default_lives")]
    pub lives: u32,
}

impl DefenseSettings {
    pub fn new(entry: Coord, base: Coord) -> Self {
        Self {
            entry,
            base,
            wave_interval: default_wave_interval(),
            wave_size: default_wave_size(),
            spawn_gap: default_spawn_gap(),
            base_health: default_base_health(),
            health_growth: default_health_growth(),
            speed: default_enemy_speed(),
            bounty: default_bounty(),
            lives: default_lives(),
        }
    }

    pub fn health_for_wave(&self, wave: u32) -> f32 {
        self.base_health * self.health_growth.powi(wave.saturating_sub(1) as i32)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub economy: EconomySettings,
    #[serde(default)]
    pub park: ParkSettings,
    #[serde(default)]
    pub staff: StaffSettings,
    #[serde(default)]
    pub coasters: CoasterSettings,
    #[serde(default)]
    pub city: Option<CitySettings>,
    #[serde(default)]
    pub defense: Option<DefenseSettings>,
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        self.calendar.validate()?;
        if !(0.0..=1.0).contains(&self.economy.refund_ratio) {
            return Err("refund_ratio must lie in 0..=1".into());
        }
        let park = &self.park;
        if park.spawn_interval == 0 {
            return Err("park spawn_interval must be at least 1".into());
        }
        if park.min_decision_ticks > park.max_decision_ticks {
            return Err("min_decision_ticks exceeds max_decision_ticks".into());
        }
        if park.guest_cash_min > park.guest_cash_max {
            return Err("guest_cash_min exceeds guest_cash_max".into());
        }
        if self.staff.area_radius < 0 {
            return Err("staff area_radius must not be negative".into());
        }
        let coasters = &self.coasters;
        if coasters.trains == 0 || coasters.cars_per_train == 0 || coasters.dispatch_ticks == 0 {
            return Err("coasters need at least one train, one car and one dispatch tick".into());
        }
        if let Some(city) = &self.city {
            if city.spawn_interval == 0 || city.min_lifespan > city.max_lifespan {
                return Err("city spawn_interval or lifespan range is invalid".into());
            }
        }
        if let Some(defense) = &self.defense {
            if defense.wave_interval == 0 || defense.spawn_gap == 0 {
                return Err("defense wave_interval and spawn_gap must be at least 1".into());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UiState {
    #[serde(default)]
    pub selected_tool: Tool,
    #[serde(default)]
    pub panel: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefenseState {
    pub wave: u32,
    /// Units of the current wave still to spawn.
    pub remaining: u32,
    pub wave_started: u64,
    pub lives: u32,
    /// Cached route from entry to base; cleared whenever the grid changes.
    #[serde(default)]
    pub level_path: Option<Vec<Coord>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub guests: usize,
    pub staff: usize,
    pub citizens: usize,
    pub enemies: usize,
    pub average_happiness: f32,
    /// 0..=1000, kept at its last value while the park is empty.
    pub park_rating: u32,
    pub admitted_total: u64,
    pub slain_total: u64,
    /// Coasters with a closed circuit.
    #[serde(default)]
    pub coasters: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub version: u32,
    pub seed: u64,
    pub size: usize,
    pub grid: Grid,
    pub agents: Vec<Agent>,
    pub next_agent_id: u32,
    pub ledger: Ledger,
    pub calendar: Calendar,
    /// Boundary crossed by the tick that produced this state.
    #[serde(default)]
    pub rollover: Rollover,
    #[serde(default)]
    pub weather: WeatherState,
    pub settings: Settings,
    #[serde(default)]
    pub speed: u8,
    #[serde(default)]
    pub ui: UiState,
    #[serde(default)]
    pub defense: DefenseState,
    /// One entry per station whose track forms a closed circuit, ordered by
    /// station position.
    #[serde(default)]
    pub coasters: Vec<Coaster>,
    #[serde(default)]
    pub stats: Stats,
    /// Ledger deltas produced by agents, resolved by the economy system.
    #[serde(default)]
    pub pending: Vec<LedgerDelta>,
}

impl GameState {
    pub fn new(grid: Grid, settings: Settings, seed: u64) -> Self {
        let ledger = Ledger::new(settings.economy.starting_cash, settings.economy.history_months);
        let calendar = Calendar::at(0, &settings.calendar);
        let defense = DefenseState {
            lives: settings.defense.as_ref().map_or(0, |d| d.lives),
            ..DefenseState::default()
        };
        Self {
            version: STATE_VERSION,
            seed,
            size: grid.size(),
            grid,
            agents: Vec::new(),
            next_agent_id: 1,
            ledger,
            calendar,
            rollover: Rollover::None,
            weather: WeatherState::default(),
            settings,
            speed: 1,
            ui: UiState::default(),
            defense,
            coasters: Vec::new(),
            stats: Stats::default(),
            pending: Vec::new(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.calendar.tick
    }

    pub fn allocate_id(&mut self) -> AgentId {
        let id = AgentId(self.next_agent_id);
        self.next_agent_id += 1;
        id
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    pub fn guest_count(&self) -> usize {
        self.agents.iter().filter(|a| a.as_guest().is_some()).count()
    }

    pub fn citizen_count(&self) -> usize {
        self.agents.iter().filter(|a| a.as_citizen().is_some()).count()
    }

    /// Forget the cached enemy route after any grid edit.
    pub fn grid_changed(&mut self) {
        self.defense.level_path = None;
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            tick: self.tick(),
            date: self.calendar.to_string(),
            speed: self.speed,
            balance: self.ledger.balance(),
            guests: self.stats.guests,
            staff: self.stats.staff,
            citizens: self.stats.citizens,
            enemies: self.stats.enemies,
            coasters: self.stats.coasters,
            park_rating: self.stats.park_rating,
            weather: self.weather.condition,
            temperature_c: self.weather.temperature_c,
            wave: self.defense.wave,
            lives: self.defense.lives,
            selected_tool: self.ui.selected_tool.to_string(),
        }
    }

    /// Consistency check applied to every imported state.
    pub fn validate(&self) -> Result<(), String> {
        if self.version != STATE_VERSION {
            return Err(format!("unsupported state version {}", self.version));
        }
        self.grid.validate()?;
        if self.size != self.grid.size() {
            return Err(format!(
                "size {} does not match grid size {}",
                self.size,
                self.grid.size()
            ));
        }
        self.settings.validate()?;
        if self.calendar != Calendar::at(self.calendar.tick, &self.settings.calendar) {
            return Err("calendar does not match its tick".into());
        }
        if self.speed > 3 {
            return Err(format!("speed {} is out of range", self.speed));
        }
        if !self.ledger.reconciles() {
            return Err("ledger balance does not reconcile with its history".into());
        }
        let mut seen = BTreeSet::new();
        for agent in &self.agents {
            if agent.id.0 >= self.next_agent_id || !seen.insert(agent.id) {
                return Err(format!("agent id {} is duplicated or unallocated", agent.id.0));
            }
            if !self.grid.in_bounds(agent.motion.tile) || !agent.motion.is_consistent() {
                return Err(format!("agent {} has an invalid position or route", agent.id.0));
            }
            if agent.motion.path.iter().any(|node| !self.grid.in_bounds(*node)) {
                return Err(format!("agent {} routes off the map", agent.id.0));
            }
            if let AgentKind::Staff(staff) = &agent.kind {
                let area = staff.area;
                if area.is_empty()
                    || !self.grid.in_bounds(area.min)
                    || !self.grid.in_bounds(area.max)
                {
                    return Err(format!("staff {} has an invalid patrol area", agent.id.0));
                }
            }
        }
        for coaster in &self.coasters {
            coaster.validate().map_err(|err| {
                format!("coaster at ({}, {}): {err}", coaster.station.x, coaster.station.y)
            })?;
        }
        Ok(())
    }
}

/// Compact read-only view for polling clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSummary {
    pub tick: u64,
    pub date: String,
    pub speed: u8,
    pub balance: i64,
    pub guests: usize,
    pub staff: usize,
    pub citizens: usize,
    pub enemies: usize,
    pub coasters: usize,
    pub park_rating: u32,
    pub weather: Condition,
    pub temperature_c: f32,
    pub wave: u32,
    pub lives: u32,
    pub selected_tool: String,
}
