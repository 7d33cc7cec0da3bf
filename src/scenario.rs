use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::{
    clock::CalendarConfig,
    commands::{self, CommandError},
    grid::{Coord, Grid, OverlayMode, OverlayPreset},
    ledger::Ledger,
    state::{
        CitySettings, CoasterSettings, DefenseSettings, EconomySettings, GameState, ParkSettings,
        Settings, StaffSettings,
    },
};

fn default_snapshot_interval_ticks() -> u64 {
    0
}

fn default_grid_size() -> usize {
    32
}

fn default_require_footway() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub ticks: Option<u64>,
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u64,
    #[serde(default)]
    pub grid: ScenarioGrid,
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
    /// Pre-built content, placed free of charge.
    #[serde(default)]
    pub layout: Vec<LayoutEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioGrid {
    #[serde(default = "default_grid_size")]
    pub size: usize,
    #[serde(default = "default_require_footway")]
    pub require_footway: bool,
    #[serde(default)]
    pub overlays: Vec<ScenarioOverlay>,
}

impl Default for ScenarioGrid {
    fn default() -> Self {
        Self {
            size: default_grid_size(),
            require_footway: default_require_footway(),
            overlays: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioOverlay {
    #[serde(flatten)]
    pub preset: OverlayPreset,
    #[serde(default)]
    pub mode: OverlayMode,
}

/// One tool applied either at a single tile or along a line `from` → `to`
/// (horizontal leg first, then vertical).
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutEntry {
    pub tool: String,
    #[serde(default)]
    pub at: Option<[i32; 2]>,
    #[serde(default)]
    pub from: Option<[i32; 2]>,
    #[serde(default)]
    pub to: Option<[i32; 2]>,
}

impl LayoutEntry {
    pub fn coords(&self) -> Result<Vec<Coord>> {
        match (self.at, self.from, self.to) {
            (Some([x, y]), None, None) => Ok(vec![Coord::new(x, y)]),
            (None, Some(from), Some(to)) => Ok(line(from, to)),
            _ => bail!(
                "layout entry for `{}` needs either `at` or both `from` and `to`",
                self.tool
            ),
        }
    }
}

fn line([x0, y0]: [i32; 2], [x1, y1]: [i32; 2]) -> Vec<Coord> {
    let step_x = if x1 >= x0 { 1 } else { -1 };
    let step_y = if y1 >= y0 { 1 } else { -1 };
    let mut coords = Vec::new();
    let mut x = x0;
    loop {
        coords.push(Coord::new(x, y0));
        if x == x1 {
            break;
        }
        x += step_x;
    }
    let mut y = y0;
    while y != y1 {
        y += step_y;
        coords.push(Coord::new(x1, y));
    }
    coords
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn settings(&self) -> Settings {
        Settings {
            calendar: self.calendar.clone(),
            economy: self.economy.clone(),
            park: self.park.clone(),
            staff: self.staff.clone(),
            coasters: self.coasters.clone(),
            city: self.city.clone(),
            defense: self.defense.clone(),
        }
    }

    /// Build the opening state: terrain overlays, then the layout, then a
    /// fresh ledger at the configured starting cash.
    pub fn build_state(&self) -> Result<GameState> {
        let settings = self.settings();
        settings
            .validate()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Scenario `{}` has invalid settings", self.name))?;
        if self.grid.size == 0 {
            bail!("Scenario `{}` has an empty grid", self.name);
        }

        let mut grid = Grid::new(self.grid.size, self.grid.require_footway);
        for overlay in &self.grid.overlays {
            grid.apply_preset(&overlay.preset, overlay.mode);
        }

        let mut state = GameState::new(grid, settings, self.seed);
        state.ledger = Ledger::new(i64::MAX / 4, state.settings.economy.history_months);
        for entry in &self.layout {
            let tool = commands::parse_tool(&entry.tool)
                .with_context(|| format!("Scenario `{}` layout", self.name))?;
            for at in entry.coords()? {
                match commands::place_at(&state, at, tool) {
                    Ok((next, _)) => state = next,
                    // Crossing lines share tiles.
                    Err(CommandError::Occupied { .. })
                        if state.grid.tile(at).is_some_and(|tile| tile.footway.is_some()) => {}
                    Err(err) => {
                        return Err(err).with_context(|| {
                            format!(
                                "Scenario `{}` cannot place {} at ({}, {})",
                                self.name, entry.tool, at.x, at.y
                            )
                        })
                    }
                }
            }
        }
        state.ledger = Ledger::new(
            state.settings.economy.starting_cash,
            state.settings.economy.history_months,
        );
        Ok(state)
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(1_440)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_runs_horizontal_then_vertical() {
        assert_eq!(
            line([0, 0], [2, 1]),
            vec![
                Coord::new(0, 0),
                Coord::new(1, 0),
                Coord::new(2, 0),
                Coord::new(2, 1)
            ]
        );
        assert_eq!(line([3, 3], [3, 3]), vec![Coord::new(3, 3)]);
    }

    #[test]
    fn layout_is_free_and_crossings_are_tolerated() {
        let yaml = r#"
name: crossroads
seed: 3
grid:
  size: 10
layout:
  - tool: path
    from: [0, 5]
    to: [9, 5]
  - tool: path
    from: [5, 0]
    to: [5, 9]
  - tool: bench
    at: [2, 5]
"#;
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        let state = scenario.build_state().unwrap();
        assert_eq!(state.ledger.balance(), 50_000);
        assert!(state.grid.is_walkable(Coord::new(5, 0)));
        assert!(state.grid.is_walkable(Coord::new(9, 5)));
        assert_eq!(state.grid.entrances().len(), 4);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn bad_layout_entries_fail_with_context() {
        let yaml = r#"
name: broken
seed: 1
layout:
  - tool: carousel
"#;
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert!(scenario.build_state().is_err());
    }
}
