//! Player commands. Each one takes the current state and either returns the
//! next state or an error; on error the caller's state is untouched, so a
//! failed command can never half-apply.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agents::{Agent, AgentId, AgentKind, Area, Motion, Staff};
use crate::catalog::{StructureKind, Tool};
use crate::grid::{Coord, Footway, Structure, Zone};
use crate::ledger::{Category, InsufficientFunds, LedgerDelta};
use crate::state::GameState;

/// Fields an imported blob must carry before it is even deserialized.
const REQUIRED_FIELDS: [&str; 9] = [
    "version",
    "seed",
    "size",
    "grid",
    "agents",
    "next_agent_id",
    "ledger",
    "calendar",
    "settings",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Use `tool`, or the selected tool when omitted, on a tile.
    PlaceAt {
        x: i32,
        y: i32,
        #[serde(default)]
        tool: Option<String>,
    },
    RemoveAt {
        x: i32,
        y: i32,
    },
    SetSpeed {
        speed: u8,
    },
    SetTool {
        tool: String,
    },
    SetPanel {
        #[serde(default)]
        panel: Option<String>,
    },
    LoadState {
        blob: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Applied {
    Placed { cost: i64 },
    Hired { id: AgentId, cost: i64 },
    Removed { refund: i64 },
    SpeedChanged { speed: u8 },
    ToolChanged { tool: String },
    PanelChanged,
    Loaded,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("state blob is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("state blob is not a JSON object")]
    NotAnObject,
    #[error("state blob is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("state blob does not match the state schema: {0}")]
    Schema(#[source] serde_json::Error),
    #[error("state blob is inconsistent: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("({x}, {y}) is outside the map")]
    OutOfBounds { x: i32, y: i32 },
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("the select tool does not place anything")]
    NothingToPlace,
    #[error("({x}, {y}) is already occupied")]
    Occupied { x: i32, y: i32 },
    #[error("({x}, {y}) cannot take {tool}: {reason}")]
    Unsuitable {
        x: i32,
        y: i32,
        tool: String,
        reason: &'static str,
    },
    #[error("cannot afford {cost}, balance is {balance}")]
    InsufficientFunds { balance: i64, cost: i64 },
    #[error("nothing to remove at ({x}, {y})")]
    NothingToRemove { x: i32, y: i32 },
    #[error("speed must be between 0 and 3, got {0}")]
    InvalidSpeed(u8),
    #[error(transparent)]
    Load(#[from] LoadError),
}

impl From<InsufficientFunds> for CommandError {
    fn from(value: InsufficientFunds) -> Self {
        CommandError::InsufficientFunds {
            balance: value.balance,
            cost: value.cost,
        }
    }
}

pub type CommandResult = Result<(GameState, Applied), CommandError>;

pub fn apply(state: &GameState, command: &Command) -> CommandResult {
    match command {
        Command::PlaceAt { x, y, tool } => {
            let tool = match tool {
                Some(id) => parse_tool(id)?,
                None => state.ui.selected_tool,
            };
            place_at(state, Coord::new(*x, *y), tool)
        }
        Command::RemoveAt { x, y } => remove_at(state, Coord::new(*x, *y)),
        Command::SetSpeed { speed } => set_speed(state, *speed),
        Command::SetTool { tool } => set_tool(state, tool),
        Command::SetPanel { panel } => {
            let mut next = state.clone();
            next.ui.panel = panel.clone();
            Ok((next, Applied::PanelChanged))
        }
        Command::LoadState { blob } => Ok((load_state(blob)?, Applied::Loaded)),
    }
}

pub fn parse_tool(id: &str) -> Result<Tool, CommandError> {
    Tool::parse(id).ok_or_else(|| CommandError::UnknownTool(id.to_string()))
}

fn unsuitable(at: Coord, tool: Tool, reason: &'static str) -> CommandError {
    CommandError::Unsuitable {
        x: at.x,
        y: at.y,
        tool: tool.to_string(),
        reason,
    }
}

/// Validate `tool` against the tile at `at` without touching anything.
pub fn check_placement(state: &GameState, at: Coord, tool: Tool) -> Result<(), CommandError> {
    let tile = state
        .grid
        .tile(at)
        .ok_or(CommandError::OutOfBounds { x: at.x, y: at.y })?;
    let occupied = CommandError::Occupied { x: at.x, y: at.y };
    match tool {
        Tool::Select => Err(CommandError::NothingToPlace),
        Tool::Bulldoze => Ok(()),
        Tool::Path | Tool::Queue => {
            if tile.is_developed() {
                return Err(occupied);
            }
            if !tile.terrain.accepts_footway() {
                return Err(unsuitable(at, tool, "terrain cannot carry a footway"));
            }
            Ok(())
        }
        Tool::ZoneResidential | Tool::ZoneCommercial => {
            if tile.is_developed() {
                return Err(occupied);
            }
            if !tile.terrain.accepts_structure() {
                return Err(unsuitable(at, tool, "terrain cannot be zoned"));
            }
            if tile.zone == zone_for(tool) {
                return Err(unsuitable(at, tool, "already zoned"));
            }
            Ok(())
        }
        Tool::Hire(_) => {
            if !state.grid.is_walkable(at) {
                return Err(unsuitable(at, tool, "staff must start on a walkable tile"));
            }
            Ok(())
        }
        Tool::Track(_) => {
            if tile.is_developed() || state.agents.iter().any(|agent| agent.motion.tile == at) {
                return Err(occupied);
            }
            if !tile.terrain.accepts_footway() {
                return Err(unsuitable(at, tool, "terrain cannot carry track"));
            }
            if tile.zone != Zone::Unzoned {
                return Err(unsuitable(at, tool, "zoned land cannot carry track"));
            }
            Ok(())
        }
        Tool::Build(kind) => {
            if tile.structure.is_some() || tile.track.is_some() {
                return Err(occupied);
            }
            if kind.requires_footway() {
                if tile.footway.is_none() {
                    return Err(unsuitable(at, tool, "needs a footway"));
                }
            } else {
                if tile.footway.is_some() {
                    return Err(occupied);
                }
                if !tile.terrain.accepts_structure() {
                    return Err(unsuitable(at, tool, "terrain cannot carry a structure"));
                }
            }
            if let Some(zone) = kind.required_zone() {
                if tile.zone != zone {
                    return Err(unsuitable(at, tool, "wrong zone"));
                }
            }
            let someone_here = state.agents.iter().any(|agent| agent.motion.tile == at);
            if kind.blocks_movement() && someone_here {
                return Err(occupied);
            }
            Ok(())
        }
    }
}

fn zone_for(tool: Tool) -> Zone {
    match tool {
        Tool::ZoneResidential => Zone::Residential,
        Tool::ZoneCommercial => Zone::Commercial,
        _ => Zone::Unzoned,
    }
}

/// Validate, charge and place in one step.
pub fn place_at(state: &GameState, at: Coord, tool: Tool) -> CommandResult {
    check_placement(state, at, tool)?;
    if tool == Tool::Bulldoze {
        return remove_at(state, at);
    }

    let cost = tool.cost();
    let mut next = state.clone();
    let category = match tool {
        Tool::Hire(_) => Category::Staffing,
        _ => Category::Construction,
    };
    next.ledger.spend(category, cost)?;

    if let Tool::Hire(role) = tool {
        let id = next.allocate_id();
        let area = Area::around(at, next.settings.staff.area_radius, next.grid.size());
        let motion = Motion::at(at, next.settings.staff.speed);
        next.agents
            .push(Agent::new(id, motion, AgentKind::Staff(Staff::new(role, area))));
        return Ok((next, Applied::Hired { id, cost }));
    }

    let tile = next
        .grid
        .tile_mut(at)
        .ok_or(CommandError::OutOfBounds { x: at.x, y: at.y })?;
    match tool {
        Tool::Path => {
            tile.footway = Some(Footway::Path);
            tile.invested += cost;
        }
        Tool::Queue => {
            tile.footway = Some(Footway::Queue);
            tile.invested += cost;
        }
        Tool::ZoneResidential | Tool::ZoneCommercial => {
            tile.zone = zone_for(tool);
            tile.invested += cost;
        }
        Tool::Track(piece) => {
            tile.track = Some(piece);
            tile.invested += cost;
        }
        Tool::Build(kind) => tile.structure = Some(Structure::new(kind, cost)),
        Tool::Select | Tool::Bulldoze | Tool::Hire(_) => {}
    }
    next.grid_changed();
    Ok((next, Applied::Placed { cost }))
}

/// Floor of `invested * ratio`.
pub fn refund_for(invested: i64, ratio: f64) -> i64 {
    (invested as f64 * ratio).floor() as i64
}

/// Remove the topmost thing on a tile: structure, then track or footway,
/// then zoning.
pub fn remove_at(state: &GameState, at: Coord) -> CommandResult {
    let tile = state
        .grid
        .tile(at)
        .ok_or(CommandError::OutOfBounds { x: at.x, y: at.y })?;
    if !tile.is_developed() && tile.zone == Zone::Unzoned {
        return Err(CommandError::NothingToRemove { x: at.x, y: at.y });
    }

    let ratio = state.settings.economy.refund_ratio;
    let mut next = state.clone();
    let tile = next
        .grid
        .tile_mut(at)
        .ok_or(CommandError::OutOfBounds { x: at.x, y: at.y })?;
    let refund = if let Some(structure) = tile.structure.take() {
        refund_for(structure.invested, ratio)
    } else if tile.track.take().is_some() {
        refund_for(std::mem::take(&mut tile.invested), ratio)
    } else {
        tile.footway = None;
        tile.zone = Zone::Unzoned;
        tile.litter = 0;
        refund_for(std::mem::take(&mut tile.invested), ratio)
    };
    if refund > 0 {
        next.ledger
            .apply(LedgerDelta::income(Category::Refunds, refund));
    }
    next.grid_changed();
    Ok((next, Applied::Removed { refund }))
}

pub fn set_speed(state: &GameState, speed: u8) -> CommandResult {
    if speed > 3 {
        return Err(CommandError::InvalidSpeed(speed));
    }
    let mut next = state.clone();
    next.speed = speed;
    Ok((next, Applied::SpeedChanged { speed }))
}

pub fn set_tool(state: &GameState, id: &str) -> CommandResult {
    let tool = parse_tool(id)?;
    let mut next = state.clone();
    next.ui.selected_tool = tool;
    Ok((next, Applied::ToolChanged { tool: tool.to_string() }))
}

/// The whole state as a JSON string.
pub fn export_state(state: &GameState) -> Result<String, serde_json::Error> {
    serde_json::to_string(state)
}

/// Parse, schema-check and validate a blob produced by [`export_state`].
pub fn load_state(blob: &str) -> Result<GameState, LoadError> {
    let value: serde_json::Value = serde_json::from_str(blob).map_err(LoadError::Parse)?;
    let object = value.as_object().ok_or(LoadError::NotAnObject)?;
    if let Some(missing) = REQUIRED_FIELDS
        .iter()
        .find(|field| !object.contains_key(**field))
    {
        return Err(LoadError::MissingField(*missing));
    }
    let state: GameState = serde_json::from_value(value).map_err(LoadError::Schema)?;
    state.validate().map_err(LoadError::Inconsistent)?;
    Ok(state)
}

/// Whether a structure of `kind` could go at `at` right now, cost aside.
pub fn can_place(state: &GameState, at: Coord, kind: StructureKind) -> bool {
    check_placement(state, at, Tool::Build(kind)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{StaffRole, TrackPiece};
    use crate::grid::{Grid, Terrain};
    use crate::state::Settings;

    fn state_with_cash(cash: i64) -> GameState {
        let mut settings = Settings::default();
        settings.economy.starting_cash = cash;
        GameState::new(Grid::new(8, true), settings, 1)
    }

    #[test]
    fn affordability_gate_leaves_state_untouched() {
        let state = state_with_cash(50);
        let err = place_at(&state, Coord::new(2, 2), Tool::Build(StructureKind::Lamp)).unwrap_err();
        assert!(matches!(err, CommandError::Unsuitable { .. }));

        let err = place_at(&state, Coord::new(2, 2), Tool::Build(StructureKind::Fountain)).unwrap_err();
        assert!(matches!(
            err,
            CommandError::InsufficientFunds { balance: 50, cost: 350 }
        ));
        assert_eq!(state.ledger.balance(), 50);
        assert!(state.grid.tile(Coord::new(2, 2)).unwrap().structure.is_none());
    }

    #[test]
    fn placing_a_path_charges_and_marks_tile() {
        let state = state_with_cash(1_000);
        let (next, applied) = place_at(&state, Coord::new(0, 4), Tool::Path).unwrap();
        assert_eq!(applied, Applied::Placed { cost: 10 });
        assert_eq!(next.ledger.balance(), 990);
        assert!(next.grid.is_walkable(Coord::new(0, 4)));
        assert!(!state.grid.is_walkable(Coord::new(0, 4)));
    }

    #[test]
    fn refund_is_floor_of_ratio() {
        let mut state = state_with_cash(100_000);
        state.settings.economy.refund_ratio = 0.33;
        let (placed, _) = place_at(&state, Coord::new(3, 3), Tool::Build(StructureKind::Teacups)).unwrap();
        let (removed, applied) = remove_at(&placed, Coord::new(3, 3)).unwrap();
        assert_eq!(applied, Applied::Removed { refund: 1_320 });
        assert_eq!(removed.ledger.balance(), 100_000 - 4_000 + 1_320);
        assert!(removed.ledger.reconciles());
    }

    #[test]
    fn occupied_and_out_of_bounds_are_rejected() {
        let state = state_with_cash(1_000);
        let (state, _) = place_at(&state, Coord::new(1, 1), Tool::Path).unwrap();
        assert!(matches!(
            place_at(&state, Coord::new(1, 1), Tool::Queue),
            Err(CommandError::Occupied { x: 1, y: 1 })
        ));
        assert!(matches!(
            place_at(&state, Coord::new(8, 0), Tool::Path),
            Err(CommandError::OutOfBounds { x: 8, y: 0 })
        ));
        assert!(matches!(
            remove_at(&state, Coord::new(5, 5)),
            Err(CommandError::NothingToRemove { .. })
        ));
    }

    #[test]
    fn water_rejects_footways() {
        let mut state = state_with_cash(1_000);
        state.grid.tile_mut(Coord::new(4, 4)).unwrap().terrain = Terrain::Water;
        assert!(matches!(
            place_at(&state, Coord::new(4, 4), Tool::Path),
            Err(CommandError::Unsuitable { .. })
        ));
    }

    #[test]
    fn houses_need_residential_zoning() {
        let state = state_with_cash(10_000);
        let at = Coord::new(2, 5);
        assert!(!can_place(&state, at, StructureKind::House));
        let (zoned, _) = place_at(&state, at, Tool::ZoneResidential).unwrap();
        assert!(can_place(&zoned, at, StructureKind::House));
        assert!(!can_place(&zoned, at, StructureKind::Office));
    }

    #[test]
    fn hiring_spawns_staff_on_a_footway() {
        let state = state_with_cash(10_000);
        let (paved, _) = place_at(&state, Coord::new(3, 0), Tool::Path).unwrap();
        let (hired, applied) = place_at(&paved, Coord::new(3, 0), Tool::Hire(StaffRole::Handyman)).unwrap();
        assert!(matches!(applied, Applied::Hired { cost: 300, .. }));
        assert_eq!(hired.agents.len(), 1);
        assert_eq!(hired.ledger.period_total(Category::Staffing), -300);
    }

    #[test]
    fn unknown_tools_and_speeds_are_rejected() {
        let state = state_with_cash(1_000);
        assert!(matches!(
            set_tool(&state, "laser"),
            Err(CommandError::UnknownTool(_))
        ));
        assert!(matches!(set_speed(&state, 4), Err(CommandError::InvalidSpeed(4))));
        let (paused, _) = set_speed(&state, 0).unwrap();
        assert_eq!(paused.speed, 0);
        let (tooled, _) = set_tool(&state, "log_flume").unwrap();
        assert_eq!(tooled.ui.selected_tool, Tool::Build(StructureKind::LogFlume));
    }

    #[test]
    fn placing_with_selected_tool() {
        let state = state_with_cash(1_000);
        let (state, _) = apply(&state, &Command::SetTool { tool: "path".into() }).unwrap();
        let (state, applied) = apply(
            &state,
            &Command::PlaceAt {
                x: 2,
                y: 2,
                tool: None,
            },
        )
        .unwrap();
        assert_eq!(applied, Applied::Placed { cost: 10 });
        assert!(state.grid.is_walkable(Coord::new(2, 2)));
    }

    #[test]
    fn export_then_load_is_identity() {
        let state = state_with_cash(1_000);
        let (state, _) = place_at(&state, Coord::new(0, 0), Tool::Path).unwrap();
        let blob = export_state(&state).unwrap();
        let loaded = load_state(&blob).unwrap();
        assert_eq!(export_state(&loaded).unwrap(), blob);
    }

    #[test]
    fn load_rejects_missing_fields_and_garbage() {
        assert!(matches!(load_state("not json"), Err(LoadError::Parse(_))));
        assert!(matches!(load_state("[1, 2]"), Err(LoadError::NotAnObject)));
        let state = state_with_cash(1_000);
        let mut value = serde_json::to_value(&state).unwrap();
        value.as_object_mut().unwrap().remove("grid");
        assert!(matches!(
            load_state(&value.to_string()),
            Err(LoadError::MissingField("grid"))
        ));
    }

    #[test]
    fn load_rejects_inconsistent_state() {
        let state = state_with_cash(1_000);
        let mut value = serde_json::to_value(&state).unwrap();
        value["size"] = serde_json::json!(12);
        assert!(matches!(
            load_state(&value.to_string()),
            Err(LoadError::Inconsistent(_))
        ));
    }

    #[test]
    fn load_rejects_inverted_staff_area() {
        let state = state_with_cash(10_000);
        let (state, _) = place_at(&state, Coord::new(3, 0), Tool::Path).unwrap();
        let (state, _) = place_at(&state, Coord::new(3, 0), Tool::Hire(StaffRole::Handyman)).unwrap();
        let mut value = serde_json::to_value(&state).unwrap();
        value["agents"][0]["kind"]["area"]["min"] = serde_json::json!({ "x": 6, "y": 6 });
        value["agents"][0]["kind"]["area"]["max"] = serde_json::json!({ "x": 1, "y": 1 });
        assert!(matches!(
            load_state(&value.to_string()),
            Err(LoadError::Inconsistent(_))
        ));

        let mut value = serde_json::to_value(&state).unwrap();
        value["settings"]["staff"]["area_radius"] = serde_json::json!(-2);
        assert!(matches!(
            load_state(&value.to_string()),
            Err(LoadError::Inconsistent(_))
        ));
    }

    #[test]
    fn track_is_laid_on_bare_ground_and_refunded() {
        let state = state_with_cash(1_000);
        let at = Coord::new(4, 4);
        let tool = Tool::Track(TrackPiece::TurnLeft);
        let (laid, applied) = place_at(&state, at, tool).unwrap();
        assert_eq!(applied, Applied::Placed { cost: 50 });
        assert_eq!(laid.grid.tile(at).unwrap().track, Some(TrackPiece::TurnLeft));
        assert!(matches!(place_at(&laid, at, Tool::Path), Err(CommandError::Occupied { .. })));
        assert!(matches!(
            place_at(&laid, at, Tool::Build(StructureKind::TreeOak)),
            Err(CommandError::Occupied { .. })
        ));

        let (paved, _) = place_at(&state, at, Tool::Path).unwrap();
        assert!(matches!(place_at(&paved, at, tool), Err(CommandError::Occupied { .. })));

        let (removed, applied) = remove_at(&laid, at).unwrap();
        assert_eq!(applied, Applied::Removed { refund: 25 });
        let tile = removed.grid.tile(at).unwrap();
        assert!(tile.track.is_none());
        assert_eq!(tile.invested, 0);
        assert!(removed.ledger.reconciles());
    }

    #[test]
    fn water_and_zoned_land_refuse_track() {
        let mut state = state_with_cash(1_000);
        state.grid.tile_mut(Coord::new(1, 1)).unwrap().terrain = Terrain::Water;
        let tool = Tool::Track(TrackPiece::Straight);
        assert!(matches!(
            place_at(&state, Coord::new(1, 1), tool),
            Err(CommandError::Unsuitable { .. })
        ));
        let (zoned, _) = place_at(&state, Coord::new(2, 2), Tool::ZoneCommercial).unwrap();
        assert!(matches!(
            place_at(&zoned, Coord::new(2, 2), tool),
            Err(CommandError::Unsuitable { .. })
        ));
    }
}
