//! Structure catalog and placement tools

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    TreeOak,
    FlowerBed,
    Fountain,
    Bench,
    Lamp,
    TrashCan,
    BurgerStall,
    DrinkStall,
    IceCreamCart,
    SouvenirShop,
    Restroom,
    FirstAid,
    Carousel,
    Teacups,
    BumperCars,
    FerrisWheel,
    DropTower,
    LogFlume,
    CoasterStation,
    House,
    Office,
    ArrowTower,
    FrostTower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureClass {
    Scenery,
    Furniture,
    Food,
    Shop,
    Ride,
    Housing,
    Workplace,
    Tower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Sanitation,
    Seating,
    Lighting,
    Scenery,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RideStats {
    pub capacity: u32,
    pub duration_ticks: u32,
    pub excitement: f32,
    pub nausea: f32,
    /// Chance per operating day of a breakdown.
    pub breakdown_chance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TowerStats {
    pub range: u32,
    pub damage: f32,
    pub fire_interval: u64,
    /// Speed multiplier and its duration in ticks.
    pub slow: Option<(f32, u32)>,
}

/// What visiting a food stall, drink stall or restroom restores.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Refreshment {
    pub hunger: f32,
    pub thirst: f32,
    pub bathroom: f32,
    pub happiness: f32,
}

impl StructureKind {
    pub const ALL: [StructureKind; 23] = [
        StructureKind::TreeOak,
        StructureKind::FlowerBed,
        StructureKind::Fountain,
        StructureKind::Bench,
        StructureKind::Lamp,
        StructureKind::TrashCan,
        StructureKind::BurgerStall,
        StructureKind::DrinkStall,
        StructureKind::IceCreamCart,
        StructureKind::SouvenirShop,
        StructureKind::Restroom,
        StructureKind::FirstAid,
        StructureKind::Carousel,
        StructureKind::Teacups,
        StructureKind::BumperCars,
        StructureKind::FerrisWheel,
        StructureKind::DropTower,
        StructureKind::LogFlume,
        StructureKind::CoasterStation,
        StructureKind::House,
        StructureKind::Office,
        StructureKind::ArrowTower,
        StructureKind::FrostTower,
    ];

    pub fn id(self) -> &'static str {
        match self {
            StructureKind::TreeOak => "tree_oak",
            StructureKind::FlowerBed => "flower_bed",
            StructureKind::Fountain => "fountain",
            StructureKind::Bench => "bench",
            StructureKind::Lamp => "lamp",
            StructureKind::TrashCan => "trash_can",
            StructureKind::BurgerStall => "burger_stall",
            StructureKind::DrinkStall => "drink_stall",
            StructureKind::IceCreamCart => "ice_cream_cart",
            StructureKind::SouvenirShop => "souvenir_shop",
            StructureKind::Restroom => "restroom",
            StructureKind::FirstAid => "first_aid",
            StructureKind::Carousel => "carousel",
            StructureKind::Teacups => "teacups",
            StructureKind::BumperCars => "bumper_cars",
            StructureKind::FerrisWheel => "ferris_wheel",
            StructureKind::DropTower => "drop_tower",
            StructureKind::LogFlume => "log_flume",
            StructureKind::CoasterStation => "coaster_station",
            StructureKind::House => "house",
            StructureKind::Office => "office",
            StructureKind::ArrowTower => "arrow_tower",
            StructureKind::FrostTower => "frost_tower",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.id() == id)
    }

    pub fn class(self) -> StructureClass {
        use StructureKind::*;
        match self {
            TreeOak | FlowerBed | Fountain => StructureClass::Scenery,
            Bench | Lamp | TrashCan => StructureClass::Furniture,
            BurgerStall | DrinkStall | IceCreamCart => StructureClass::Food,
            SouvenirShop | Restroom | FirstAid => StructureClass::Shop,
            Carousel | Teacups | BumperCars | FerrisWheel | DropTower | LogFlume
            | CoasterStation => StructureClass::Ride,
            House => StructureClass::Housing,
            Office => StructureClass::Workplace,
            ArrowTower | FrostTower => StructureClass::Tower,
        }
    }

    pub fn cost(self) -> i64 {
        use StructureKind::*;
        match self {
            TreeOak => 30,
            FlowerBed => 20,
            Fountain => 350,
            Bench => 50,
            Lamp => 100,
            TrashCan => 30,
            BurgerStall => 200,
            DrinkStall => 150,
            IceCreamCart => 200,
            SouvenirShop => 400,
            Restroom => 300,
            FirstAid => 400,
            Carousel => 5_000,
            Teacups => 4_000,
            BumperCars => 6_000,
            FerrisWheel => 12_000,
            DropTower => 20_000,
            LogFlume => 25_000,
            CoasterStation => 3_000,
            House => 800,
            Office => 1_500,
            ArrowTower => 100,
            FrostTower => 150,
        }
    }

    pub fn upkeep_per_day(self) -> i64 {
        match self.class() {
            StructureClass::Scenery | StructureClass::Furniture => 0,
            StructureClass::Food | StructureClass::Shop => 10,
            StructureClass::Ride => self.cost() / 200,
            StructureClass::Housing | StructureClass::Workplace => 5,
            StructureClass::Tower => 2,
        }
    }

    /// What a guest pays per visit.
    pub fn price(self) -> i64 {
        use StructureKind::*;
        match self {
            BurgerStall => 12,
            DrinkStall => 6,
            IceCreamCart => 8,
            SouvenirShop => 10,
            Restroom => 1,
            FirstAid => 0,
            Carousel | Teacups => 10,
            BumperCars => 12,
            FerrisWheel => 15,
            DropTower | LogFlume => 20,
            CoasterStation => 25,
            _ => 0,
        }
    }

    /// Only rides, stalls, shops, houses, offices and towers stop agents;
    /// scenery sits off-footway and furniture sits on it.
    pub fn blocks_movement(self) -> bool {
        !matches!(
            self.class(),
            StructureClass::Scenery | StructureClass::Furniture
        )
    }

    pub fn requires_footway(self) -> bool {
        self.class() == StructureClass::Furniture
    }

    pub fn service(self) -> Option<Service> {
        match self {
            StructureKind::TrashCan => Some(Service::Sanitation),
            StructureKind::Bench => Some(Service::Seating),
            StructureKind::Lamp => Some(Service::Lighting),
            StructureKind::TreeOak | StructureKind::FlowerBed | StructureKind::Fountain => {
                Some(Service::Scenery)
            }
            _ => None,
        }
    }

    pub fn ride(self) -> Option<RideStats> {
        let stats = match self {
            StructureKind::Carousel => (16, 20, 25.0, 2.0, 0.01),
            StructureKind::Teacups => (12, 18, 30.0, 12.0, 0.015),
            StructureKind::BumperCars => (10, 24, 40.0, 6.0, 0.02),
            StructureKind::FerrisWheel => (24, 40, 35.0, 3.0, 0.01),
            StructureKind::DropTower => (8, 15, 70.0, 25.0, 0.03),
            StructureKind::LogFlume => (12, 35, 60.0, 10.0, 0.025),
            StructureKind::CoasterStation => (16, 45, 65.0, 15.0, 0.02),
            _ => return None,
        };
        Some(RideStats {
            capacity: stats.0,
            duration_ticks: stats.1,
            excitement: stats.2,
            nausea: stats.3,
            breakdown_chance: stats.4,
        })
    }

    pub fn tower(self) -> Option<TowerStats> {
        match self {
            StructureKind::ArrowTower => Some(TowerStats {
                range: 3,
                damage: 12.0,
                fire_interval: 4,
                slow: None,
            }),
            StructureKind::FrostTower => Some(TowerStats {
                range: 2,
                damage: 4.0,
                fire_interval: 6,
                slow: Some((0.5, 12)),
            }),
            _ => None,
        }
    }

    pub fn refreshment(self) -> Option<Refreshment> {
        match self {
            StructureKind::BurgerStall => Some(Refreshment {
                hunger: 60.0,
                thirst: -5.0,
                happiness: 6.0,
                ..Refreshment::default()
            }),
            StructureKind::DrinkStall => Some(Refreshment {
                thirst: 60.0,
                bathroom: -10.0,
                happiness: 4.0,
                ..Refreshment::default()
            }),
            StructureKind::IceCreamCart => Some(Refreshment {
                hunger: 20.0,
                thirst: 20.0,
                happiness: 8.0,
                ..Refreshment::default()
            }),
            StructureKind::Restroom => Some(Refreshment {
                bathroom: 100.0,
                happiness: 2.0,
                ..Refreshment::default()
            }),
            StructureKind::SouvenirShop => Some(Refreshment {
                happiness: 5.0,
                ..Refreshment::default()
            }),
            StructureKind::FirstAid => Some(Refreshment {
                happiness: 3.0,
                ..Refreshment::default()
            }),
            _ => None,
        }
    }

    /// Residents per house, jobs per office.
    pub fn occupancy(self) -> u32 {
        match self {
            StructureKind::House => 4,
            StructureKind::Office => 8,
            _ => 0,
        }
    }

    pub fn required_zone(self) -> Option<crate::grid::Zone> {
        match self {
            StructureKind::House => Some(crate::grid::Zone::Residential),
            StructureKind::Office => Some(crate::grid::Zone::Commercial),
            _ => None,
        }
    }

    /// Time in ticks a guest spends at a stall or shop.
    pub fn visit_ticks(self) -> u32 {
        match self.class() {
            StructureClass::Food => 10,
            StructureClass::Shop => 8,
            _ => 0,
        }
    }
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Handyman,
    Mechanic,
}

impl StaffRole {
    pub fn hire_cost(self) -> i64 {
        match self {
            StaffRole::Handyman => 300,
            StaffRole::Mechanic => 400,
        }
    }

    pub fn wage_per_day(self) -> i64 {
        match self {
            StaffRole::Handyman => 40,
            StaffRole::Mechanic => 60,
        }
    }
}

/// Coaster track laid one tile at a time. The station that closes a circuit
/// is a [`StructureKind::CoasterStation`], not a piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackPiece {
    Straight,
    TurnLeft,
    TurnRight,
    SlopeUp,
    SlopeDown,
}

impl TrackPiece {
    pub const ALL: [TrackPiece; 5] = [
        TrackPiece::Straight,
        TrackPiece::TurnLeft,
        TrackPiece::TurnRight,
        TrackPiece::SlopeUp,
        TrackPiece::SlopeDown,
    ];

    pub const COST: i64 = 50;

    pub fn id(self) -> &'static str {
        match self {
            TrackPiece::Straight => "coaster_track_straight",
            TrackPiece::TurnLeft => "coaster_track_turn_left",
            TrackPiece::TurnRight => "coaster_track_turn_right",
            TrackPiece::SlopeUp => "coaster_track_slope_up",
            TrackPiece::SlopeDown => "coaster_track_slope_down",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|piece| piece.id() == id)
    }

    /// Multiplier on train velocity while the lead car is on this piece.
    pub fn speed_factor(self) -> f32 {
        match self {
            TrackPiece::Straight => 1.0,
            TrackPiece::TurnLeft | TrackPiece::TurnRight => 0.75,
            TrackPiece::SlopeUp => 0.5,
            TrackPiece::SlopeDown => 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tool", content = "target")]
pub enum Tool {
    #[default]
    Select,
    Bulldoze,
    Path,
    Queue,
    ZoneResidential,
    ZoneCommercial,
    Hire(StaffRole),
    Track(TrackPiece),
    Build(StructureKind),
}

impl Tool {
    pub fn parse(id: &str) -> Option<Tool> {
        let tool = match id {
            "select" => Tool::Select,
            "bulldoze" => Tool::Bulldoze,
            "path" => Tool::Path,
            "queue" => Tool::Queue,
            "zone_residential" => Tool::ZoneResidential,
            "zone_commercial" => Tool::ZoneCommercial,
            "hire_handyman" => Tool::Hire(StaffRole::Handyman),
            "hire_mechanic" => Tool::Hire(StaffRole::Mechanic),
            other => match TrackPiece::from_id(other) {
                Some(piece) => Tool::Track(piece),
                None => Tool::Build(StructureKind::from_id(other)?),
            },
        };
        Some(tool)
    }

    pub fn cost(self) -> i64 {
        match self {
            Tool::Select | Tool::Bulldoze => 0,
            Tool::Path => 10,
            Tool::Queue => 15,
            Tool::ZoneResidential | Tool::ZoneCommercial => 5,
            Tool::Hire(role) => role.hire_cost(),
            Tool::Track(_) => TrackPiece::COST,
            Tool::Build(kind) => kind.cost(),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Select => f.write_str("select"),
            Tool::Bulldoze => f.write_str("bulldoze"),
            Tool::Path => f.write_str("path"),
            Tool::Queue => f.write_str("queue"),
            Tool::ZoneResidential => f.write_str("zone_residential"),
            Tool::ZoneCommercial => f.write_str("zone_commercial"),
            Tool::Hire(StaffRole::Handyman) => f.write_str("hire_handyman"),
            Tool::Hire(StaffRole::Mechanic) => f.write_str("hire_mechanic"),
            Tool::Track(piece) => f.write_str(piece.id()),
            Tool::Build(kind) => write!(f, "{kind}"),
        }
    }
}
