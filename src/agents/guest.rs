use rand::Rng;
use serde::{Deserialize, Serialize};

use super::movement::{Motion, Step};
use super::AgentContext;
use crate::catalog::{Service, StructureClass, StructureKind};
use crate::grid::{Coord, Footway, Grid};
use crate::ledger::{Category, LedgerDelta};
use crate::pathfinding::{find_nearest, find_path_to_structure};
use crate::rng::{RngExt, SystemRng};
use crate::state::ParkSettings;

/// Hours with daylight; outside them unlit footways weigh on guests.
const DAYLIGHT: (u32, u32) = (7, 19);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestState {
    #[default]
    Entering,
    Wandering,
    HeadingToRide,
    Queuing,
    OnRide,
    LeavingRide,
    HeadingToShop,
    AtShop,
    LeavingPark,
    Left,
}

/// Satisfaction levels on 0..=100; everything but nausea drains over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Needs {
    pub hunger: f32,
    pub thirst: f32,
    pub energy: f32,
    pub bathroom: f32,
    pub happiness: f32,
    pub nausea: f32,
}

impl Default for Needs {
    fn default() -> Self {
        Self {
            hunger: 70.0,
            thirst: 70.0,
            energy: 90.0,
            bathroom: 80.0,
            happiness: 80.0,
            nausea: 0.0,
        }
    }
}

impl Needs {
    fn roll(rng: &mut SystemRng) -> Self {
        Self {
            hunger: rng.between(50.0, 80.0),
            thirst: rng.between(50.0, 80.0),
            energy: rng.between(80.0, 100.0),
            bathroom: rng.between(70.0, 90.0),
            happiness: rng.between(70.0, 100.0),
            nausea: 0.0,
        }
    }

    fn clamp(&mut self) {
        for value in [
            &mut self.hunger,
            &mut self.thirst,
            &mut self.energy,
            &mut self.bathroom,
            &mut self.happiness,
            &mut self.nausea,
        ] {
            *value = value.clamp(0.0, 100.0);
        }
    }

    /// How much a guest with these needs wants to visit `kind`.
    fn appeal(&self, kind: StructureKind) -> Option<f32> {
        let score = match kind {
            StructureKind::BurgerStall => 100.0 - self.hunger,
            StructureKind::DrinkStall => 100.0 - self.thirst,
            StructureKind::IceCreamCart => (200.0 - self.hunger - self.thirst) * 0.45,
            StructureKind::Restroom => (100.0 - self.bathroom) * 1.2,
            StructureKind::FirstAid => self.nausea * 1.1,
            StructureKind::SouvenirShop => {
                if self.happiness > 60.0 {
                    25.0
                } else {
                    10.0
                }
            }
            other => {
                let ride = other.ride()?;
                let queasy = self.nausea / 100.0;
                ride.excitement * 0.6 * (1.0 - queasy) + self.energy * 0.1 - ride.nausea * queasy
            }
        };
        Some(score)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guest {
    pub state: GuestState,
    pub needs: Needs,
    pub cash: i64,
    pub spent: i64,
    /// Structure the guest is heading to, queuing for, riding or visiting.
    pub target: Option<Coord>,
    /// Queue patience, ride time or shop time, depending on state.
    pub timer: u32,
    pub decision_cooldown: u32,
    pub ticks_in_park: u64,
}

/// A guest arriving at `entrance`, or `None` when they cannot afford the
/// entry fee. The fee is already taken from the returned guest's cash.
pub fn admit(
    entrance: Coord,
    grid: &Grid,
    settings: &ParkSettings,
    rng: &mut SystemRng,
) -> Option<(Motion, Guest)> {
    let cash = rng.gen_range(settings.guest_cash_min..=settings.guest_cash_max);
    if cash < settings.entry_fee {
        return None;
    }
    let mut motion = Motion::at(entrance, settings.guest_speed);
    let inward: Vec<Coord> = entrance
        .neighbors()
        .into_iter()
        .filter(|next| grid.is_walkable(*next))
        .collect();
    if !inward.is_empty() {
        let next = inward[rng.gen_range(0..inward.len())];
        motion.set_path(vec![entrance, next]);
    }
    let guest = Guest {
        state: GuestState::Entering,
        needs: Needs::roll(rng),
        cash: cash - settings.entry_fee,
        spent: settings.entry_fee,
        decision_cooldown: draw_cooldown(settings, rng),
        ..Guest::default()
    };
    Some((motion, guest))
}

pub fn advance(
    guest: &mut Guest,
    motion: &mut Motion,
    ctx: &mut AgentContext<'_>,
    rng: &mut SystemRng,
) {
    if guest.state == GuestState::Left {
        return;
    }
    guest.ticks_in_park += 1;
    guest.decision_cooldown = guest.decision_cooldown.saturating_sub(1);
    update_needs(guest, motion, ctx);

    match guest.state {
        GuestState::Queuing => queue(guest, ctx),
        GuestState::OnRide => ride(guest, ctx),
        GuestState::LeavingRide => {
            guest.state = GuestState::Wandering;
            guest.target = None;
            guest.decision_cooldown = guest.decision_cooldown.max(10);
        }
        GuestState::AtShop => visit(guest, motion, ctx, rng),
        GuestState::Left => {}
        _ => walk(guest, motion, ctx, rng),
    }
}

fn is_walking(state: GuestState) -> bool {
    !matches!(
        state,
        GuestState::Queuing | GuestState::OnRide | GuestState::AtShop | GuestState::Left
    )
}

fn update_needs(guest: &mut Guest, motion: &Motion, ctx: &AgentContext<'_>) {
    let dt = ctx.dt;
    let radius = ctx.settings.park.coverage_radius;
    let walking = is_walking(guest.state);
    let coverage = |service| ctx.grid.service_coverage(motion.tile, service, radius).min(1.0);
    // Benches nearby let walkers rest.
    let seating = if walking { coverage(Service::Seating) } else { 0.0 };

    let needs = &mut guest.needs;
    needs.hunger -= 0.01 * dt;
    needs.thirst -= 0.015 * dt;
    needs.energy -= 0.005 * dt * (1.0 - 0.5 * seating);
    needs.bathroom -= 0.008 * dt;
    needs.nausea -= 0.02 * dt;

    let mut mood = 0.0;
    if needs.hunger < 30.0 {
        mood -= 0.1;
    }
    if needs.thirst < 30.0 {
        mood -= 0.15;
    }
    if needs.bathroom < 20.0 {
        mood -= 0.1;
    }
    if needs.nausea > 50.0 {
        mood -= 0.1;
    }
    if needs.energy < 20.0 {
        mood -= 0.05;
    }
    if walking {
        mood += ctx.weather.condition.mood_effect();
        if let Some(tile) = ctx.grid.tile(motion.tile) {
            mood -= 0.02 * tile.litter.min(10) as f32;
        }
        let scenery = ctx.grid.service_coverage(motion.tile, Service::Scenery, radius);
        mood += 0.005 * scenery.min(4.0);
        if !ctx.calendar.is_between_hours(DAYLIGHT.0, DAYLIGHT.1) {
            mood -= 0.03 * (1.0 - coverage(Service::Lighting));
        }
    }
    needs.happiness += mood * dt;
    needs.clamp();
}

fn should_leave(guest: &Guest, ctx: &AgentContext<'_>) -> bool {
    let park = &ctx.settings.park;
    guest.needs.happiness <= 5.0
        || guest.needs.energy <= 5.0
        || guest.cash <= 0
        || guest.ticks_in_park >= park.max_visit_ticks
        || !ctx.calendar.is_between_hours(park.open_hour, park.close_hour)
}

fn walk(guest: &mut Guest, motion: &mut Motion, ctx: &mut AgentContext<'_>, rng: &mut SystemRng) {
    if !ctx.grid.is_walkable(motion.tile) {
        // The footway was removed from under the guest.
        guest.state = GuestState::Left;
        return;
    }
    if guest.state != GuestState::LeavingPark && should_leave(guest, ctx) {
        start_leaving(guest, motion, ctx);
        if guest.state == GuestState::Left {
            return;
        }
    }

    match motion.step(ctx.grid, ctx.dt, 1.0) {
        Step::Moving | Step::Entered(_) => {}
        Step::Arrived(_) => match guest.state {
            GuestState::Entering => guest.state = GuestState::Wandering,
            GuestState::HeadingToRide | GuestState::HeadingToShop => reach_target(guest, motion, ctx),
            GuestState::LeavingPark => guest.state = GuestState::Left,
            _ => {}
        },
        Step::Blocked => match guest.state {
            GuestState::LeavingPark => start_leaving(guest, motion, ctx),
            GuestState::HeadingToRide | GuestState::HeadingToShop => abandon(guest, 2.0),
            _ => {}
        },
        Step::Idle => match guest.state {
            GuestState::Entering => guest.state = GuestState::Wandering,
            GuestState::LeavingPark => guest.state = GuestState::Left,
            GuestState::HeadingToRide | GuestState::HeadingToShop => reach_target(guest, motion, ctx),
            _ => {
                if guest.decision_cooldown > 0 || !decide(guest, motion, ctx, rng) {
                    if guest.decision_cooldown == 0 {
                        guest.decision_cooldown = draw_cooldown(&ctx.settings.park, rng);
                    }
                    wander(motion, ctx, rng);
                }
            }
        },
    }
}

fn draw_cooldown(settings: &ParkSettings, rng: &mut SystemRng) -> u32 {
    rng.gen_range(settings.min_decision_ticks..=settings.max_decision_ticks)
}

/// Pick the best affordable, reachable attraction. Ties break on position.
fn decide(guest: &mut Guest, motion: &mut Motion, ctx: &AgentContext<'_>, rng: &mut SystemRng) -> bool {
    let mut scored: Vec<(f32, Coord, StructureKind)> = ctx
        .sites
        .attractions
        .iter()
        .filter(|site| !site.broken && site.kind.price() <= guest.cash)
        .filter_map(|site| {
            let appeal = guest.needs.appeal(site.kind)?;
            let distance = site.at.manhattan(motion.tile) as f32;
            let score = appeal - distance * 0.5 + rng.between(0.0, 5.0);
            (score > 10.0).then_some((score, site.at, site.kind))
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

    for (_, site, kind) in scored.into_iter().take(3) {
        let Some(path) = find_path_to_structure(ctx.grid, motion.tile, site) else {
            continue;
        };
        motion.set_path(path);
        guest.target = Some(site);
        guest.state = if kind.class() == StructureClass::Ride {
            GuestState::HeadingToRide
        } else {
            GuestState::HeadingToShop
        };
        return true;
    }
    false
}

/// One random step. Queue lines are only entered when nothing else is open.
fn wander(motion: &mut Motion, ctx: &AgentContext<'_>, rng: &mut SystemRng) {
    let open: Vec<Coord> = motion
        .tile
        .neighbors()
        .into_iter()
        .filter(|next| ctx.grid.is_walkable(*next))
        .collect();
    let paths: Vec<Coord> = open
        .iter()
        .copied()
        .filter(|next| {
            ctx.grid
                .tile(*next)
                .is_some_and(|tile| tile.footway != Some(Footway::Queue))
        })
        .collect();
    let options = if paths.is_empty() { open } else { paths };
    if options.is_empty() {
        return;
    }
    let next = options[rng.gen_range(0..options.len())];
    motion.set_path(vec![motion.tile, next]);
}

fn start_leaving(guest: &mut Guest, motion: &mut Motion, ctx: &AgentContext<'_>) {
    guest.target = None;
    match find_nearest(ctx.grid, motion.tile, |at| ctx.sites.is_entrance(at)) {
        Some(path) => {
            motion.set_path(path);
            guest.state = if motion.has_path() {
                GuestState::LeavingPark
            } else {
                GuestState::Left
            };
        }
        // No way out: the guest is removed where it stands.
        None => guest.state = GuestState::Left,
    }
}

fn abandon(guest: &mut Guest, disappointment: f32) {
    guest.state = GuestState::Wandering;
    guest.target = None;
    guest.timer = 0;
    guest.needs.happiness = (guest.needs.happiness - disappointment).max(0.0);
}

/// The target, its kind and whether it is closed right now.
fn target_kind(guest: &Guest, ctx: &AgentContext<'_>) -> Option<(Coord, StructureKind, bool)> {
    let site = guest.target?;
    let structure = ctx.grid.tile(site)?.structure.as_ref()?;
    let closed = structure.broken || ctx.sites.attraction(site).is_some_and(|s| s.broken);
    Some((site, structure.kind, closed))
}

fn pay(guest: &mut Guest, kind: StructureKind, ctx: &mut AgentContext<'_>) {
    let price = kind.price();
    if price == 0 {
        return;
    }
    guest.cash -= price;
    guest.spent += price;
    let category = match kind.class() {
        StructureClass::Ride => Category::RideTickets,
        StructureClass::Food => Category::Food,
        _ => Category::Shops,
    };
    ctx.outcomes.deltas.push(LedgerDelta::income(category, price));
}

fn reach_target(guest: &mut Guest, motion: &Motion, ctx: &mut AgentContext<'_>) {
    let Some((site, kind, broken)) = target_kind(guest, ctx) else {
        abandon(guest, 5.0);
        return;
    };
    if !motion.tile.is_adjacent(site) || guest.cash < kind.price() {
        abandon(guest, 2.0);
        return;
    }
    match kind.class() {
        StructureClass::Ride if !broken => {
            let capacity = ctx
                .sites
                .attraction(site)
                .map_or(ctx.settings.park.base_queue, |s| s.queue_capacity(ctx.settings));
            let waiting = ctx.waiting.entry(site).or_insert(0);
            if *waiting >= capacity {
                abandon(guest, 3.0);
                return;
            }
            *waiting += 1;
            guest.state = GuestState::Queuing;
            guest.timer = ctx.settings.park.queue_patience;
        }
        StructureClass::Food | StructureClass::Shop => {
            pay(guest, kind, ctx);
            guest.state = GuestState::AtShop;
            guest.timer = kind.visit_ticks();
        }
        _ => abandon(guest, 5.0),
    }
}

fn queue(guest: &mut Guest, ctx: &mut AgentContext<'_>) {
    let Some((site, kind, broken)) = target_kind(guest, ctx) else {
        leave_queue(guest, ctx);
        abandon(guest, 5.0);
        return;
    };
    let Some(stats) = kind.ride() else {
        leave_queue(guest, ctx);
        abandon(guest, 5.0);
        return;
    };
    if guest.cash < kind.price() {
        leave_queue(guest, ctx);
        abandon(guest, 2.0);
        return;
    }
    let riders = ctx.riders.get(&site).copied().unwrap_or(0);
    if !broken && riders < stats.capacity {
        leave_queue(guest, ctx);
        ctx.riders.insert(site, riders + 1);
        pay(guest, kind, ctx);
        guest.state = GuestState::OnRide;
        guest.timer = stats.duration_ticks;
    } else if guest.timer == 0 {
        leave_queue(guest, ctx);
        abandon(guest, 10.0);
    } else {
        guest.timer -= 1;
    }
}

fn leave_queue(guest: &Guest, ctx: &mut AgentContext<'_>) {
    if let Some(waiting) = guest.target.and_then(|site| ctx.waiting.get_mut(&site)) {
        *waiting = waiting.saturating_sub(1);
    }
}

fn ride(guest: &mut Guest, ctx: &AgentContext<'_>) {
    guest.timer = guest.timer.saturating_sub(1);
    let ride = target_kind(guest, ctx).and_then(|(_, kind, _)| kind.ride());
    if guest.timer > 0 && ride.is_some() {
        return;
    }
    if let Some(stats) = ride {
        guest.needs.happiness += stats.excitement * 0.3;
        guest.needs.nausea += stats.nausea;
        guest.needs.energy -= 2.0;
        guest.needs.clamp();
    }
    guest.state = GuestState::LeavingRide;
}

fn visit(guest: &mut Guest, motion: &Motion, ctx: &mut AgentContext<'_>, rng: &mut SystemRng) {
    guest.timer = guest.timer.saturating_sub(1);
    if guest.timer > 0 {
        return;
    }
    if let Some((_, kind, _)) = target_kind(guest, ctx) {
        if let Some(refreshment) = kind.refreshment() {
            let needs = &mut guest.needs;
            needs.hunger += refreshment.hunger;
            needs.thirst += refreshment.thirst;
            needs.bathroom += refreshment.bathroom;
            needs.happiness += refreshment.happiness;
            if kind == StructureKind::FirstAid {
                needs.nausea = 0.0;
            }
            needs.clamp();
        }
        if kind.class() == StructureClass::Food {
            let bins = ctx.grid.service_coverage(
                motion.tile,
                Service::Sanitation,
                ctx.settings.park.coverage_radius,
            );
            let chance = ctx.settings.park.litter_chance * (1.0 - 0.8 * bins.min(1.0) as f64);
            if rng.chance(chance) {
                ctx.outcomes.litter.push(motion.tile);
            }
        }
    }
    guest.state = GuestState::Wandering;
    guest.target = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::fixture::{paved, Fixture};
    use crate::clock::Calendar;
    use crate::grid::Structure;
    use crate::rng::{RngManager, AGENT_STREAM};

    fn rng() -> SystemRng {
        RngManager::new(5).entity_stream(AGENT_STREAM, 1, 1)
    }

    fn place(fixture: &mut Fixture, at: Coord, kind: StructureKind) {
        fixture.grid.tile_mut(at).unwrap().structure = Some(Structure::new(kind, kind.cost()));
        fixture.resurvey();
    }

    fn wandering_guest() -> Guest {
        Guest {
            state: GuestState::Wandering,
            cash: 100,
            ..Guest::default()
        }
    }

    #[test]
    fn admission_charges_entry_fee() {
        let grid = paved(6);
        let settings = ParkSettings::default();
        let (motion, guest) = admit(Coord::new(0, 2), &grid, &settings, &mut rng()).unwrap();
        assert_eq!(guest.spent, 20);
        assert!(guest.cash >= settings.guest_cash_min - 20);
        assert_eq!(motion.tile, Coord::new(0, 2));
        assert!(motion.has_path());
    }

    #[test]
    fn guests_who_cannot_pay_are_turned_away() {
        let settings = ParkSettings {
            guest_cash_min: 5,
            guest_cash_max: 10,
            ..ParkSettings::default()
        };
        assert!(admit(Coord::new(0, 2), &paved(6), &settings, &mut rng()).is_none());
    }

    #[test]
    fn hungry_guest_heads_for_food() {
        let mut fixture = Fixture::new(paved(8));
        place(&mut fixture, Coord::new(4, 4), StructureKind::BurgerStall);
        let mut guest = wandering_guest();
        guest.needs.hunger = 10.0;
        let mut motion = Motion::at(Coord::new(1, 4), 0.5);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::HeadingToShop);
        assert_eq!(guest.target, Some(Coord::new(4, 4)));
        assert!(motion.destination().unwrap().is_adjacent(Coord::new(4, 4)));
    }

    #[test]
    fn broke_guest_ignores_attractions_and_leaves() {
        let mut fixture = Fixture::new(paved(8));
        place(&mut fixture, Coord::new(4, 4), StructureKind::BurgerStall);
        let mut guest = wandering_guest();
        guest.cash = 0;
        let mut motion = Motion::at(Coord::new(3, 3), 0.5);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::LeavingPark);
        assert!(fixture.sites.is_entrance(motion.destination().unwrap()));
    }

    #[test]
    fn unreachable_exit_removes_guest_in_place() {
        let mut grid = Grid::new(5, true);
        grid.tile_mut(Coord::new(2, 2)).unwrap().footway = Some(crate::grid::Footway::Path);
        let mut fixture = Fixture::new(grid);
        let mut guest = wandering_guest();
        guest.needs.happiness = 0.0;
        let mut motion = Motion::at(Coord::new(2, 2), 0.5);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::Left);
        assert_eq!(motion.tile, Coord::new(2, 2));
    }

    #[test]
    fn boarding_respects_capacity_and_charges_once() {
        let mut fixture = Fixture::new(paved(8));
        let site = Coord::new(4, 4);
        place(&mut fixture, site, StructureKind::DropTower);
        let capacity = StructureKind::DropTower.ride().unwrap().capacity;

        let mut guest = Guest {
            state: GuestState::Queuing,
            target: Some(site),
            timer: 3,
            cash: 100,
            ..Guest::default()
        };
        let mut motion = Motion::at(Coord::new(3, 4), 0.5);

        fixture.riders.insert(site, capacity);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::Queuing);
        assert_eq!(guest.timer, 2);

        fixture.riders.insert(site, capacity - 1);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::OnRide);
        assert_eq!(fixture.riders[&site], capacity);
        assert_eq!(guest.cash, 100 - StructureKind::DropTower.price());
        assert_eq!(
            fixture.outcomes.deltas,
            vec![LedgerDelta::income(Category::RideTickets, 20)]
        );
    }

    #[test]
    fn patience_runs_out_on_broken_ride() {
        let mut fixture = Fixture::new(paved(8));
        let site = Coord::new(4, 4);
        place(&mut fixture, site, StructureKind::Carousel);
        fixture.grid.tile_mut(site).unwrap().structure.as_mut().unwrap().broken = true;
        let mut guest = Guest {
            state: GuestState::Queuing,
            target: Some(site),
            timer: 1,
            cash: 100,
            ..Guest::default()
        };
        let mut motion = Motion::at(Coord::new(3, 4), 0.5);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::Wandering);
        assert!(fixture.outcomes.deltas.is_empty());
    }

    #[test]
    fn ride_ends_in_leaving_ride_then_wandering() {
        let mut fixture = Fixture::new(paved(8));
        let site = Coord::new(4, 4);
        place(&mut fixture, site, StructureKind::Carousel);
        let mut guest = Guest {
            state: GuestState::OnRide,
            target: Some(site),
            timer: 1,
            cash: 50,
            ..Guest::default()
        };
        let before = guest.needs.happiness;
        let mut motion = Motion::at(Coord::new(3, 4), 0.5);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::LeavingRide);
        assert!(guest.needs.happiness > before);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::Wandering);
        assert_eq!(guest.target, None);
    }

    #[test]
    fn restroom_visit_restores_bathroom() {
        let mut fixture = Fixture::new(paved(8));
        let site = Coord::new(4, 4);
        place(&mut fixture, site, StructureKind::Restroom);
        let mut guest = Guest {
            state: GuestState::AtShop,
            target: Some(site),
            timer: 1,
            cash: 50,
            ..Guest::default()
        };
        guest.needs.bathroom = 10.0;
        let mut motion = Motion::at(Coord::new(3, 4), 0.5);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::Wandering);
        assert_eq!(guest.needs.bathroom, 100.0);
    }

    #[test]
    fn guest_wanders_when_nothing_appeals() {
        let mut fixture = Fixture::new(paved(6));
        let mut guest = wandering_guest();
        let mut motion = Motion::at(Coord::new(2, 2), 0.5);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::Wandering);
        assert!(motion.has_path());
        assert!(motion.next_node().unwrap().is_adjacent(Coord::new(2, 2)));
        assert!(guest.decision_cooldown > 0);
    }

    fn arriving_guest(site: Coord) -> Guest {
        Guest {
            state: GuestState::HeadingToRide,
            target: Some(site),
            cash: 100,
            ..Guest::default()
        }
    }

    #[test]
    fn full_queue_turns_arrivals_away() {
        let mut fixture = Fixture::new(paved(8));
        let site = Coord::new(4, 4);
        place(&mut fixture, site, StructureKind::Carousel);
        let capacity = fixture.sites.attraction(site).unwrap().queue_capacity(&fixture.settings);
        assert_eq!(capacity, fixture.settings.park.base_queue);

        fixture.waiting.insert(site, capacity);
        let mut guest = arriving_guest(site);
        let mut motion = Motion::at(Coord::new(3, 4), 0.5);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::Wandering);
        assert_eq!(guest.target, None);
        assert_eq!(fixture.waiting[&site], capacity);

        fixture.waiting.insert(site, capacity - 1);
        let mut guest = arriving_guest(site);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::Queuing);
        assert_eq!(fixture.waiting[&site], capacity);
    }

    #[test]
    fn queue_tiles_lengthen_the_line() {
        let mut fixture = Fixture::new(paved(8));
        let site = Coord::new(4, 4);
        for at in [Coord::new(4, 5), Coord::new(4, 6), Coord::new(5, 6)] {
            fixture.grid.tile_mut(at).unwrap().footway = Some(Footway::Queue);
        }
        place(&mut fixture, site, StructureKind::Carousel);
        let park = &fixture.settings.park;
        let expected = park.base_queue + 3 * park.queue_per_tile;
        assert_eq!(
            fixture.sites.attraction(site).unwrap().queue_capacity(&fixture.settings),
            expected
        );

        fixture.waiting.insert(site, expected - 1);
        let mut guest = arriving_guest(site);
        let mut motion = Motion::at(Coord::new(4, 5), 0.5);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::Queuing);
    }

    #[test]
    fn boarding_frees_a_place_in_line() {
        let mut fixture = Fixture::new(paved(8));
        let site = Coord::new(4, 4);
        place(&mut fixture, site, StructureKind::Teacups);
        fixture.waiting.insert(site, 2);
        let mut guest = Guest {
            state: GuestState::Queuing,
            target: Some(site),
            timer: 5,
            cash: 100,
            ..Guest::default()
        };
        let mut motion = Motion::at(Coord::new(3, 4), 0.5);
        advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
        assert_eq!(guest.state, GuestState::OnRide);
        assert_eq!(fixture.waiting[&site], 1);
    }

    #[test]
    fn wanderers_keep_off_queue_lines() {
        let mut fixture = Fixture::new(paved(6));
        let here = Coord::new(2, 2);
        for at in [Coord::new(1, 2), Coord::new(3, 2), Coord::new(2, 1)] {
            fixture.grid.tile_mut(at).unwrap().footway = Some(Footway::Queue);
        }
        for seed in 0..8 {
            let mut guest = wandering_guest();
            let mut motion = Motion::at(here, 0.5);
            let mut rng = RngManager::new(seed).entity_stream(AGENT_STREAM, 1, 1);
            advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng);
            assert_eq!(motion.next_node(), Some(Coord::new(2, 3)));
        }
    }

    #[test]
    fn benches_slow_tiredness() {
        let drain = |with_bench: bool| {
            let mut fixture = Fixture::new(paved(6));
            if with_bench {
                place(&mut fixture, Coord::new(2, 3), StructureKind::Bench);
            }
            let mut guest = wandering_guest();
            let before = guest.needs.energy;
            let mut motion = Motion::at(Coord::new(2, 2), 0.5);
            advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
            before - guest.needs.energy
        };
        let rested = drain(true);
        let tired = drain(false);
        assert!(rested > 0.0);
        assert!(rested < tired, "{rested} vs {tired}");
    }

    #[test]
    fn lamps_keep_night_walks_pleasant() {
        let mood = |with_lamp: bool, hours_after_start: u64| {
            let mut fixture = Fixture::new(paved(6));
            fixture.settings.park.close_hour = 24;
            let config = fixture.settings.calendar.clone();
            let tick = hours_after_start * 60 * config.ticks_per_minute as u64;
            fixture.calendar = Calendar::at(tick, &config);
            if with_lamp {
                place(&mut fixture, Coord::new(2, 3), StructureKind::Lamp);
            }
            let mut guest = wandering_guest();
            let mut motion = Motion::at(Coord::new(2, 2), 0.5);
            advance(&mut guest, &mut motion, &mut fixture.ctx(), &mut rng());
            guest.needs.happiness
        };
        // The default calendar starts at 09:00.
        assert!(mood(true, 13) > mood(false, 13));
        assert_eq!(mood(true, 0), mood(false, 0));
    }
}
