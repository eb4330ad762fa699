//! Phase-1 user and fleet processing.
//!
//! The [`UserAndFleetHandler`] owns every user and the fleet store for the
//! duration of phase 1. Per user it accrues research; per fleet it prunes
//! destroyed ships, runs maintenance (refuel, recrew, repair, bussard
//! collection), applies upkeep-deficit damage and records fleets that hold
//! an order. System stockpiles are read from the [`TurnContext`] and drawn
//! against a local ledger; the draws are applied after the barrier.

use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::fleet::{Fleet, FleetStore};
use crate::galaxy::{FleetId, GridPos, UserId};
use crate::report::{MaintenanceAction, TurnReportItem};
use crate::ship::{Component, Ship, ShipStats};
use crate::system::SystemKind;
use crate::turn::context::{SystemFacts, TurnContext};
use crate::user::{TechField, TechLevels, User};

/// Hull ceiling of repair in space, as a share of max hull.
const SPACE_HULL_CAP: f64 = 0.20;

/// Armor ceiling of repair in space, as a share of max armor.
const SPACE_ARMOR_CAP: f64 = 0.25;

/// Per-turn repair rate in space for hull and armor.
const SPACE_REPAIR_RATE: f64 = 0.02;

/// Upkeep damage tiers: (probability factor on the deficit ratio, min and max share of max hull).
const DAMAGE_TIERS: [(f64, f64, f64); 3] = [(0.5, 0.01, 0.05), (0.25, 0.05, 0.15), (0.1, 0.15, 0.30)];

/// Deuterium taken from one system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupplyDraw {
    /// Supplying system.
    pub system: GridPos,
    /// Taken from the deuterium stockpile.
    pub deuterium: u32,
    /// Taken from the nebula pool.
    pub nebula: u32,
}

/// Deferred effects of the fleet handler.
#[derive(Debug, Default)]
pub struct FleetOutput {
    /// Fleets holding an order, in visiting order.
    pub active_fleets: Vec<FleetId>,
    /// Stockpile draws per system.
    pub supply_draws: Vec<SupplyDraw>,
    /// Fleets deleted this phase, with the system they must be detached from.
    pub removed_fleets: Vec<(FleetId, GridPos)>,
}

#[derive(Debug, Clone, Copy)]
struct Ledger {
    deuterium: u32,
    nebula: u32,
    start_deuterium: u32,
    start_nebula: u32,
}

impl Ledger {
    fn new(facts: &SystemFacts) -> Self {
        let nebula = if facts.kind == SystemKind::Nebula {
            facts.resources_left
        } else {
            0
        };
        Self {
            deuterium: facts.deuterium,
            nebula,
            start_deuterium: facts.deuterium,
            start_nebula: nebula,
        }
    }
}

/// Research, maintenance and upkeep for all users and fleets.
pub struct UserAndFleetHandler<'a> {
    ctx: &'a TurnContext,
    config: &'a EngineConfig,
    rng: ChaCha8Rng,
    ledgers: BTreeMap<GridPos, Ledger>,
    output: FleetOutput,
}

impl<'a> UserAndFleetHandler<'a> {
    /// Create a handler drawing from its own random stream.
    #[must_use]
    pub fn new(ctx: &'a TurnContext, config: &'a EngineConfig, rng: ChaCha8Rng) -> Self {
        Self {
            ctx,
            config,
            rng,
            ledgers: BTreeMap::new(),
            output: FleetOutput::default(),
        }
    }

    /// Process every user and fleet.
    pub fn run(mut self, users: &mut [User], fleets: &mut FleetStore) -> Result<FleetOutput> {
        for user in users.iter_mut() {
            self.accrue_research(user);
            self.process_fleets(user, fleets);
        }

        self.output.supply_draws = self
            .ledgers
            .iter()
            .map(|(pos, l)| SupplyDraw {
                system: *pos,
                deuterium: l.start_deuterium - l.deuterium,
                nebula: l.start_nebula - l.nebula,
            })
            .filter(|d| d.deuterium > 0 || d.nebula > 0)
            .collect();

        tracing::debug!(
            active = self.output.active_fleets.len(),
            removed = self.output.removed_fleets.len(),
            draws = self.output.supply_draws.len(),
            "fleets processed"
        );
        Ok(self.output)
    }

    fn accrue_research(&mut self, user: &mut User) {
        let income = self
            .ctx
            .user(user.id)
            .map_or(0, |facts| facts.research_income)
            + user.faction.research_bonus();
        if let Some((field, level)) = user.accrue_research(income, self.config.research_base_cost) {
            tracing::debug!(user = user.id.0, ?field, level, "technology granted");
            user.push_report(self.ctx.turn(), TurnReportItem::TechnologyGranted { field, level });
        }
    }

    fn process_fleets(&mut self, user: &mut User, fleets: &mut FleetStore) {
        let mut index = 0;
        while index < user.fleets.len() {
            let id = user.fleets[index];
            let Some(fleet) = fleets.get_mut(id) else {
                tracing::warn!(user = user.id.0, fleet = id.0, "user lists a missing fleet");
                user.fleets.remove(index);
                continue;
            };

            let wrecks = fleet.take_destroyed();
            if !wrecks.is_empty() {
                tracing::debug!(fleet = id.0, count = wrecks.len(), "pruned destroyed ships");
            }
            if fleet.is_empty() {
                let position = fleet.position;
                fleets.remove(id);
                user.fleets.remove(index);
                self.output.removed_fleets.push((id, position));
                user.push_report(self.ctx.turn(), TurnReportItem::FleetDisbanded { fleet: id });
                continue;
            }

            self.maintain(user, fleet);
            if fleet.order.is_some() {
                self.output.active_fleets.push(id);
            }
            index += 1;
        }
    }

    /// Roll the upkeep penalty for one action; `true` means the action is skipped.
    fn skip(&mut self, user: &mut User, fleet: FleetId, action: MaintenanceAction) -> bool {
        let chance = self.ctx.upkeep_failure_chance(user.id);
        if chance > 0.0 && self.rng.gen_bool(chance.min(1.0)) {
            user.push_report(self.ctx.turn(), TurnReportItem::MaintenanceSkipped { fleet, action });
            return true;
        }
        false
    }

    fn ledger(&mut self, pos: GridPos, facts: &SystemFacts) -> &mut Ledger {
        self.ledgers.entry(pos).or_insert_with(|| Ledger::new(facts))
    }

    fn maintain(&mut self, user: &mut User, fleet: &mut Fleet) {
        let tech = user.tech;
        let pos = fleet.position;
        let Some(facts) = self.ctx.system(pos).copied() else {
            tracing::warn!(fleet = fleet.id.0, ?pos, "fleet outside the galaxy");
            return;
        };

        if facts.owner == user.id {
            if facts.economy.power >= 0 && !self.skip(user, fleet.id, MaintenanceAction::Refuel) {
                let ledger = self.ledger(pos, &facts);
                refuel(fleet, &tech, &mut ledger.deuterium);
            }
            if facts.economy.food >= 0 && !self.skip(user, fleet.id, MaintenanceAction::Recrew) {
                recrew(fleet, &tech);
            }
            if !self.skip(user, fleet.id, MaintenanceAction::Repair) {
                repair_at_home(fleet, &tech, facts.has_shipyard);
            }
        } else {
            repair_in_space(fleet, &tech);
        }

        let collects = fleet
            .ships()
            .iter()
            .any(|s| s.has_component(|c| matches!(c, Component::BussardCollector)));
        if facts.kind == SystemKind::Nebula
            && collects
            && !self.skip(user, fleet.id, MaintenanceAction::BussardCollection)
        {
            let rate = self.config.bussard_rate;
            let ledger = self.ledger(pos, &facts);
            collect_bussard(fleet, &tech, rate, &mut ledger.nebula);
        }

        let deficit = self.ctx.user(user.id).map_or(0.0, |f| f.deficit_ratio());
        if deficit > 0.0 {
            self.upkeep_damage(user, fleet, &tech, deficit);
        }
    }

    fn upkeep_damage(&mut self, user: &mut User, fleet: &mut Fleet, tech: &TechLevels, deficit: f64) {
        let fleet_id = fleet.id;
        for ship in fleet.ships_mut() {
            let stats = ship.stats(tech);
            let mut damage = 0.0;
            for (factor, low, high) in DAMAGE_TIERS {
                if self.rng.gen_bool((factor * deficit).min(1.0)) {
                    damage += stats.max_hull * self.rng.gen_range(low..=high);
                }
            }
            if self.rng.gen_bool(deficit.min(1.0)) {
                let lost = self.rng.gen_range(1..=5);
                ship.morale = ship.morale.saturating_sub(lost);
            }

            if damage > 0.0 {
                let before = ship.hull;
                ship.hull = (ship.hull - damage).max(1.0_f64.min(before));
                let dealt = (before - ship.hull).round() as u32;
                if dealt > 0 {
                    user.push_report(
                        self.ctx.turn(),
                        TurnReportItem::UpkeepDamage {
                            fleet: fleet_id,
                            ship: ship.id,
                            damage: dealt,
                        },
                    );
                }
            }
            ship.clamp_to(&stats);
        }
    }
}

fn each_ship(fleet: &mut Fleet, tech: &TechLevels, mut f: impl FnMut(&mut Ship, &ShipStats)) {
    for ship in fleet.ships_mut() {
        let stats = ship.stats(tech);
        f(ship, &stats);
        ship.clamp_to(&stats);
    }
}

/// Top ships up from a system stockpile, in fleet order.
fn refuel(fleet: &mut Fleet, tech: &TechLevels, stock: &mut u32) {
    each_ship(fleet, tech, |ship, stats| {
        let missing = (stats.max_deuterium - ship.deuterium).max(0.0).ceil() as u32;
        let taken = missing.min(*stock);
        *stock -= taken;
        ship.deuterium += f64::from(taken);
    });
}

/// Replace a quarter of the full complement per turn.
fn recrew(fleet: &mut Fleet, tech: &TechLevels) {
    each_ship(fleet, tech, |ship, stats| {
        let step = (stats.max_crew / 4).max(1);
        ship.crew = ship.crew.saturating_add(step);
    });
}

fn repair_at_home(fleet: &mut Fleet, tech: &TechLevels, shipyard: bool) {
    let yard = if shipyard { 0.10 } else { 0.0 };
    let hull_rate = 0.05 + yard + 0.01 * f64::from(tech.get(TechField::Construction));
    let armor_rate = 0.10 + yard + 0.01 * f64::from(tech.get(TechField::Weapons));
    let shield_rate = shield_rate(tech);
    each_ship(fleet, tech, |ship, stats| {
        ship.hull += stats.max_hull * hull_rate;
        ship.armor += stats.max_armor * armor_rate;
        ship.shield += stats.max_shield * shield_rate;
    });
}

/// Field repair: hull and armor crawl up to a low ceiling; shields recharge normally.
fn repair_in_space(fleet: &mut Fleet, tech: &TechLevels) {
    let shield_rate = shield_rate(tech);
    each_ship(fleet, tech, |ship, stats| {
        ship.hull = capped_repair(ship.hull, stats.max_hull, SPACE_HULL_CAP);
        ship.armor = capped_repair(ship.armor, stats.max_armor, SPACE_ARMOR_CAP);
        ship.shield += stats.max_shield * shield_rate;
    });
}

fn capped_repair(current: f64, max: f64, cap: f64) -> f64 {
    let ceiling = max * cap;
    if current >= ceiling {
        return current;
    }
    (current + max * SPACE_REPAIR_RATE).min(ceiling)
}

fn shield_rate(tech: &TechLevels) -> f64 {
    0.25 + 0.02 * f64::from(tech.get(TechField::Energy))
}

fn collect_bussard(fleet: &mut Fleet, tech: &TechLevels, rate: u32, pool: &mut u32) {
    each_ship(fleet, tech, |ship, stats| {
        let collectors = ship.count_components(|c| matches!(c, Component::BussardCollector)) as u32;
        if collectors == 0 {
            return;
        }
        let missing = (stats.max_deuterium - ship.deuterium).max(0.0).floor() as u32;
        let gathered = (collectors * rate).min(missing).min(*pool);
        *pool -= gathered;
        ship.deuterium += f64::from(gathered);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galaxy::Galaxy;
    use crate::orders::{Order, OrderKind};
    use crate::rng::lane_rng;
    use crate::ship::HullClass;
    use crate::system::{Planet, PlanetKind, StructureKind};
    use crate::user::Faction;

    struct Setup {
        galaxy: Galaxy,
        user: UserId,
        fleet: FleetId,
        home: GridPos,
    }

    fn setup(components: Vec<Component>) -> Setup {
        let mut galaxy = Galaxy::new(3, 3, 5);
        let user = galaxy.add_user("Ada", Faction::Terran);
        let home = GridPos::new(1, 1);
        galaxy.set_system_owner(home, user).unwrap();
        let system = galaxy.system_mut(home).unwrap();
        system.kind = SystemKind::Star;
        system.planets.push(Planet::new("Forge", PlanetKind::Barren, 100, 6));
        system.build_structure(0, 0, StructureKind::PowerPlant).unwrap();
        system.build_structure(0, 1, StructureKind::Factory).unwrap();
        system.set_deuterium(500);

        let ship = galaxy
            .create_ship(user, "Picket", HullClass::Frigate, components)
            .unwrap();
        let fleet = galaxy.spawn_fleet(user, "Home Guard", home, vec![ship]).unwrap();
        Setup {
            galaxy,
            user,
            fleet,
            home,
        }
    }

    fn run(galaxy: &mut Galaxy) -> FleetOutput {
        let config = EngineConfig::default();
        let ctx = TurnContext::capture(galaxy, &config);
        UserAndFleetHandler::new(&ctx, &config, lane_rng(galaxy.seed(), galaxy.turn(), 1))
            .run(&mut galaxy.users, &mut galaxy.fleets)
            .unwrap()
    }

    #[test]
    fn test_refuel_draws_from_home_stockpile() {
        let mut s = setup(vec![]);
        s.galaxy.fleet_mut(s.fleet).unwrap().ships_mut()[0].deuterium = 0.0;

        let output = run(&mut s.galaxy);
        let max = HullClass::Frigate.base_fuel();
        assert_eq!(s.galaxy.fleet(s.fleet).unwrap().ships()[0].deuterium, max);
        assert_eq!(
            output.supply_draws,
            vec![SupplyDraw {
                system: s.home,
                deuterium: max as u32,
                nebula: 0,
            }]
        );
    }

    #[test]
    fn test_repair_in_space_is_capped() {
        let mut s = setup(vec![Component::ArmorPlating { amount: 100.0 }]);
        s.galaxy.move_fleet(s.fleet, GridPos::new(0, 0)).unwrap();
        let max_hull = {
            let ship = &mut s.galaxy.fleet_mut(s.fleet).unwrap().ships_mut()[0];
            ship.hull = 1.0;
            ship.armor = 24.5;
            ship.hull_class.base_hull()
        };

        run(&mut s.galaxy);
        let ship = &s.galaxy.fleet(s.fleet).unwrap().ships()[0];
        assert!((ship.hull - (1.0 + max_hull * 0.02)).abs() < 1e-9);
        assert!((ship.armor - 25.0).abs() < 1e-9);

        for _ in 0..30 {
            run(&mut s.galaxy);
        }
        let ship = &s.galaxy.fleet(s.fleet).unwrap().ships()[0];
        assert!((ship.hull - max_hull * 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_home_repair_never_exceeds_max() {
        let mut s = setup(vec![Component::ShieldGenerator { amount: 40.0 }]);
        let stats = {
            let ship = &mut s.galaxy.fleet_mut(s.fleet).unwrap().ships_mut()[0];
            ship.hull -= 1.0;
            ship.shield = 39.0;
            ship.stats(&TechLevels::default())
        };
        run(&mut s.galaxy);
        let ship = &s.galaxy.fleet(s.fleet).unwrap().ships()[0];
        assert_eq!(ship.hull, stats.max_hull);
        assert_eq!(ship.shield, stats.max_shield);
    }

    #[test]
    fn test_destroyed_ships_pruned_and_empty_fleet_removed() {
        let mut s = setup(vec![]);
        s.galaxy.fleet_mut(s.fleet).unwrap().ships_mut()[0].hull = 0.0;
        let output = run(&mut s.galaxy);
        assert_eq!(output.removed_fleets, vec![(s.fleet, s.home)]);
        assert!(!s.galaxy.fleets().contains(s.fleet));
        assert!(s.galaxy.user(s.user).unwrap().fleets.is_empty());
    }

    #[test]
    fn test_active_fleets_recorded() {
        let mut s = setup(vec![]);
        s.galaxy
            .set_order(
                s.fleet,
                Order::new(OrderKind::MoveTo {
                    destination: GridPos::new(0, 0),
                }),
            )
            .unwrap();
        let output = run(&mut s.galaxy);
        assert_eq!(output.active_fleets, vec![s.fleet]);
    }

    #[test]
    fn test_bussard_collection_drains_nebula() {
        let mut s = setup(vec![Component::BussardCollector, Component::BussardCollector]);
        let nebula = GridPos::new(2, 2);
        let system = s.galaxy.system_mut(nebula).unwrap();
        system.kind = SystemKind::Nebula;
        system.resources_left = 15;
        s.galaxy.move_fleet(s.fleet, nebula).unwrap();
        s.galaxy.fleet_mut(s.fleet).unwrap().ships_mut()[0].deuterium = 0.0;

        let output = run(&mut s.galaxy);
        assert_eq!(s.galaxy.fleet(s.fleet).unwrap().ships()[0].deuterium, 15.0);
        assert_eq!(
            output.supply_draws,
            vec![SupplyDraw {
                system: nebula,
                deuterium: 0,
                nebula: 15,
            }]
        );
    }

    #[test]
    fn test_research_grants_technology() {
        let mut s = setup(vec![]);
        let user = s.galaxy.user_mut(s.user).unwrap();
        user.research_target = Some(TechField::Energy);
        user.research_points = 99;
        run(&mut s.galaxy);
        let user = s.galaxy.user(s.user).unwrap();
        assert_eq!(user.tech.get(TechField::Energy), 1);
        assert!(user
            .reports()
            .iter()
            .any(|r| matches!(r.item, TurnReportItem::TechnologyGranted { .. })));
    }
}
