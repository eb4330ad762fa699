//! Fleet orders and system build orders.
//!
//! Orders are plain data: a tagged [`OrderKind`] plus an [`OrderStatus`]
//! lifecycle. [`Order::step`] is the only transition function. It advances the
//! order by one turn's worth of effect, performs the one-shot completion side
//! effects, and returns the new status. [`Order::validate`] holds the
//! issuance-time checks; conditions that change between issuance and
//! execution are re-checked in `step` and turn into an
//! [`OrderFailed`](TurnReportItem::OrderFailed) report instead of an error.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::combat::{bombardment, ground};
use crate::error::{GameError, Result};
use crate::galaxy::{FleetId, Galaxy, GridPos};
use crate::report::TurnReportItem;
use crate::ship::{Component, HullClass};
use crate::system::{StructureKind, SystemKind};

/// Deuterium each ship burns per grid cell travelled.
pub const FUEL_PER_CELL: f64 = 5.0;

/// Population landed by a colony pod.
pub const COLONY_POPULATION: u32 = 10;

/// Ore extracted per mining laser per turn.
pub const MINING_RATE: u32 = 20;

/// Lifecycle of fleet and build orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Issued, not yet stepped.
    #[default]
    Pending,
    /// Stepped at least once and still running.
    Executing,
    /// Finished; the order is discarded.
    Completed,
}

/// What a fleet has been told to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    /// Travel to a grid cell at fleet speed.
    MoveTo {
        /// Target cell.
        destination: GridPos,
    },
    /// Settle a planet in the current system with a colony ship.
    Colonize {
        /// Planet index within the system.
        planet: usize,
    },
    /// Fill cargo holds from the current asteroid field.
    Mine,
    /// Move all carried ore into the current (own) system.
    UnloadCargo,
    /// Embark troops from the current (own) system.
    LoadTroops {
        /// Troops requested.
        amount: u32,
    },
    /// Land troops on the current system.
    Invade,
    /// Fire torpedoes at the current system's planets.
    Bombard,
}

/// A fleet order with its lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// The command.
    pub kind: OrderKind,
    /// Lifecycle state.
    pub status: OrderStatus,
    /// Turns the order has been stepped.
    pub turns_executed: u32,
}

impl Order {
    /// Create a pending order.
    #[must_use]
    pub const fn new(kind: OrderKind) -> Self {
        Self {
            kind,
            status: OrderStatus::Pending,
            turns_executed: 0,
        }
    }

    /// Issuance-time precondition checks for `fleet`.
    pub fn validate(&self, galaxy: &Galaxy, fleet_id: FleetId) -> Result<()> {
        let fleet = galaxy.fleet(fleet_id)?;
        let system = galaxy.system(fleet.position)?;
        let invalid = |msg: String| Err(GameError::InvalidOrder(msg));

        match self.kind {
            OrderKind::MoveTo { destination } => {
                if !galaxy.contains(destination) {
                    return Err(GameError::PositionOutOfBounds(destination));
                }
            }
            OrderKind::Colonize { planet } => {
                if !has_colony_ship(fleet) {
                    return invalid(format!("fleet {} has no colony ship", fleet.name));
                }
                let Some(target) = system.planets.get(planet) else {
                    return invalid(format!("system {} has no planet {planet}", system.name));
                };
                if !target.kind.is_habitable() || target.is_inhabited() {
                    return invalid(format!("planet {} cannot be settled", target.name));
                }
                if system.is_owned() && system.owner != fleet.owner {
                    return invalid(format!("system {} belongs to another user", system.name));
                }
            }
            OrderKind::Mine => {
                let lasers = fleet
                    .ships()
                    .iter()
                    .any(|s| s.has_component(|c| matches!(c, Component::MiningLaser)));
                let holds = fleet
                    .ships()
                    .iter()
                    .any(|s| s.has_component(|c| matches!(c, Component::CargoHold { .. })));
                if !lasers || !holds {
                    return invalid(format!("fleet {} cannot mine", fleet.name));
                }
            }
            OrderKind::UnloadCargo => {
                if fleet.cargo_ore() == 0 {
                    return invalid(format!("fleet {} carries no ore", fleet.name));
                }
            }
            OrderKind::LoadTroops { amount } => {
                if amount == 0 {
                    return invalid("troop amount must be positive".into());
                }
                let bays = fleet
                    .ships()
                    .iter()
                    .any(|s| s.has_component(|c| matches!(c, Component::TroopBay { .. })));
                if !bays {
                    return invalid(format!("fleet {} has no troop bays", fleet.name));
                }
            }
            OrderKind::Invade => {
                if fleet.troops() == 0 {
                    return invalid(format!("fleet {} carries no troops", fleet.name));
                }
                if !system.is_owned() || system.owner == fleet.owner {
                    return invalid(format!("system {} is not hostile", system.name));
                }
            }
            OrderKind::Bombard => {
                if fleet.torpedo_launchers().is_empty() {
                    return invalid(format!("fleet {} has no torpedo launchers", fleet.name));
                }
                if !system.is_owned() || system.owner == fleet.owner {
                    return invalid(format!("system {} is not hostile", system.name));
                }
            }
        }
        Ok(())
    }

    /// Advance the order by one turn on behalf of `fleet_id`.
    ///
    /// Returns the status after this step. The fleet may no longer exist once
    /// a completing order consumed its last ship.
    pub fn step<R: Rng + ?Sized>(
        &mut self,
        galaxy: &mut Galaxy,
        fleet_id: FleetId,
        rng: &mut R,
    ) -> Result<OrderStatus> {
        self.status = OrderStatus::Executing;
        self.turns_executed += 1;

        let done = match self.kind {
            OrderKind::MoveTo { destination } => step_move(galaxy, fleet_id, destination)?,
            OrderKind::Colonize { planet } => step_colonize(galaxy, fleet_id, planet)?,
            OrderKind::Mine => step_mine(galaxy, fleet_id)?,
            OrderKind::UnloadCargo => step_unload(galaxy, fleet_id)?,
            OrderKind::LoadTroops { amount } => step_load_troops(galaxy, fleet_id, amount)?,
            OrderKind::Invade => step_invade(galaxy, fleet_id, rng)?,
            OrderKind::Bombard => step_bombard(galaxy, fleet_id, rng)?,
        };

        if done {
            self.status = OrderStatus::Completed;
        }
        Ok(self.status)
    }
}

fn has_colony_ship(fleet: &crate::fleet::Fleet) -> bool {
    fleet
        .ships()
        .iter()
        .any(|s| s.has_component(|c| matches!(c, Component::ColonyPod)))
}

/// Drop the order with a report to the fleet owner.
fn fail(galaxy: &mut Galaxy, fleet_id: FleetId, reason: impl Into<String>) -> Result<bool> {
    let owner = galaxy.fleet(fleet_id)?.owner;
    let reason = reason.into();
    tracing::debug!(fleet = fleet_id.0, %reason, "order failed");
    galaxy.push_report(
        owner,
        TurnReportItem::OrderFailed {
            fleet: fleet_id,
            reason,
        },
    );
    Ok(true)
}

fn step_move(galaxy: &mut Galaxy, fleet_id: FleetId, destination: GridPos) -> Result<bool> {
    let fleet = galaxy.fleet(fleet_id)?;
    let owner = fleet.owner;
    let speed = fleet.speed(&galaxy.user(owner)?.tech);
    let start = fleet.position;

    let mut position = start;
    let fleet = galaxy.fleet_mut(fleet_id)?;
    for _ in 0..speed {
        if position == destination {
            break;
        }
        if fleet.ships().iter().any(|s| s.deuterium < FUEL_PER_CELL) {
            break;
        }
        for ship in fleet.ships_mut() {
            ship.deuterium -= FUEL_PER_CELL;
        }
        position = position.step_toward(destination);
    }
    galaxy.move_fleet(fleet_id, position)?;

    if position == destination {
        galaxy.push_report(
            owner,
            TurnReportItem::FleetArrived {
                fleet: fleet_id,
                position,
            },
        );
        return Ok(true);
    }
    if position == start {
        return fail(galaxy, fleet_id, "insufficient deuterium to move");
    }
    Ok(false)
}

fn step_colonize(galaxy: &mut Galaxy, fleet_id: FleetId, planet: usize) -> Result<bool> {
    let fleet = galaxy.fleet(fleet_id)?;
    let owner = fleet.owner;
    let pos = fleet.position;
    let Some(colony_ship) = fleet
        .ships()
        .iter()
        .find(|s| s.has_component(|c| matches!(c, Component::ColonyPod)))
        .map(|s| s.id)
    else {
        return fail(galaxy, fleet_id, "no colony ship left");
    };

    let system = galaxy.system(pos)?;
    if system.is_owned() && system.owner != owner {
        return fail(galaxy, fleet_id, "system was claimed by another user");
    }
    match system.planets.get(planet) {
        Some(p) if p.kind.is_habitable() && !p.is_inhabited() => {}
        _ => return fail(galaxy, fleet_id, "planet is no longer available"),
    }

    galaxy.set_system_owner(pos, owner)?;
    galaxy.system_mut(pos)?.planets[planet].set_population(COLONY_POPULATION);
    galaxy.remove_ship(fleet_id, colony_ship)?;
    galaxy.push_report(owner, TurnReportItem::Colonized { system: pos, planet });
    Ok(true)
}

fn step_mine(galaxy: &mut Galaxy, fleet_id: FleetId) -> Result<bool> {
    let fleet = galaxy.fleet(fleet_id)?;
    let owner = fleet.owner;
    let pos = fleet.position;
    let tech = galaxy.user(owner)?.tech;
    let system = galaxy.system(pos)?;
    if system.kind != SystemKind::AsteroidField {
        return fail(galaxy, fleet_id, "no asteroid field here");
    }

    let lasers: u32 = fleet
        .ships()
        .iter()
        .map(|s| s.count_components(|c| matches!(c, Component::MiningLaser)) as u32)
        .sum();
    let free: u32 = fleet
        .ships()
        .iter()
        .map(|s| s.stats(&tech).max_cargo.saturating_sub(s.cargo_ore))
        .sum();
    let extracted = (lasers * MINING_RATE).min(free).min(system.resources_left);

    galaxy.system_mut(pos)?.resources_left -= extracted;
    let mut remaining = extracted;
    let fleet = galaxy.fleet_mut(fleet_id)?;
    for ship in fleet.ships_mut() {
        let room = ship.stats(&tech).max_cargo.saturating_sub(ship.cargo_ore);
        let loaded = room.min(remaining);
        ship.cargo_ore += loaded;
        remaining -= loaded;
    }

    let ore = fleet.cargo_ore();
    let exhausted = galaxy.system(pos)?.resources_left == 0;
    if extracted == free || exhausted {
        galaxy.push_report(owner, TurnReportItem::MiningComplete { fleet: fleet_id, ore });
        return Ok(true);
    }
    Ok(false)
}

fn step_unload(galaxy: &mut Galaxy, fleet_id: FleetId) -> Result<bool> {
    let fleet = galaxy.fleet(fleet_id)?;
    let owner = fleet.owner;
    let pos = fleet.position;
    if galaxy.system(pos)?.owner != owner {
        return fail(galaxy, fleet_id, "cargo can only be unloaded in an own system");
    }

    let carried = i64::from(fleet.cargo_ore());
    let stored = galaxy.system_mut(pos)?.add_ore(carried) as u32;
    let mut remaining = stored;
    for ship in galaxy.fleet_mut(fleet_id)?.ships_mut() {
        let taken = ship.cargo_ore.min(remaining);
        ship.cargo_ore -= taken;
        remaining -= taken;
    }
    galaxy.push_report(
        owner,
        TurnReportItem::CargoTransferred {
            fleet: fleet_id,
            ore: stored,
            troops: 0,
        },
    );
    Ok(true)
}

fn step_load_troops(galaxy: &mut Galaxy, fleet_id: FleetId, amount: u32) -> Result<bool> {
    let fleet = galaxy.fleet(fleet_id)?;
    let owner = fleet.owner;
    let pos = fleet.position;
    let tech = galaxy.user(owner)?.tech;
    let system = galaxy.system(pos)?;
    if system.owner != owner {
        return fail(galaxy, fleet_id, "troops can only be loaded in an own system");
    }

    let room: u32 = fleet
        .ships()
        .iter()
        .map(|s| s.stats(&tech).max_troops.saturating_sub(s.troops))
        .sum();
    let wanted = amount.min(room).min(system.troops());
    let taken = (-galaxy.system_mut(pos)?.add_troops(-i64::from(wanted))) as u32;

    let mut remaining = taken;
    for ship in galaxy.fleet_mut(fleet_id)?.ships_mut() {
        let space = ship.stats(&tech).max_troops.saturating_sub(ship.troops);
        let boarded = space.min(remaining);
        ship.troops += boarded;
        remaining -= boarded;
    }
    galaxy.push_report(
        owner,
        TurnReportItem::CargoTransferred {
            fleet: fleet_id,
            ore: 0,
            troops: taken,
        },
    );
    Ok(true)
}

fn step_invade<R: Rng + ?Sized>(galaxy: &mut Galaxy, fleet_id: FleetId, rng: &mut R) -> Result<bool> {
    let fleet = galaxy.fleet(fleet_id)?;
    if galaxy.user(fleet.owner).is_err() {
        tracing::warn!(fleet = fleet_id.0, owner = fleet.owner.0, "fleet owner missing, order dropped");
        return Ok(true);
    }
    let system = galaxy.system(fleet.position)?;
    if !system.is_owned() || system.owner == fleet.owner {
        return fail(galaxy, fleet_id, "system is no longer hostile");
    }
    if fleet.troops() == 0 {
        return fail(galaxy, fleet_id, "no troops left to land");
    }
    ground::invade(galaxy, fleet_id, rng)?;
    Ok(true)
}

fn step_bombard<R: Rng + ?Sized>(galaxy: &mut Galaxy, fleet_id: FleetId, rng: &mut R) -> Result<bool> {
    let fleet = galaxy.fleet(fleet_id)?;
    if galaxy.user(fleet.owner).is_err() {
        tracing::warn!(fleet = fleet_id.0, owner = fleet.owner.0, "fleet owner missing, order dropped");
        return Ok(true);
    }
    let system = galaxy.system(fleet.position)?;
    if !system.is_owned() || system.owner == fleet.owner {
        return fail(galaxy, fleet_id, "system is no longer hostile");
    }
    bombardment::bombard(galaxy, fleet_id, rng)?;
    Ok(true)
}

/// What a system is building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BuildKind {
    /// A new ship, delivered to an idle fleet or a new one.
    Ship {
        /// Hull class.
        hull: HullClass,
        /// Components to install.
        components: Vec<Component>,
        /// Ship name.
        name: String,
    },
    /// A structure in a specific planet slot.
    Structure {
        /// Planet index within the system.
        planet: usize,
        /// Target slot.
        slot: u8,
        /// Structure type.
        kind: StructureKind,
    },
}

impl BuildKind {
    /// Units of work needed. One unit is done per turn.
    #[must_use]
    pub fn build_turns(&self) -> u32 {
        match self {
            Self::Ship {
                hull, components, ..
            } => hull.build_turns() + components.len() as u32 / 2,
            Self::Structure { kind, .. } => kind.build_turns(),
        }
    }

    /// Human-readable label for reports.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Ship { hull, name, .. } => format!("{hull:?} {name}"),
            Self::Structure { kind, planet, .. } => format!("{kind:?} on planet {planet}"),
        }
    }
}

/// An entry in a system's build queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildOrder {
    /// What is being built.
    pub kind: BuildKind,
    /// Work done so far.
    pub progress: u32,
    /// Work needed.
    pub required: u32,
    /// Turns until this order completes if the queue ahead runs undisturbed.
    pub remaining_turns: u32,
    /// Lifecycle state.
    pub status: OrderStatus,
}

impl BuildOrder {
    /// Create a pending build order.
    #[must_use]
    pub fn new(kind: BuildKind) -> Self {
        let required = kind.build_turns().max(1);
        Self {
            kind,
            progress: 0,
            required,
            remaining_turns: required,
            status: OrderStatus::Pending,
        }
    }

    /// Whether this builds a ship.
    #[must_use]
    pub const fn is_ship(&self) -> bool {
        matches!(self.kind, BuildKind::Ship { .. })
    }

    /// Work still missing.
    #[must_use]
    pub const fn work_left(&self) -> u32 {
        self.required.saturating_sub(self.progress)
    }

    /// Do one unit of work.
    pub fn advance(&mut self) -> OrderStatus {
        self.progress = (self.progress + 1).min(self.required);
        self.status = if self.progress >= self.required {
            OrderStatus::Completed
        } else {
            OrderStatus::Executing
        };
        self.status
    }
}
