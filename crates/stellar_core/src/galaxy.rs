//! The galaxy: grid arena of star systems, users and fleets.
//!
//! The galaxy is the single owner of all universe state. Star systems live in
//! a row-major arena addressed by [`GridPos`]; fleets live in a
//! [`FleetStore`] and are referenced by id from their owner and from the
//! system they occupy. The methods here keep those three views consistent:
//! adding, moving and removing fleets always updates all of them.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::fleet::{Fleet, FleetStore};
use crate::orders::{BuildKind, BuildOrder, Order};
use crate::report::TurnReportItem;
use crate::ship::{Component, HullClass, Ship};
use crate::system::{StarSystem, SystemKind};
use crate::user::{Faction, User};

/// User identifier. `UserId(0)` is the unowned sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u32);

impl UserId {
    /// Owner of systems nobody controls.
    pub const UNOWNED: Self = Self(0);

    /// Whether this is the unowned sentinel.
    #[must_use]
    pub const fn is_unowned(self) -> bool {
        self.0 == 0
    }
}

/// Fleet identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FleetId(pub u64);

/// Ship identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShipId(pub u64);

/// A cell of the galaxy grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl GridPos {
    /// Create a grid position.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance (diagonal moves cost one).
    #[must_use]
    pub const fn distance(self, other: Self) -> u32 {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        if dx > dy {
            dx
        } else {
            dy
        }
    }

    /// One diagonal-or-straight step toward `target`.
    #[must_use]
    pub fn step_toward(self, target: Self) -> Self {
        let step = |from: u32, to: u32| match from.cmp(&to) {
            std::cmp::Ordering::Less => from + 1,
            std::cmp::Ordering::Greater => from - 1,
            std::cmp::Ordering::Equal => from,
        };
        Self::new(step(self.x, target.x), step(self.y, target.y))
    }
}

/// All universe state advanced by the turn engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Galaxy {
    width: u32,
    height: u32,
    pub(crate) systems: Vec<StarSystem>,
    pub(crate) users: Vec<User>,
    pub(crate) fleets: FleetStore,
    pub(crate) turn: u64,
    seed: u64,
    #[serde(skip)]
    pub(crate) turn_in_progress: bool,
    pub(crate) last_turn_duration: Duration,
}

impl Galaxy {
    /// Create a galaxy of empty, unowned cells.
    #[must_use]
    pub fn new(width: u32, height: u32, seed: u64) -> Self {
        let systems = (0..height)
            .flat_map(|y| (0..width).map(move |x| GridPos::new(x, y)))
            .map(|pos| StarSystem::new(pos, format!("{}-{}", pos.x, pos.y), SystemKind::Empty))
            .collect();
        Self {
            width,
            height,
            systems,
            users: Vec::new(),
            fleets: FleetStore::new(),
            turn: 0,
            seed,
            turn_in_progress: false,
            last_turn_duration: Duration::ZERO,
        }
    }

    /// Grid width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Current turn number.
    #[must_use]
    pub const fn turn(&self) -> u64 {
        self.turn
    }

    /// Seed all turn random streams derive from.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Whether a turn is executing. Snapshots must not be taken while set.
    #[must_use]
    pub const fn is_turn_in_progress(&self) -> bool {
        self.turn_in_progress
    }

    /// Wall time of the last completed turn.
    #[must_use]
    pub const fn last_turn_duration(&self) -> Duration {
        self.last_turn_duration
    }

    fn index_of(&self, pos: GridPos) -> Result<usize> {
        if pos.x >= self.width || pos.y >= self.height {
            return Err(GameError::PositionOutOfBounds(pos));
        }
        Ok((pos.y * self.width + pos.x) as usize)
    }

    /// Whether `pos` lies on the grid.
    #[must_use]
    pub const fn contains(&self, pos: GridPos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// All systems in row-major order.
    #[must_use]
    pub fn systems(&self) -> &[StarSystem] {
        &self.systems
    }

    /// The system at `pos`.
    pub fn system(&self, pos: GridPos) -> Result<&StarSystem> {
        let index = self.index_of(pos)?;
        Ok(&self.systems[index])
    }

    /// The system at `pos`, mutably.
    pub fn system_mut(&mut self, pos: GridPos) -> Result<&mut StarSystem> {
        let index = self.index_of(pos)?;
        Ok(&mut self.systems[index])
    }

    /// Register a new user.
    pub fn add_user(&mut self, name: impl Into<String>, faction: Faction) -> UserId {
        let id = UserId(self.users.len() as u32 + 1);
        self.users
            .push(User::new(id, name, faction, self.width, self.height));
        id
    }

    /// All users.
    #[must_use]
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Look up a user.
    pub fn user(&self, id: UserId) -> Result<&User> {
        user_index(&self.users, id)
            .map(|i| &self.users[i])
            .ok_or(GameError::UnknownUser(id))
    }

    /// Look up a user mutably.
    pub fn user_mut(&mut self, id: UserId) -> Result<&mut User> {
        let index = user_index(&self.users, id).ok_or(GameError::UnknownUser(id))?;
        Ok(&mut self.users[index])
    }

    /// Transfer ownership of a system, updating both users' system lists.
    pub fn set_system_owner(&mut self, pos: GridPos, owner: UserId) -> Result<()> {
        if !owner.is_unowned() {
            self.user(owner)?;
        }
        let index = self.index_of(pos)?;
        let previous = self.systems[index].owner;
        if previous == owner {
            return Ok(());
        }
        if let Ok(old) = self.user_mut(previous) {
            old.systems.retain(|p| *p != pos);
        }
        if let Ok(new) = self.user_mut(owner) {
            new.systems.push(pos);
        }
        self.systems[index].owner = owner;
        Ok(())
    }

    /// All fleets.
    #[must_use]
    pub fn fleets(&self) -> &FleetStore {
        &self.fleets
    }

    /// Look up a fleet.
    pub fn fleet(&self, id: FleetId) -> Result<&Fleet> {
        self.fleets.get(id).ok_or(GameError::UnknownFleet(id))
    }

    /// Look up a fleet mutably.
    pub fn fleet_mut(&mut self, id: FleetId) -> Result<&mut Fleet> {
        self.fleets.get_mut(id).ok_or(GameError::UnknownFleet(id))
    }

    /// Build a fully supplied ship for `owner`, allocating its id.
    pub fn create_ship(
        &mut self,
        owner: UserId,
        name: impl Into<String>,
        hull_class: HullClass,
        components: Vec<Component>,
    ) -> Result<Ship> {
        let tech = self.user(owner)?.tech;
        let id = self.fleets.allocate_ship_id();
        Ok(Ship::new(id, name, hull_class, components, &tech))
    }

    /// Create a fleet at `pos` holding `ships`.
    pub fn spawn_fleet(
        &mut self,
        owner: UserId,
        name: impl Into<String>,
        pos: GridPos,
        ships: Vec<Ship>,
    ) -> Result<FleetId> {
        let index = self.index_of(pos)?;
        let user = user_index(&self.users, owner).ok_or(GameError::UnknownUser(owner))?;
        if ships.is_empty() {
            return Err(GameError::InvalidState("cannot spawn an empty fleet".into()));
        }

        let id = self.fleets.allocate_fleet_id();
        let mut fleet = Fleet::new(id, owner, name, pos);
        for ship in ships {
            fleet.add_ship(ship);
        }
        self.fleets.insert(fleet);
        self.users[user].fleets.push(id);
        self.systems[index].fleets.push(id);
        Ok(id)
    }

    /// Put a newly built ship into service at `pos`.
    ///
    /// Joins the owner's first idle fleet there, otherwise forms a new fleet.
    pub fn commission_ship(&mut self, pos: GridPos, ship: Ship) -> Result<FleetId> {
        let owner = self.system(pos)?.owner;
        let idle = self
            .system(pos)?
            .fleets
            .iter()
            .copied()
            .find(|id| {
                self.fleets
                    .get(*id)
                    .is_some_and(|f| f.owner == owner && f.order.is_none())
            });
        match idle {
            Some(id) => {
                self.fleet_mut(id)?.add_ship(ship);
                Ok(id)
            }
            None => {
                let name = format!("{} Squadron", ship.name);
                self.spawn_fleet(owner, name, pos, vec![ship])
            }
        }
    }

    /// Detach a ship from its fleet. An emptied fleet is deleted.
    pub fn remove_ship(&mut self, fleet_id: FleetId, ship_id: ShipId) -> Result<Ship> {
        let fleet = self.fleet_mut(fleet_id)?;
        let ship = fleet.remove_ship(ship_id).ok_or(GameError::UnknownShip {
            fleet: fleet_id,
            ship: ship_id,
        })?;
        if fleet.is_empty() {
            self.remove_fleet(fleet_id);
        }
        Ok(ship)
    }

    /// Delete a fleet from the store, its owner and its system.
    pub fn remove_fleet(&mut self, id: FleetId) -> Option<Fleet> {
        let fleet = self.fleets.remove(id)?;
        if let Ok(user) = self.user_mut(fleet.owner) {
            user.fleets.retain(|f| *f != id);
        }
        if let Ok(system) = self.system_mut(fleet.position) {
            system.fleets.retain(|f| *f != id);
        }
        Some(fleet)
    }

    /// Drop a fleet id from a system's presence list.
    pub(crate) fn detach_from_system(&mut self, id: FleetId, pos: GridPos) {
        if let Ok(system) = self.system_mut(pos) {
            system.fleets.retain(|f| *f != id);
        }
    }

    /// Relocate a fleet, updating both systems' presence lists.
    pub fn move_fleet(&mut self, id: FleetId, to: GridPos) -> Result<()> {
        let to_index = self.index_of(to)?;
        let fleet = self.fleet_mut(id)?;
        let from = fleet.position;
        if from == to {
            return Ok(());
        }
        fleet.position = to;
        self.detach_from_system(id, from);
        self.systems[to_index].fleets.push(id);
        Ok(())
    }

    /// Validate and attach an order to a fleet, replacing any previous one.
    pub fn set_order(&mut self, fleet: FleetId, order: Order) -> Result<()> {
        order.validate(self, fleet)?;
        self.fleet_mut(fleet)?.order = Some(order);
        Ok(())
    }

    /// Cancel a fleet's order.
    pub fn cancel_order(&mut self, fleet: FleetId) -> Result<Option<Order>> {
        Ok(self.fleet_mut(fleet)?.order.take())
    }

    /// Append a build order to a system's queue.
    pub fn enqueue_build(&mut self, pos: GridPos, kind: BuildKind) -> Result<()> {
        let system = self.system(pos)?;
        if !system.is_owned() {
            return Err(GameError::InvalidOrder(format!(
                "system {} has no owner to build for",
                system.name
            )));
        }
        if let BuildKind::Structure { planet, .. } = kind {
            if planet >= system.planets.len() {
                return Err(GameError::InvalidOrder(format!(
                    "system {} has no planet {planet}",
                    system.name
                )));
            }
        }
        self.system_mut(pos)?.build_queue.push_back(BuildOrder::new(kind));
        Ok(())
    }

    /// Attach a report entry to a user, stamped with the current turn.
    pub fn push_report(&mut self, user: UserId, item: TurnReportItem) {
        let turn = self.turn;
        match self.user_mut(user) {
            Ok(u) => u.push_report(turn, item),
            Err(_) if user.is_unowned() => {}
            Err(_) => tracing::warn!(?user, "dropping report for unknown user"),
        }
    }

    /// Serialize the galaxy to bytes.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("Failed to serialize galaxy: {e}")))
    }

    /// Deserialize a galaxy from bytes.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::Serialization(format!("Failed to deserialize galaxy: {e}")))
    }

    /// Hash of the complete state, for determinism checks.
    ///
    /// Excludes the timing field, which depends on the wall clock.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.turn.hash(&mut hasher);
        self.seed.hash(&mut hasher);
        for part in [
            bincode::serialize(&self.systems),
            bincode::serialize(&self.users),
            bincode::serialize(&self.fleets),
        ] {
            match part {
                Ok(bytes) => bytes.hash(&mut hasher),
                Err(e) => tracing::warn!(error = %e, "state hash skipped an unserializable part"),
            }
        }
        hasher.finish()
    }

    /// Check the cross-references between fleets, users and systems.
    pub fn check_invariants(&self) -> Result<()> {
        for fleet in self.fleets.iter() {
            if fleet.is_empty() {
                return Err(GameError::InvalidState(format!("fleet {:?} is empty", fleet.id)));
            }
            let owner = self.user(fleet.owner)?;
            if !owner.fleets.contains(&fleet.id) {
                return Err(GameError::InvalidState(format!(
                    "fleet {:?} missing from owner list",
                    fleet.id
                )));
            }
            if !self.system(fleet.position)?.fleets.contains(&fleet.id) {
                return Err(GameError::InvalidState(format!(
                    "fleet {:?} missing from system at {:?}",
                    fleet.id, fleet.position
                )));
            }
        }
        for system in &self.systems {
            if let Some(ghost) = system.fleets.iter().find(|id| !self.fleets.contains(**id)) {
                return Err(GameError::InvalidState(format!(
                    "system {} lists missing fleet {ghost:?}",
                    system.name
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn user_index(users: &[User], id: UserId) -> Option<usize> {
    let index = (id.0 as usize).checked_sub(1)?;
    (index < users.len()).then_some(index)
}
