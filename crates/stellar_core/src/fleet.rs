//! Fleets and the fleet store.
//!
//! A fleet's ship list is private. Ships are added and removed through
//! explicit methods; [`Galaxy`](crate::galaxy::Galaxy) wraps the removal
//! paths so that a fleet losing its last ship is deleted everywhere at once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::galaxy::{FleetId, GridPos, ShipId, UserId};
use crate::orders::Order;
use crate::ship::{Component, Ship};
use crate::user::TechLevels;

/// A group of ships that moves and acts together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fleet {
    /// Unique identifier.
    pub id: FleetId,
    /// Owning user.
    pub owner: UserId,
    /// Display name.
    pub name: String,
    /// Current grid cell.
    pub position: GridPos,
    /// Active order, if any.
    pub order: Option<Order>,
    ships: Vec<Ship>,
}

impl Fleet {
    /// Create an empty fleet.
    #[must_use]
    pub fn new(id: FleetId, owner: UserId, name: impl Into<String>, position: GridPos) -> Self {
        Self {
            id,
            owner,
            name: name.into(),
            position,
            order: None,
            ships: Vec::new(),
        }
    }

    /// Ships in the fleet.
    #[must_use]
    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    /// Mutable access to ship state. The list itself cannot grow or shrink here.
    pub fn ships_mut(&mut self) -> &mut [Ship] {
        &mut self.ships
    }

    /// Look up a ship.
    #[must_use]
    pub fn ship(&self, id: ShipId) -> Option<&Ship> {
        self.ships.iter().find(|s| s.id == id)
    }

    /// Look up a ship mutably.
    pub fn ship_mut(&mut self, id: ShipId) -> Option<&mut Ship> {
        self.ships.iter_mut().find(|s| s.id == id)
    }

    /// Add a ship.
    pub fn add_ship(&mut self, ship: Ship) {
        self.ships.push(ship);
    }

    /// Detach a ship.
    pub(crate) fn remove_ship(&mut self, id: ShipId) -> Option<Ship> {
        let index = self.ships.iter().position(|s| s.id == id)?;
        Some(self.ships.remove(index))
    }

    /// Detach every ship with hull at or below zero.
    pub(crate) fn take_destroyed(&mut self) -> Vec<Ship> {
        let mut destroyed = Vec::new();
        let mut index = 0;
        while index < self.ships.len() {
            if self.ships[index].is_destroyed() {
                destroyed.push(self.ships.remove(index));
            } else {
                index += 1;
            }
        }
        destroyed
    }

    /// Whether the fleet has no ships.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
    }

    /// Number of ships.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ships.len()
    }

    /// Whether any ship carries a weapon.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.ships.iter().any(Ship::is_armed)
    }

    /// Ground troops aboard all ships.
    #[must_use]
    pub fn troops(&self) -> u32 {
        self.ships.iter().map(|s| s.troops).sum()
    }

    /// Ore aboard all ships.
    #[must_use]
    pub fn cargo_ore(&self) -> u32 {
        self.ships.iter().map(|s| s.cargo_ore).sum()
    }

    /// Slowest ship's speed in cells per turn.
    #[must_use]
    pub fn speed(&self, tech: &TechLevels) -> u32 {
        self.ships
            .iter()
            .map(|s| s.stats(tech).speed)
            .min()
            .unwrap_or(0)
    }

    /// Best sensor strength in the fleet.
    #[must_use]
    pub fn sensor_strength(&self, tech: &TechLevels) -> u32 {
        self.ships
            .iter()
            .map(|s| s.stats(tech).sensor_strength)
            .max()
            .unwrap_or(0)
    }

    /// Torpedo launchers across the fleet as `(damage, structure_hit_chance)`.
    #[must_use]
    pub fn torpedo_launchers(&self) -> Vec<(f64, f64)> {
        self.ships
            .iter()
            .flat_map(|s| s.components.iter())
            .filter_map(|c| match *c {
                Component::TorpedoLauncher {
                    damage,
                    structure_hit_chance,
                } => Some((damage, structure_hit_chance)),
                _ => None,
            })
            .collect()
    }

    /// Remove up to `amount` troops, taking from ships in order; returns the removed count.
    pub fn remove_troops(&mut self, amount: u32) -> u32 {
        let mut remaining = amount;
        for ship in &mut self.ships {
            let taken = remaining.min(ship.troops);
            ship.troops -= taken;
            remaining -= taken;
            if remaining == 0 {
                break;
            }
        }
        amount - remaining
    }
}

/// Ordered storage of all fleets plus id allocation for fleets and ships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetStore {
    fleets: BTreeMap<FleetId, Fleet>,
    next_fleet: u64,
    next_ship: u64,
}

impl FleetStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fleets: BTreeMap::new(),
            next_fleet: 1,
            next_ship: 1,
        }
    }

    /// Allocate a fleet id.
    pub fn allocate_fleet_id(&mut self) -> FleetId {
        let id = FleetId(self.next_fleet.max(1));
        self.next_fleet = id.0 + 1;
        id
    }

    /// Allocate a ship id.
    pub fn allocate_ship_id(&mut self) -> ShipId {
        let id = ShipId(self.next_ship.max(1));
        self.next_ship = id.0 + 1;
        id
    }

    /// Insert a fleet under its own id.
    pub(crate) fn insert(&mut self, fleet: Fleet) {
        self.fleets.insert(fleet.id, fleet);
    }

    /// Remove a fleet.
    pub(crate) fn remove(&mut self, id: FleetId) -> Option<Fleet> {
        self.fleets.remove(&id)
    }

    /// Look up a fleet.
    #[must_use]
    pub fn get(&self, id: FleetId) -> Option<&Fleet> {
        self.fleets.get(&id)
    }

    /// Look up a fleet mutably.
    pub fn get_mut(&mut self, id: FleetId) -> Option<&mut Fleet> {
        self.fleets.get_mut(&id)
    }

    /// Whether a fleet exists.
    #[must_use]
    pub fn contains(&self, id: FleetId) -> bool {
        self.fleets.contains_key(&id)
    }

    /// Number of fleets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fleets.len()
    }

    /// Whether there are no fleets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fleets.is_empty()
    }

    /// Iterate in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Fleet> {
        self.fleets.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ship::HullClass;

    fn ship(id: u64, hull: f64, troops: u32) -> Ship {
        let mut ship = Ship::new(
            ShipId(id),
            format!("S{id}"),
            HullClass::Transport,
            vec![Component::TroopBay { capacity: 50 }],
            &TechLevels::default(),
        );
        ship.hull = hull;
        ship.troops = troops;
        ship
    }

    #[test]
    fn test_take_destroyed_keeps_survivors_in_order() {
        let mut fleet = Fleet::new(FleetId(1), UserId(1), "Alpha", GridPos::new(0, 0));
        fleet.add_ship(ship(1, 0.0, 0));
        fleet.add_ship(ship(2, 0.0, 0));
        fleet.add_ship(ship(3, 10.0, 0));
        fleet.add_ship(ship(4, -5.0, 0));
        fleet.add_ship(ship(5, 20.0, 0));

        let destroyed = fleet.take_destroyed();
        let ids: Vec<_> = fleet.ships().iter().map(|s| s.id.0).collect();
        assert_eq!(destroyed.len(), 3);
        assert_eq!(ids, vec![3, 5]);
    }

    #[test]
    fn test_remove_troops_spans_ships() {
        let mut fleet = Fleet::new(FleetId(1), UserId(1), "Alpha", GridPos::new(0, 0));
        fleet.add_ship(ship(1, 10.0, 5));
        fleet.add_ship(ship(2, 10.0, 8));
        assert_eq!(fleet.remove_troops(7), 7);
        assert_eq!(fleet.troops(), 6);
        assert_eq!(fleet.remove_troops(100), 6);
    }

    #[test]
    fn test_store_allocates_increasing_ids() {
        let mut store = FleetStore::new();
        let a = store.allocate_fleet_id();
        let b = store.allocate_fleet_id();
        assert!(b > a);
        assert_ne!(store.allocate_ship_id(), store.allocate_ship_id());
    }
}
