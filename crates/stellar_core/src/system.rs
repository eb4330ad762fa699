//! Star systems, planets and structures.
//!
//! A [`StarSystem`] keeps morale and its stockpiles private so that every
//! mutation goes through a clamping setter: morale stays in `0..=100` and
//! ore, deuterium and troops stay within the capacities derived from the
//! system's structures.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::galaxy::{FleetId, GridPos, UserId};
use crate::orders::BuildOrder;

/// Maximum system morale.
pub const MAX_MORALE: u32 = 100;

/// Ore and deuterium storage of a system without warehouses.
pub const BASE_STORAGE: u32 = 1_000;

/// Storage added per warehouse.
pub const WAREHOUSE_STORAGE: u32 = 1_000;

/// Troop capacity of a system without barracks.
pub const BASE_TROOP_CAPACITY: u32 = 20;

/// Troop capacity added per barracks.
pub const BARRACKS_TROOPS: u32 = 50;

/// Deuterium collected from each gas giant per turn.
pub const GAS_GIANT_DEUTERIUM: u32 = 15;

/// Terrain of a grid cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemKind {
    /// A star with planets.
    #[default]
    Star,
    /// Deuterium-rich nebula; bussard collectors draw from `resources_left`.
    Nebula,
    /// Minable asteroid field; mining lasers draw from `resources_left`.
    AsteroidField,
    /// Empty space.
    Empty,
}

/// Planet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanetKind {
    /// Earth-like.
    Terran,
    /// Water world.
    Ocean,
    /// Arid world.
    Desert,
    /// Airless rock.
    Barren,
    /// Frozen world.
    Ice,
    /// Gas giant; uninhabitable, yields deuterium.
    GasGiant,
}

impl PlanetKind {
    /// Whether colonists can settle here.
    #[must_use]
    pub const fn is_habitable(self) -> bool {
        !matches!(self, Self::GasGiant)
    }
}

/// Structure types that can occupy a planet slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StructureKind {
    /// Produces food.
    Farm,
    /// Produces power.
    PowerPlant,
    /// Produces industry.
    Factory,
    /// Produces research.
    ResearchLab,
    /// Speeds up fleet repair.
    Shipyard,
    /// Protects population and troops; adds ground defense.
    Bunker,
    /// Minor ground defense.
    Outpost,
    /// Raises troop capacity.
    Barracks,
    /// Raises ore and deuterium storage.
    Warehouse,
    /// Produces ore.
    Mine,
}

/// Per-turn output of one structure or one system. Negative values are upkeep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemEconomy {
    /// Food balance.
    pub food: i64,
    /// Power balance.
    pub power: i64,
    /// Industry balance.
    pub industry: i64,
    /// Research balance.
    pub research: i64,
    /// Ore extracted.
    pub ore: i64,
}

impl std::ops::AddAssign for SystemEconomy {
    fn add_assign(&mut self, rhs: Self) {
        self.food += rhs.food;
        self.power += rhs.power;
        self.industry += rhs.industry;
        self.research += rhs.research;
        self.ore += rhs.ore;
    }
}

impl StructureKind {
    /// Output of one enabled structure.
    #[must_use]
    pub const fn yields(self) -> SystemEconomy {
        let (food, power, industry, research, ore) = match self {
            Self::Farm => (20, -1, 0, 0, 0),
            Self::PowerPlant => (0, 10, 0, 0, 0),
            Self::Factory => (0, -3, 10, 0, 0),
            Self::ResearchLab => (0, -3, -1, 8, 0),
            Self::Shipyard => (0, -4, -2, 0, 0),
            Self::Bunker => (0, -1, -1, 0, 0),
            Self::Outpost => (0, -1, 0, 0, 0),
            Self::Barracks => (0, -1, -1, 0, 0),
            Self::Warehouse => (0, -1, 0, 0, 0),
            Self::Mine => (0, -2, 0, 0, 5),
        };
        SystemEconomy {
            food,
            power,
            industry,
            research,
            ore,
        }
    }

    /// Turns of work to build.
    #[must_use]
    pub const fn build_turns(self) -> u32 {
        match self {
            Self::Farm | Self::Outpost | Self::Warehouse => 2,
            Self::PowerPlant | Self::Bunker | Self::Barracks | Self::Mine => 3,
            Self::Factory | Self::ResearchLab => 4,
            Self::Shipyard => 6,
        }
    }
}

/// One occupied structure slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureSlot {
    /// What is built here.
    pub kind: StructureKind,
    /// Disabled structures produce and consume nothing.
    pub enabled: bool,
}

/// A planet inside a star system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Planet {
    /// Display name.
    pub name: String,
    /// Planet type.
    pub kind: PlanetKind,
    population: u32,
    /// Population ceiling.
    pub max_population: u32,
    /// Number of structure slots.
    pub max_structure_slots: u8,
    structures: BTreeMap<u8, StructureSlot>,
}

impl Planet {
    /// Create an uninhabited planet with no structures.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: PlanetKind, max_population: u32, max_structure_slots: u8) -> Self {
        Self {
            name: name.into(),
            kind,
            population: 0,
            max_population,
            max_structure_slots,
            structures: BTreeMap::new(),
        }
    }

    /// Current population.
    #[must_use]
    pub const fn population(&self) -> u32 {
        self.population
    }

    /// Set population, clamped to the maximum.
    pub fn set_population(&mut self, population: u32) {
        self.population = population.min(self.max_population);
    }

    /// Grow by up to `amount`; returns the actual growth.
    pub fn grow(&mut self, amount: u32) -> u32 {
        let before = self.population;
        self.set_population(before.saturating_add(amount));
        self.population - before
    }

    /// Shrink by up to `amount`; returns the actual loss.
    pub fn shrink(&mut self, amount: u32) -> u32 {
        let lost = amount.min(self.population);
        self.population -= lost;
        lost
    }

    /// Whether anyone lives here.
    #[must_use]
    pub const fn is_inhabited(&self) -> bool {
        self.population > 0
    }

    /// Occupied slots in slot order.
    pub fn structures(&self) -> impl Iterator<Item = (u8, &StructureSlot)> {
        self.structures.iter().map(|(slot, s)| (*slot, s))
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    /// Number of enabled structures of `kind`.
    #[must_use]
    pub fn count_enabled(&self, kind: StructureKind) -> u32 {
        self.structures
            .values()
            .filter(|s| s.enabled && s.kind == kind)
            .count() as u32
    }

    /// Lowest free slot, if any.
    #[must_use]
    pub fn first_free_slot(&self) -> Option<u8> {
        (0..self.max_structure_slots).find(|slot| !self.structures.contains_key(slot))
    }

    /// Place a structure. Fails when the slot is out of range or taken.
    pub fn place_structure(&mut self, slot: u8, kind: StructureKind) -> bool {
        if slot >= self.max_structure_slots || self.structures.contains_key(&slot) {
            return false;
        }
        self.structures.insert(slot, StructureSlot { kind, enabled: true });
        true
    }

    /// Remove the structure in `slot`.
    pub fn remove_structure(&mut self, slot: u8) -> Option<StructureKind> {
        self.structures.remove(&slot).map(|s| s.kind)
    }

    /// Enable or disable the structure in `slot`.
    pub fn set_enabled(&mut self, slot: u8, enabled: bool) -> bool {
        match self.structures.get_mut(&slot) {
            Some(s) => {
                s.enabled = enabled;
                true
            }
            None => false,
        }
    }

    fn economy(&self) -> SystemEconomy {
        let mut total = SystemEconomy::default();
        for slot in self.structures.values().filter(|s| s.enabled) {
            total += slot.kind.yields();
        }
        total
    }
}

/// One cell of the galaxy grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarSystem {
    /// Grid location.
    pub position: GridPos,
    /// Display name.
    pub name: String,
    /// Terrain.
    pub kind: SystemKind,
    /// Owning user, or [`UserId::UNOWNED`].
    pub owner: UserId,
    /// Planets.
    pub planets: Vec<Planet>,
    /// Fleets currently present.
    pub fleets: Vec<FleetId>,
    /// FIFO construction queue.
    pub build_queue: VecDeque<BuildOrder>,
    /// Depletable pool for nebula and asteroid tiles.
    pub resources_left: u32,
    morale: u32,
    ore: u32,
    deuterium: u32,
    troops: u32,
}

impl StarSystem {
    /// Create an unowned, empty system.
    #[must_use]
    pub fn new(position: GridPos, name: impl Into<String>, kind: SystemKind) -> Self {
        Self {
            position,
            name: name.into(),
            kind,
            owner: UserId::UNOWNED,
            planets: Vec::new(),
            fleets: Vec::new(),
            build_queue: VecDeque::new(),
            resources_left: 0,
            morale: 50,
            ore: 0,
            deuterium: 0,
            troops: 0,
        }
    }

    /// Whether a real user owns the system.
    #[must_use]
    pub const fn is_owned(&self) -> bool {
        !self.owner.is_unowned()
    }

    /// Morale, 0-100.
    #[must_use]
    pub const fn morale(&self) -> u32 {
        self.morale
    }

    /// Set morale, clamped.
    pub fn set_morale(&mut self, morale: i64) {
        self.morale = morale.clamp(0, i64::from(MAX_MORALE)) as u32;
    }

    /// Shift morale by `delta`, clamped.
    pub fn adjust_morale(&mut self, delta: i64) {
        self.set_morale(i64::from(self.morale) + delta);
    }

    /// Stored ore.
    #[must_use]
    pub const fn ore(&self) -> u32 {
        self.ore
    }

    /// Stored deuterium.
    #[must_use]
    pub const fn deuterium(&self) -> u32 {
        self.deuterium
    }

    /// Garrisoned troops.
    #[must_use]
    pub const fn troops(&self) -> u32 {
        self.troops
    }

    /// Set stored ore, clamped to capacity.
    pub fn set_ore(&mut self, ore: i64) {
        self.ore = clamp_store(ore, self.storage_capacity());
    }

    /// Set stored deuterium, clamped to capacity.
    pub fn set_deuterium(&mut self, deuterium: i64) {
        self.deuterium = clamp_store(deuterium, self.storage_capacity());
    }

    /// Set garrison, clamped to capacity.
    pub fn set_troops(&mut self, troops: i64) {
        self.troops = clamp_store(troops, self.troop_capacity());
    }

    /// Change stored ore by `delta`; returns the applied change.
    pub fn add_ore(&mut self, delta: i64) -> i64 {
        let before = i64::from(self.ore);
        self.set_ore(before + delta);
        i64::from(self.ore) - before
    }

    /// Change stored deuterium by `delta`; returns the applied change.
    pub fn add_deuterium(&mut self, delta: i64) -> i64 {
        let before = i64::from(self.deuterium);
        self.set_deuterium(before + delta);
        i64::from(self.deuterium) - before
    }

    /// Change the garrison by `delta`; returns the applied change.
    pub fn add_troops(&mut self, delta: i64) -> i64 {
        let before = i64::from(self.troops);
        self.set_troops(before + delta);
        i64::from(self.troops) - before
    }

    /// Re-apply capacity limits after structures changed.
    pub fn clamp_stores(&mut self) {
        self.set_ore(i64::from(self.ore));
        self.set_deuterium(i64::from(self.deuterium));
        self.set_troops(i64::from(self.troops));
    }

    /// Ore and deuterium storage capacity.
    #[must_use]
    pub fn storage_capacity(&self) -> u32 {
        BASE_STORAGE + WAREHOUSE_STORAGE * self.count_enabled(StructureKind::Warehouse)
    }

    /// Troop capacity.
    #[must_use]
    pub fn troop_capacity(&self) -> u32 {
        BASE_TROOP_CAPACITY + BARRACKS_TROOPS * self.count_enabled(StructureKind::Barracks)
    }

    /// Enabled structures of `kind` across all planets.
    #[must_use]
    pub fn count_enabled(&self, kind: StructureKind) -> u32 {
        self.planets.iter().map(|p| p.count_enabled(kind)).sum()
    }

    /// Whether an enabled shipyard exists.
    #[must_use]
    pub fn has_shipyard(&self) -> bool {
        self.count_enabled(StructureKind::Shipyard) > 0
    }

    /// Ground defense rating from bunkers and outposts.
    #[must_use]
    pub fn defense_rating(&self) -> u32 {
        self.count_enabled(StructureKind::Bunker) * 2 + self.count_enabled(StructureKind::Outpost)
    }

    /// Total population.
    #[must_use]
    pub fn population(&self) -> u32 {
        self.planets.iter().map(Planet::population).sum()
    }

    /// Per-turn economic balance of the system.
    #[must_use]
    pub fn economy(&self) -> SystemEconomy {
        let mut total = SystemEconomy::default();
        for planet in &self.planets {
            total += planet.economy();
        }
        let population = i64::from(self.population());
        total.food -= population / 10;
        total.research -= population / 100;
        total
    }

    /// Place a structure and re-apply capacity limits.
    pub fn build_structure(&mut self, planet: usize, slot: u8, kind: StructureKind) -> Result<()> {
        let target = self
            .planets
            .get_mut(planet)
            .ok_or(GameError::SlotUnavailable { planet, slot })?;
        if !target.place_structure(slot, kind) {
            return Err(GameError::SlotUnavailable { planet, slot });
        }
        self.clamp_stores();
        Ok(())
    }

    /// Remove a structure and re-apply capacity limits.
    pub fn remove_structure(&mut self, planet: usize, slot: u8) -> Option<StructureKind> {
        let removed = self.planets.get_mut(planet)?.remove_structure(slot);
        if removed.is_some() {
            self.clamp_stores();
        }
        removed
    }
}

fn clamp_store(value: i64, capacity: u32) -> u32 {
    value.clamp(0, i64::from(capacity)) as u32
}
