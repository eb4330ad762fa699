//! Ships, hull classes and installed components.
//!
//! Current pool values (hull, armor, shield, deuterium, crew) live on the
//! [`Ship`]; their maxima are never stored but derived from the hull class,
//! the installed components and the owner's technology via
//! [`ShipStats::derive`]. Anything that mutates a pool is expected to finish
//! with [`Ship::clamp_to`].

use serde::{Deserialize, Serialize};

use crate::galaxy::ShipId;
use crate::user::{TechField, TechLevels};

/// Maximum ship morale.
pub const MAX_SHIP_MORALE: u32 = 100;

/// Experience cap. Keeps the critical-hit chance below certainty.
pub const MAX_XP: u32 = 950;

/// Hull size class. Sets the base values every design starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HullClass {
    /// Fast, fragile reconnaissance hull.
    Scout,
    /// Light escort.
    Corvette,
    /// Line frigate.
    Frigate,
    /// Destroyer.
    Destroyer,
    /// Heavy cruiser.
    Cruiser,
    /// Capital ship.
    Battleship,
    /// Unarmed cargo and troop hauler.
    Transport,
    /// Colony ship, consumed on settling.
    ColonyShip,
}

impl HullClass {
    /// Structural points before construction tech.
    #[must_use]
    pub const fn base_hull(self) -> f64 {
        match self {
            Self::Scout => 40.0,
            Self::Corvette => 80.0,
            Self::Frigate => 140.0,
            Self::Destroyer => 220.0,
            Self::Cruiser => 360.0,
            Self::Battleship => 600.0,
            Self::Transport => 120.0,
            Self::ColonyShip => 150.0,
        }
    }

    /// Fuel capacity before tanks.
    #[must_use]
    pub const fn base_fuel(self) -> f64 {
        match self {
            Self::Scout => 120.0,
            Self::Corvette => 80.0,
            Self::Frigate => 100.0,
            Self::Destroyer => 120.0,
            Self::Cruiser => 160.0,
            Self::Battleship => 240.0,
            Self::Transport => 150.0,
            Self::ColonyShip => 150.0,
        }
    }

    /// Crew complement.
    #[must_use]
    pub const fn crew(self) -> u32 {
        match self {
            Self::Scout => 4,
            Self::Corvette => 12,
            Self::Frigate => 30,
            Self::Destroyer => 60,
            Self::Cruiser => 120,
            Self::Battleship => 300,
            Self::Transport => 10,
            Self::ColonyShip => 20,
        }
    }

    /// Sensor signature. Larger hulls are easier to hit.
    #[must_use]
    pub const fn signature(self) -> u32 {
        match self {
            Self::Scout => 20,
            Self::Corvette => 40,
            Self::Frigate => 70,
            Self::Destroyer => 100,
            Self::Cruiser => 150,
            Self::Battleship => 250,
            Self::Transport => 120,
            Self::ColonyShip => 140,
        }
    }

    /// Evasion before engines.
    #[must_use]
    pub const fn maneuverability(self) -> u32 {
        match self {
            Self::Scout => 50,
            Self::Corvette => 40,
            Self::Frigate => 30,
            Self::Destroyer => 20,
            Self::Cruiser => 12,
            Self::Battleship => 6,
            Self::Transport => 8,
            Self::ColonyShip => 4,
        }
    }

    /// Action points per combat round before modifiers.
    #[must_use]
    pub const fn base_action_points(self) -> u32 {
        match self {
            Self::Scout => 4,
            Self::Corvette => 5,
            Self::Frigate => 6,
            Self::Destroyer => 8,
            Self::Cruiser => 10,
            Self::Battleship => 12,
            Self::Transport => 3,
            Self::ColonyShip => 2,
        }
    }

    /// Industry per turn needed to maintain the hull.
    #[must_use]
    pub const fn upkeep(self) -> i64 {
        match self {
            Self::Scout => 1,
            Self::Corvette => 2,
            Self::Frigate => 3,
            Self::Destroyer => 5,
            Self::Cruiser => 8,
            Self::Battleship => 14,
            Self::Transport => 2,
            Self::ColonyShip => 3,
        }
    }

    /// Turns of shipyard work to build the hull.
    #[must_use]
    pub const fn build_turns(self) -> u32 {
        match self {
            Self::Scout => 2,
            Self::Corvette => 3,
            Self::Frigate => 5,
            Self::Destroyer => 7,
            Self::Cruiser => 10,
            Self::Battleship => 16,
            Self::Transport => 3,
            Self::ColonyShip => 6,
        }
    }
}

/// Equipment installed on a ship.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Component {
    /// Energy weapon, strong against shields.
    BeamEmitter {
        /// Damage per shot before weapons tech.
        damage: f64,
    },
    /// Warhead launcher, strong against hulls and used for bombardment.
    TorpedoLauncher {
        /// Damage per shot before weapons tech.
        damage: f64,
        /// Chance per bombardment shot to wreck a structure.
        structure_hit_chance: f64,
    },
    /// Armor layer.
    ArmorPlating {
        /// Armor points.
        amount: f64,
    },
    /// Shield layer.
    ShieldGenerator {
        /// Shield points.
        amount: f64,
    },
    /// Extra deuterium storage.
    FuelTank {
        /// Deuterium capacity.
        capacity: f64,
    },
    /// Drive. Raises speed, evasion and combat action points.
    Engine {
        /// Thrust rating.
        thrust: u32,
    },
    /// Sensor suite.
    SensorArray {
        /// Sensor strength.
        strength: u32,
    },
    /// Scoops deuterium while inside a nebula.
    BussardCollector,
    /// Carries ground troops.
    TroopBay {
        /// Troop capacity.
        capacity: u32,
    },
    /// Extracts ore from asteroid fields.
    MiningLaser,
    /// Carries ore.
    CargoHold {
        /// Ore capacity.
        capacity: u32,
    },
    /// Settles a planet; the ship is consumed.
    ColonyPod,
}

impl Component {
    /// Whether the component can fire in space combat.
    #[must_use]
    pub const fn is_weapon(&self) -> bool {
        matches!(self, Self::BeamEmitter { .. } | Self::TorpedoLauncher { .. })
    }
}

/// Maxima and derived ratings of a ship.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShipStats {
    /// Maximum hull.
    pub max_hull: f64,
    /// Maximum armor.
    pub max_armor: f64,
    /// Maximum shield.
    pub max_shield: f64,
    /// Maximum deuterium.
    pub max_deuterium: f64,
    /// Full crew complement.
    pub max_crew: u32,
    /// Troop capacity.
    pub max_troops: u32,
    /// Ore capacity.
    pub max_cargo: u32,
    /// Sensor signature.
    pub signature: u32,
    /// Evasion rating.
    pub maneuverability: u32,
    /// Sensor strength.
    pub sensor_strength: u32,
    /// Grid cells per turn.
    pub speed: u32,
}

/// Base sensor strength of a hull with no sensor array.
pub const BASE_SENSOR_STRENGTH: u32 = 20;

impl ShipStats {
    /// Derive maxima from hull class, components and technology.
    #[must_use]
    pub fn derive(hull_class: HullClass, components: &[Component], tech: &TechLevels) -> Self {
        let construction = f64::from(tech.get(TechField::Construction));
        let energy = f64::from(tech.get(TechField::Energy));

        let mut armor = 0.0;
        let mut shield = 0.0;
        let mut fuel = hull_class.base_fuel();
        let mut troops = 0;
        let mut cargo = 0;
        let mut thrust = 0;
        let mut sensor = BASE_SENSOR_STRENGTH;

        for component in components {
            match *component {
                Component::ArmorPlating { amount } => armor += amount,
                Component::ShieldGenerator { amount } => shield += amount,
                Component::FuelTank { capacity } => fuel += capacity,
                Component::TroopBay { capacity } => troops += capacity,
                Component::CargoHold { capacity } => cargo += capacity,
                Component::Engine { thrust: t } => thrust += t,
                Component::SensorArray { strength } => sensor = sensor.max(strength),
                _ => {}
            }
        }

        Self {
            max_hull: hull_class.base_hull() * (1.0 + construction * 0.1),
            max_armor: armor * (1.0 + construction * 0.05),
            max_shield: shield * (1.0 + energy * 0.1),
            max_deuterium: fuel,
            max_crew: hull_class.crew(),
            max_troops: troops,
            max_cargo: cargo,
            signature: hull_class.signature(),
            maneuverability: hull_class.maneuverability() + thrust / 2,
            sensor_strength: sensor + tech.sensor_bonus(),
            speed: 1 + (thrust / 10).min(2) + tech.get(TechField::Propulsion) / 5,
        }
    }
}

/// A single ship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ship {
    /// Unique identifier.
    pub id: ShipId,
    /// Display name.
    pub name: String,
    /// Hull class.
    pub hull_class: HullClass,
    /// Installed components.
    pub components: Vec<Component>,
    /// Current hull.
    pub hull: f64,
    /// Current armor.
    pub armor: f64,
    /// Current shield.
    pub shield: f64,
    /// Current deuterium.
    pub deuterium: f64,
    /// Current crew.
    pub crew: u32,
    /// Morale, 0-100.
    pub morale: u32,
    /// Combat experience.
    pub xp: u32,
    /// Ground troops aboard.
    pub troops: u32,
    /// Ore aboard.
    pub cargo_ore: u32,
    /// Action points left in the current combat round.
    pub action_points: u32,
}

impl Ship {
    /// Create a ship with every pool full.
    #[must_use]
    pub fn new(
        id: ShipId,
        name: impl Into<String>,
        hull_class: HullClass,
        components: Vec<Component>,
        tech: &TechLevels,
    ) -> Self {
        let stats = ShipStats::derive(hull_class, &components, tech);
        Self {
            id,
            name: name.into(),
            hull_class,
            components,
            hull: stats.max_hull,
            armor: stats.max_armor,
            shield: stats.max_shield,
            deuterium: stats.max_deuterium,
            crew: stats.max_crew,
            morale: MAX_SHIP_MORALE,
            xp: 0,
            troops: 0,
            cargo_ore: 0,
            action_points: 0,
        }
    }

    /// Derived maxima under the owner's technology.
    #[must_use]
    pub fn stats(&self, tech: &TechLevels) -> ShipStats {
        ShipStats::derive(self.hull_class, &self.components, tech)
    }

    /// Clamp every pool into `[0, max]`.
    pub fn clamp_to(&mut self, stats: &ShipStats) {
        self.hull = clamp_pool(self.hull, stats.max_hull);
        self.armor = clamp_pool(self.armor, stats.max_armor);
        self.shield = clamp_pool(self.shield, stats.max_shield);
        self.deuterium = clamp_pool(self.deuterium, stats.max_deuterium);
        self.crew = self.crew.min(stats.max_crew);
        self.troops = self.troops.min(stats.max_troops);
        self.cargo_ore = self.cargo_ore.min(stats.max_cargo);
        self.morale = self.morale.min(MAX_SHIP_MORALE);
        self.xp = self.xp.min(MAX_XP);
    }

    /// Whether the hull is gone.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.hull <= 0.0
    }

    /// Whether any weapon is installed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.components.iter().any(Component::is_weapon)
    }

    /// Whether a component matching `predicate` is installed.
    pub fn has_component(&self, predicate: impl Fn(&Component) -> bool) -> bool {
        self.components.iter().any(predicate)
    }

    /// Number of components matching `predicate`.
    pub fn count_components(&self, predicate: impl Fn(&Component) -> bool) -> usize {
        self.components.iter().filter(|&c| predicate(c)).count()
    }

    /// Action points for one combat round.
    ///
    /// Base pool from the hull, plus one per engine and one per two weapons,
    /// then a quarter off each for under-crewing and heavy hull damage.
    #[must_use]
    pub fn round_action_points(&self, stats: &ShipStats) -> u32 {
        let engines = self.count_components(|c| matches!(c, Component::Engine { .. })) as u32;
        let weapons = self.count_components(Component::is_weapon) as u32;
        let mut points = f64::from(self.hull_class.base_action_points() + engines + weapons / 2);

        if stats.max_crew > 0 && f64::from(self.crew) < f64::from(stats.max_crew) * 0.5 {
            points *= 0.75;
        }
        if stats.max_hull > 0.0 && self.hull < stats.max_hull * 0.5 {
            points *= 0.75;
        }
        (points.floor() as u32).max(1)
    }
}

fn clamp_pool(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max.max(0.0))
}
