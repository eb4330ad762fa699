//! Scenario loading and galaxy setup.
//!
//! Scenarios define the initial galaxy for headless runs: empires with a
//! homeworld, starting fleets with optional standing orders, and resource
//! fields. The seed is supplied per run so a batch can replay one scenario
//! under many seeds.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stellar_core::error::GameError;
use stellar_core::galaxy::{Galaxy, GridPos, UserId};
use stellar_core::orders::{Order, OrderKind};
use stellar_core::ship::{Component, HullClass};
use stellar_core::system::{Planet, PlanetKind, StructureKind, SystemKind};
use stellar_core::user::{Faction, TechField};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The engine rejected part of the setup.
    #[error("Scenario setup rejected: {0}")]
    Setup(#[from] GameError),
}

/// A ship to spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipSpec {
    /// Ship name.
    pub name: String,
    /// Hull class.
    pub hull: HullClass,
    /// Installed components.
    #[serde(default)]
    pub components: Vec<Component>,
}

impl ShipSpec {
    /// Create a ship spec.
    #[must_use]
    pub fn new(name: impl Into<String>, hull: HullClass, components: Vec<Component>) -> Self {
        Self {
            name: name.into(),
            hull,
            components,
        }
    }
}

/// A starting fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSetup {
    /// Fleet name.
    pub name: String,
    /// Starting cell; the homeworld when absent.
    #[serde(default)]
    pub position: Option<GridPos>,
    /// Ships in the fleet.
    pub ships: Vec<ShipSpec>,
    /// Order given before the first turn.
    #[serde(default)]
    pub order: Option<OrderKind>,
}

/// Homeworld layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeworldSetup {
    /// Starting population of the capital planet.
    pub population: u32,
    /// Population cap of the capital planet.
    pub max_population: u32,
    /// Structure slots on the capital planet.
    pub slots: u8,
    /// Structures placed in slot order.
    pub structures: Vec<StructureKind>,
    /// Extra gas giants in the home system.
    pub gas_giants: u32,
    /// Stored deuterium.
    pub deuterium: i64,
    /// Garrisoned troops.
    pub troops: i64,
}

impl Default for HomeworldSetup {
    fn default() -> Self {
        Self {
            population: 300,
            max_population: 1_000,
            slots: 10,
            structures: vec![
                StructureKind::Farm,
                StructureKind::Farm,
                StructureKind::Farm,
                StructureKind::PowerPlant,
                StructureKind::PowerPlant,
                StructureKind::Factory,
                StructureKind::Factory,
                StructureKind::Shipyard,
                StructureKind::ResearchLab,
            ],
            gas_giants: 1,
            deuterium: 500,
            troops: 20,
        }
    }
}

/// One player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpireSetup {
    /// Display name.
    pub name: String,
    /// Faction.
    #[serde(default)]
    pub faction: Faction,
    /// Homeworld cell.
    pub home: GridPos,
    /// Homeworld layout.
    #[serde(default)]
    pub homeworld: HomeworldSetup,
    /// Starting technology levels.
    #[serde(default)]
    pub tech: Vec<(TechField, u32)>,
    /// Field researched first.
    #[serde(default)]
    pub research_target: Option<TechField>,
    /// Starting fleets.
    #[serde(default)]
    pub fleets: Vec<FleetSetup>,
}

/// A nebula or asteroid field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSetup {
    /// Cell.
    pub position: GridPos,
    /// Field type.
    pub kind: SystemKind,
    /// Harvestable pool.
    pub resources: u32,
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Grid width.
    pub width: u32,
    /// Grid height.
    pub height: u32,
    /// Players.
    pub empires: Vec<EmpireSetup>,
    /// Resource fields.
    #[serde(default)]
    pub fields: Vec<FieldSetup>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Resolve a built-in scenario name, or load it from disk otherwise.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match name_or_path {
            "skirmish" => Ok(Self::skirmish()),
            "frontier" => Ok(Self::frontier()),
            path => Self::load(path),
        }
    }

    /// Two empires whose battle lines meet in the middle of a 12 × 12 grid.
    #[must_use]
    pub fn skirmish() -> Self {
        let line = || {
            vec![
                ShipSpec::new(
                    "Lancer",
                    HullClass::Cruiser,
                    vec![
                        Component::BeamEmitter { damage: 30.0 },
                        Component::BeamEmitter { damage: 30.0 },
                        Component::ShieldGenerator { amount: 60.0 },
                        Component::ArmorPlating { amount: 80.0 },
                        Component::Engine { thrust: 10 },
                    ],
                ),
                ShipSpec::new(
                    "Harrier",
                    HullClass::Frigate,
                    vec![
                        Component::TorpedoLauncher {
                            damage: 40.0,
                            structure_hit_chance: 0.2,
                        },
                        Component::ArmorPlating { amount: 40.0 },
                        Component::Engine { thrust: 10 },
                    ],
                ),
            ]
        };
        let advance = Some(OrderKind::MoveTo {
            destination: GridPos::new(6, 6),
        });
        Self {
            name: "skirmish".to_string(),
            description: "Mirrored battle lines converging on the centre".to_string(),
            width: 12,
            height: 12,
            empires: vec![
                EmpireSetup {
                    name: "Terran Union".to_string(),
                    faction: Faction::Terran,
                    home: GridPos::new(1, 1),
                    homeworld: HomeworldSetup::default(),
                    tech: Vec::new(),
                    research_target: Some(TechField::Weapons),
                    fleets: vec![FleetSetup {
                        name: "First Fleet".to_string(),
                        position: None,
                        ships: line(),
                        order: advance,
                    }],
                },
                EmpireSetup {
                    name: "Kragg Horde".to_string(),
                    faction: Faction::Kragg,
                    home: GridPos::new(10, 10),
                    homeworld: HomeworldSetup::default(),
                    tech: Vec::new(),
                    research_target: Some(TechField::Construction),
                    fleets: vec![FleetSetup {
                        name: "Warband".to_string(),
                        position: None,
                        ships: line(),
                        order: advance,
                    }],
                },
            ],
            fields: vec![FieldSetup {
                position: GridPos::new(6, 6),
                kind: SystemKind::Nebula,
                resources: 2_000,
            }],
        }
    }

    /// A quiet economy-only map: one empire, a miner and a collector.
    #[must_use]
    pub fn frontier() -> Self {
        Self {
            name: "frontier".to_string(),
            description: "Single empire harvesting nearby fields".to_string(),
            width: 8,
            height: 8,
            empires: vec![EmpireSetup {
                name: "Zenthari Concord".to_string(),
                faction: Faction::Zenthari,
                home: GridPos::new(2, 2),
                homeworld: HomeworldSetup::default(),
                tech: vec![(TechField::Propulsion, 1)],
                research_target: Some(TechField::Energy),
                fleets: vec![
                    FleetSetup {
                        name: "Prospectors".to_string(),
                        position: Some(GridPos::new(3, 2)),
                        ships: vec![ShipSpec::new(
                            "Prospector",
                            HullClass::Transport,
                            vec![
                                Component::MiningLaser,
                                Component::MiningLaser,
                                Component::CargoHold { capacity: 200 },
                            ],
                        )],
                        order: Some(OrderKind::Mine),
                    },
                    FleetSetup {
                        name: "Scoops".to_string(),
                        position: Some(GridPos::new(2, 3)),
                        ships: vec![ShipSpec::new(
                            "Scoop",
                            HullClass::Corvette,
                            vec![Component::BussardCollector, Component::FuelTank { capacity: 100.0 }],
                        )],
                        order: None,
                    },
                ],
            }],
            fields: vec![
                FieldSetup {
                    position: GridPos::new(3, 2),
                    kind: SystemKind::AsteroidField,
                    resources: 5_000,
                },
                FieldSetup {
                    position: GridPos::new(2, 3),
                    kind: SystemKind::Nebula,
                    resources: 3_000,
                },
            ],
        }
    }

    /// Build the galaxy for one run. Returns it with the user ids in setup order.
    pub fn build(&self, seed: u64) -> Result<(Galaxy, Vec<UserId>), ScenarioError> {
        let mut galaxy = Galaxy::new(self.width, self.height, seed);

        for field in &self.fields {
            let system = galaxy.system_mut(field.position)?;
            system.kind = field.kind;
            system.resources_left = field.resources;
        }

        let mut users = Vec::with_capacity(self.empires.len());
        for empire in &self.empires {
            let user = galaxy.add_user(empire.name.clone(), empire.faction);
            {
                let state = galaxy.user_mut(user)?;
                for &(field, level) in &empire.tech {
                    state.tech.set(field, level);
                }
                state.research_target = empire.research_target;
            }
            settle_homeworld(&mut galaxy, user, empire.home, &empire.homeworld)?;

            for fleet in &empire.fleets {
                let ships = fleet
                    .ships
                    .iter()
                    .map(|s| galaxy.create_ship(user, s.name.clone(), s.hull, s.components.clone()))
                    .collect::<Result<Vec<_>, _>>()?;
                let position = fleet.position.unwrap_or(empire.home);
                let id = galaxy.spawn_fleet(user, fleet.name.clone(), position, ships)?;
                if let Some(kind) = fleet.order {
                    galaxy.set_order(id, Order::new(kind))?;
                }
            }
            users.push(user);
        }

        tracing::debug!(scenario = %self.name, seed, empires = users.len(), "scenario built");
        Ok((galaxy, users))
    }
}

fn settle_homeworld(galaxy: &mut Galaxy, owner: UserId, pos: GridPos, setup: &HomeworldSetup) -> Result<(), GameError> {
    galaxy.set_system_owner(pos, owner)?;
    let system = galaxy.system_mut(pos)?;
    system.kind = SystemKind::Star;

    let mut capital = Planet::new("Capital", PlanetKind::Terran, setup.max_population, setup.slots);
    capital.set_population(setup.population);
    system.planets.push(capital);
    for i in 0..setup.gas_giants {
        system
            .planets
            .push(Planet::new(format!("Giant {}", i + 1), PlanetKind::GasGiant, 0, 0));
    }
    for (slot, kind) in setup.structures.iter().enumerate() {
        system.build_structure(0, slot as u8, *kind)?;
    }
    system.set_deuterium(setup.deuterium);
    system.set_troops(setup.troops);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_scenarios_build() {
        for scenario in [Scenario::skirmish(), Scenario::frontier()] {
            let (galaxy, users) = scenario.build(3).unwrap();
            assert_eq!(users.len(), scenario.empires.len());
            galaxy.check_invariants().unwrap();
        }
    }

    #[test]
    fn test_skirmish_fleets_carry_orders() {
        let (galaxy, users) = Scenario::skirmish().build(1).unwrap();
        for user in users {
            let fleet = galaxy.user(user).unwrap().fleets[0];
            assert!(galaxy.fleet(fleet).unwrap().order.is_some());
        }
    }

    #[test]
    fn test_ron_roundtrip_of_minimal_scenario() {
        let text = r#"(
            name: "duel",
            width: 4,
            height: 4,
            empires: [
                (name: "Solo", home: (x: 1, y: 1)),
            ],
        )"#;
        let scenario = Scenario::from_ron_str(text).unwrap();
        assert_eq!(scenario.empires[0].homeworld, HomeworldSetup::default());
        let (galaxy, users) = scenario.build(0).unwrap();
        assert_eq!(galaxy.system(GridPos::new(1, 1)).unwrap().owner, users[0]);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = Scenario::resolve("/nonexistent/scenario.ron").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
    }
}
