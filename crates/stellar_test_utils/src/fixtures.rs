//! Test fixtures and helpers.
//!
//! Pre-built galaxies, homeworlds and ship designs for consistent testing,
//! plus proptest strategies for engine inputs.

use serde::{Deserialize, Serialize};

use stellar_core::error::Result;
use stellar_core::galaxy::{FleetId, Galaxy, GridPos, ShipId, UserId};
use stellar_core::ship::{Component, HullClass, Ship};
use stellar_core::system::{Planet, PlanetKind, StructureKind, SystemKind};
use stellar_core::user::{Faction, TechField, TechLevels};

/// Deuterium stocked on a fixture homeworld.
pub const HOMEWORLD_DEUTERIUM: i64 = 500;

/// Garrison of a fixture homeworld.
pub const HOMEWORLD_TROOPS: i64 = 20;

/// A named hull and component list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipDesign {
    /// Ship name.
    pub name: String,
    /// Hull class.
    pub hull: HullClass,
    /// Installed components.
    pub components: Vec<Component>,
}

impl ShipDesign {
    /// Create a design.
    #[must_use]
    pub fn new(name: impl Into<String>, hull: HullClass, components: Vec<Component>) -> Self {
        Self {
            name: name.into(),
            hull,
            components,
        }
    }

    /// Unarmed scout with an extra sensor suite.
    #[must_use]
    pub fn scout() -> Self {
        Self::new(
            "Pathfinder",
            HullClass::Scout,
            vec![Component::SensorArray { strength: 60 }],
        )
    }

    /// Shield-breaking line ship.
    #[must_use]
    pub fn beam_cruiser() -> Self {
        Self::new(
            "Lancer",
            HullClass::Cruiser,
            vec![
                Component::BeamEmitter { damage: 30.0 },
                Component::BeamEmitter { damage: 30.0 },
                Component::ShieldGenerator { amount: 60.0 },
                Component::ArmorPlating { amount: 80.0 },
                Component::Engine { thrust: 10 },
            ],
        )
    }

    /// Hull-cracking escort, also used for bombardment.
    #[must_use]
    pub fn torpedo_frigate() -> Self {
        Self::new(
            "Harrier",
            HullClass::Frigate,
            vec![
                Component::TorpedoLauncher {
                    damage: 40.0,
                    structure_hit_chance: 0.2,
                },
                Component::ArmorPlating { amount: 40.0 },
            ],
        )
    }

    /// Transport carrying `troops` ground troops.
    #[must_use]
    pub fn troop_transport(troops: u32) -> Self {
        Self::new(
            "Drop Ship",
            HullClass::Transport,
            vec![Component::TroopBay { capacity: troops }],
        )
    }

    /// Colony ship.
    #[must_use]
    pub fn colony_ship() -> Self {
        Self::new("Ark", HullClass::ColonyShip, vec![Component::ColonyPod])
    }

    /// Asteroid miner with two lasers and a large hold.
    #[must_use]
    pub fn miner() -> Self {
        Self::new(
            "Prospector",
            HullClass::Transport,
            vec![
                Component::MiningLaser,
                Component::MiningLaser,
                Component::CargoHold { capacity: 200 },
            ],
        )
    }

    /// Fuel scoop for nebula operations.
    #[must_use]
    pub fn collector() -> Self {
        Self::new(
            "Scoop",
            HullClass::Corvette,
            vec![Component::BussardCollector, Component::FuelTank { capacity: 100.0 }],
        )
    }

    /// Build a standalone ship from the design.
    #[must_use]
    pub fn build(&self, id: ShipId, tech: &TechLevels) -> Ship {
        Ship::new(id, self.name.clone(), self.hull, self.components.clone(), tech)
    }
}

/// Turn `pos` into a developed homeworld owned by `owner`.
///
/// One terran planet with 300 population, food, power, industry, research
/// and a shipyard all in surplus; one gas giant; a stocked deuterium store
/// and a garrison.
pub fn homeworld(galaxy: &mut Galaxy, owner: UserId, pos: GridPos) -> Result<()> {
    galaxy.set_system_owner(pos, owner)?;
    let system = galaxy.system_mut(pos)?;
    system.kind = SystemKind::Star;
    system.name = format!("{} Prime", system.name);

    let mut prime = Planet::new("Prime", PlanetKind::Terran, 1_000, 10);
    prime.set_population(300);
    system.planets.push(prime);
    system.planets.push(Planet::new("Giant", PlanetKind::GasGiant, 0, 0));

    let layout = [
        StructureKind::Farm,
        StructureKind::Farm,
        StructureKind::Farm,
        StructureKind::PowerPlant,
        StructureKind::PowerPlant,
        StructureKind::Factory,
        StructureKind::Factory,
        StructureKind::Shipyard,
        StructureKind::ResearchLab,
    ];
    for (slot, kind) in layout.into_iter().enumerate() {
        system.build_structure(0, slot as u8, kind)?;
    }
    system.set_deuterium(HOMEWORLD_DEUTERIUM);
    system.set_troops(HOMEWORLD_TROOPS);
    Ok(())
}

struct EmpireSpec {
    name: String,
    faction: Faction,
    home: GridPos,
    tech: TechLevels,
    fleets: Vec<(String, GridPos, Vec<ShipDesign>)>,
}

/// Declarative galaxy setup for tests and benchmarks.
///
/// # Example
///
/// ```ignore
/// let (galaxy, users) = GalaxyBuilder::new(8, 8)
///     .seed(42)
///     .empire("Ada", Faction::Terran, GridPos::new(1, 1))
///     .fleet(0, "Home Guard", vec![ShipDesign::beam_cruiser()])
///     .build()?;
/// ```
pub struct GalaxyBuilder {
    width: u32,
    height: u32,
    seed: u64,
    empires: Vec<EmpireSpec>,
    fields: Vec<(GridPos, SystemKind, u32)>,
}

impl GalaxyBuilder {
    /// Start an empty `width × height` galaxy with seed 0.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            seed: 0,
            empires: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Set the seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Add an empire with a homeworld at `home`.
    #[must_use]
    pub fn empire(mut self, name: impl Into<String>, faction: Faction, home: GridPos) -> Self {
        self.empires.push(EmpireSpec {
            name: name.into(),
            faction,
            home,
            tech: TechLevels::default(),
            fleets: Vec::new(),
        });
        self
    }

    /// Set one technology level of the most recently added empire.
    #[must_use]
    pub fn tech(mut self, field: TechField, level: u32) -> Self {
        if let Some(empire) = self.empires.last_mut() {
            empire.tech.set(field, level);
        }
        self
    }

    /// Add a fleet at the homeworld of empire `empire` (index in insertion order).
    #[must_use]
    pub fn fleet(self, empire: usize, name: impl Into<String>, ships: Vec<ShipDesign>) -> Self {
        let home = self.empires.get(empire).map_or(GridPos::new(0, 0), |e| e.home);
        self.fleet_at(empire, name, home, ships)
    }

    /// Add a fleet of empire `empire` at `pos`.
    #[must_use]
    pub fn fleet_at(mut self, empire: usize, name: impl Into<String>, pos: GridPos, ships: Vec<ShipDesign>) -> Self {
        if let Some(spec) = self.empires.get_mut(empire) {
            spec.fleets.push((name.into(), pos, ships));
        }
        self
    }

    /// Make `pos` a nebula holding `pool` deuterium.
    #[must_use]
    pub fn nebula(mut self, pos: GridPos, pool: u32) -> Self {
        self.fields.push((pos, SystemKind::Nebula, pool));
        self
    }

    /// Make `pos` an asteroid field holding `pool` ore.
    #[must_use]
    pub fn asteroid_field(mut self, pos: GridPos, pool: u32) -> Self {
        self.fields.push((pos, SystemKind::AsteroidField, pool));
        self
    }

    /// Build the galaxy. Returns it with the user ids in insertion order.
    pub fn build(self) -> Result<(Galaxy, Vec<UserId>)> {
        let mut galaxy = Galaxy::new(self.width, self.height, self.seed);

        for (pos, kind, pool) in self.fields {
            let system = galaxy.system_mut(pos)?;
            system.kind = kind;
            system.resources_left = pool;
        }

        let mut users = Vec::with_capacity(self.empires.len());
        for empire in self.empires {
            let user = galaxy.add_user(empire.name, empire.faction);
            galaxy.user_mut(user)?.tech = empire.tech;
            homeworld(&mut galaxy, user, empire.home)?;
            for (name, pos, designs) in empire.fleets {
                spawn_designs(&mut galaxy, user, name, pos, &designs)?;
            }
            users.push(user);
        }
        Ok((galaxy, users))
    }
}

/// Spawn a fleet of `designs` for `owner` at `pos`.
pub fn spawn_designs(
    galaxy: &mut Galaxy,
    owner: UserId,
    name: impl Into<String>,
    pos: GridPos,
    designs: &[ShipDesign],
) -> Result<FleetId> {
    let ships = designs
        .iter()
        .map(|d| galaxy.create_ship(owner, d.name.clone(), d.hull, d.components.clone()))
        .collect::<Result<Vec<_>>>()?;
    galaxy.spawn_fleet(owner, name, pos, ships)
}

/// Two terran empires in opposite corners of a 10 × 10 galaxy, each with a
/// mixed battle fleet at home.
pub fn two_empires(seed: u64) -> Result<(Galaxy, Vec<UserId>)> {
    let line = vec![ShipDesign::beam_cruiser(), ShipDesign::torpedo_frigate()];
    GalaxyBuilder::new(10, 10)
        .seed(seed)
        .empire("Ada", Faction::Terran, GridPos::new(1, 1))
        .fleet(0, "First Fleet", line.clone())
        .empire("Brin", Faction::Zenthari, GridPos::new(8, 8))
        .fleet(1, "Second Fleet", line)
        .nebula(GridPos::new(5, 4), 500)
        .asteroid_field(GridPos::new(4, 5), 1_000)
        .build()
}

/// Proptest strategies for engine inputs.
pub mod strategies {
    use proptest::prelude::*;
    use stellar_core::ship::{Component, HullClass};
    use stellar_core::user::{TechField, TechLevels};

    use super::ShipDesign;

    /// Hull classes.
    pub fn arb_hull() -> impl Strategy<Value = HullClass> {
        prop_oneof![
            Just(HullClass::Scout),
            Just(HullClass::Corvette),
            Just(HullClass::Frigate),
            Just(HullClass::Destroyer),
            Just(HullClass::Cruiser),
            Just(HullClass::Battleship),
            Just(HullClass::Transport),
            Just(HullClass::ColonyShip),
        ]
    }

    /// Combat-relevant components with bounded ratings.
    pub fn arb_component() -> impl Strategy<Value = Component> {
        prop_oneof![
            (1.0..80.0f64).prop_map(|damage| Component::BeamEmitter { damage }),
            (1.0..80.0f64, 0.0..1.0f64).prop_map(|(damage, structure_hit_chance)| {
                Component::TorpedoLauncher {
                    damage,
                    structure_hit_chance,
                }
            }),
            (0.0..200.0f64).prop_map(|amount| Component::ArmorPlating { amount }),
            (0.0..200.0f64).prop_map(|amount| Component::ShieldGenerator { amount }),
            (0..40u32).prop_map(|thrust| Component::Engine { thrust }),
            (0..200u32).prop_map(|strength| Component::SensorArray { strength }),
        ]
    }

    /// Technology levels up to 10 per field.
    pub fn arb_tech() -> impl Strategy<Value = TechLevels> {
        proptest::collection::vec(0..=10u32, TechField::ALL.len()).prop_map(|levels| {
            let mut tech = TechLevels::default();
            for (field, level) in TechField::ALL.into_iter().zip(levels) {
                tech.set(field, level);
            }
            tech
        })
    }

    /// A random design of up to six components.
    pub fn arb_design() -> impl Strategy<Value = ShipDesign> {
        (arb_hull(), proptest::collection::vec(arb_component(), 0..6))
            .prop_map(|(hull, components)| ShipDesign::new("Random", hull, components))
    }
}
