//! User-visible turn report entries.
//!
//! Reports are the engine's externally observable output besides the galaxy
//! itself. The session layer drains them from each [`User`](crate::user::User).

use serde::{Deserialize, Serialize};

use crate::galaxy::{FleetId, GridPos, ShipId, UserId};
use crate::system::StructureKind;
use crate::user::TechField;

/// Maintenance actions that an upkeep-penalty roll can skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaintenanceAction {
    /// Refuelling from the system deuterium stockpile.
    Refuel,
    /// Replacing lost crew.
    Recrew,
    /// Hull, armor and shield repair.
    Repair,
    /// Bussard collection inside a nebula.
    BussardCollection,
}

/// Per-user summary of one space battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    /// System the battle took place in.
    pub system: GridPos,
    /// Ships this user lost.
    pub ships_lost: u32,
    /// Enemy ships this user destroyed.
    pub enemies_destroyed: u32,
    /// Rounds the battle lasted.
    pub rounds: u32,
}

/// A single report line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TurnReportItem {
    /// Food deficit killed population.
    Starvation {
        /// Starving system.
        system: GridPos,
        /// Population lost across all planets.
        population_lost: u32,
    },
    /// Industry deficit spoiled stored ore.
    OreLost {
        /// Affected system.
        system: GridPos,
        /// Ore lost.
        amount: u32,
    },
    /// Research deficit cost research points.
    ResearchLost {
        /// System whose deficit triggered the loss.
        system: GridPos,
        /// Points lost.
        amount: i64,
    },
    /// A technology level was reached.
    TechnologyGranted {
        /// Field that advanced.
        field: TechField,
        /// New level.
        level: u32,
    },
    /// A queued build finished.
    ConstructionComplete {
        /// Building system.
        system: GridPos,
        /// What was built.
        item: String,
    },
    /// Ship construction stalled because of the upkeep deficit.
    ConstructionDelayed {
        /// Building system.
        system: GridPos,
    },
    /// A finished structure could not be installed.
    ConstructionFailed {
        /// Building system.
        system: GridPos,
        /// Structure that was lost.
        structure: StructureKind,
    },
    /// An upkeep-penalty roll skipped a maintenance action.
    MaintenanceSkipped {
        /// Affected fleet.
        fleet: FleetId,
        /// Skipped action.
        action: MaintenanceAction,
    },
    /// A ship took damage from the upkeep deficit.
    UpkeepDamage {
        /// Fleet the ship belongs to.
        fleet: FleetId,
        /// Damaged ship.
        ship: ShipId,
        /// Hull points lost.
        damage: u32,
    },
    /// A fleet lost its last ship and was disbanded.
    FleetDisbanded {
        /// The removed fleet.
        fleet: FleetId,
    },
    /// An order could not be carried out and was dropped.
    OrderFailed {
        /// Fleet holding the order.
        fleet: FleetId,
        /// Why it failed.
        reason: String,
    },
    /// A move order reached its destination.
    FleetArrived {
        /// Arriving fleet.
        fleet: FleetId,
        /// Destination.
        position: GridPos,
    },
    /// A planet was settled.
    Colonized {
        /// Colonized system.
        system: GridPos,
        /// Planet index.
        planet: usize,
    },
    /// A mining order filled its holds or exhausted the field.
    MiningComplete {
        /// Mining fleet.
        fleet: FleetId,
        /// Ore carried.
        ore: u32,
    },
    /// Cargo or troops were transferred to or from a system.
    CargoTransferred {
        /// Fleet involved.
        fleet: FleetId,
        /// Ore moved into the system.
        ore: u32,
        /// Troops moved onto the fleet.
        troops: u32,
    },
    /// Ground combat result, sent to both sides.
    Invasion {
        /// Contested system.
        system: GridPos,
        /// Invading user.
        attacker: UserId,
        /// Defending user.
        defender: UserId,
        /// Whether the attacker took the system.
        attacker_won: bool,
        /// Attacker troops lost.
        attacker_losses: u32,
        /// Defender troops lost.
        defender_losses: u32,
    },
    /// Detailed bombardment damage, sent to the defender.
    BombardmentSuffered {
        /// Bombarded system.
        system: GridPos,
        /// Population killed per planet index.
        population_killed: Vec<(usize, u32)>,
        /// Troops killed.
        troops_killed: u32,
        /// Structures destroyed as (planet, kind).
        structures_destroyed: Vec<(usize, StructureKind)>,
        /// Morale lost.
        morale_lost: u32,
    },
    /// Short bombardment summary, sent to the attacker.
    BombardmentConducted {
        /// Bombarded system.
        system: GridPos,
        /// Launchers fired.
        launchers: u32,
        /// Total population killed.
        population_killed: u32,
    },
    /// Space battle summary.
    Battle(BattleReport),
}

/// A report item stamped with the turn that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Turn number the entry was produced in.
    pub turn: u64,
    /// The report content.
    pub item: TurnReportItem,
}
