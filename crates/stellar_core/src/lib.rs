//! # Stellar Core
//!
//! Turn execution engine and combat resolution for a turn-based, multiplayer
//! space strategy game.
//!
//! This crate contains **only** the rules of the universe:
//! - No networking
//! - No persistence beyond byte snapshots
//! - No wall-clock scheduling
//!
//! Every random draw comes from a ChaCha stream derived from the galaxy seed,
//! the turn number and a fixed lane, so a galaxy replays identically for a
//! given seed and worker count.
//!
//! ## Crate Structure
//!
//! - [`galaxy`] - The grid arena of systems, users and fleets
//! - [`turn`] - The turn executor and its phase handlers
//! - [`orders`] - Fleet orders and build queues
//! - [`combat`] - Space battles, ground invasions, bombardment
//! - [`system`] - Star systems, planets, structures and economy
//! - [`fleet`] / [`ship`] - Fleets, ships and derived ship stats
//! - [`user`] - Players, technology and research
//! - [`visibility`] - Per-user sensor overlays
//! - [`report`] - User-visible turn reports

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod config;
pub mod error;
pub mod fleet;
pub mod galaxy;
pub mod orders;
pub mod report;
pub mod rng;
pub mod ship;
pub mod system;
pub mod turn;
pub mod user;
pub mod visibility;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::combat::ground::{GroundCombat, GroundOutcome, InvasionForecast};
    pub use crate::combat::space::{BattleEnd, BattleSummary, SpaceBattle, SpaceCombatResolver};
    pub use crate::config::EngineConfig;
    pub use crate::error::{GameError, Result};
    pub use crate::fleet::{Fleet, FleetStore};
    pub use crate::galaxy::{FleetId, Galaxy, GridPos, ShipId, UserId};
    pub use crate::orders::{BuildKind, BuildOrder, Order, OrderKind, OrderStatus};
    pub use crate::report::{BattleReport, MaintenanceAction, ReportEntry, TurnReportItem};
    pub use crate::ship::{Component, HullClass, Ship, ShipStats};
    pub use crate::system::{Planet, PlanetKind, StarSystem, StructureKind, SystemEconomy, SystemKind};
    pub use crate::turn::{TurnExecutor, TurnSummary};
    pub use crate::user::{Faction, TechField, TechLevels, User};
}
