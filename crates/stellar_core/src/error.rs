//! Error types for the turn engine.

use thiserror::Error;

use crate::galaxy::{FleetId, GridPos, ShipId, UserId};

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all turn engine errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// No user with this identifier exists.
    #[error("Unknown user: {0:?}")]
    UnknownUser(UserId),

    /// No fleet with this identifier exists.
    #[error("Unknown fleet: {0:?}")]
    UnknownFleet(FleetId),

    /// No ship with this identifier exists in the given fleet.
    #[error("Ship {ship:?} not found in fleet {fleet:?}")]
    UnknownShip {
        /// Fleet that was searched.
        fleet: FleetId,
        /// Ship that was not found.
        ship: ShipId,
    },

    /// Grid position outside the galaxy bounds.
    #[error("Position ({}, {}) is outside the galaxy", .0.x, .0.y)]
    PositionOutOfBounds(GridPos),

    /// An order failed its issuance-time precondition checks.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// A structure slot is out of range or already occupied.
    #[error("Structure slot {slot} unavailable on planet {planet}")]
    SlotUnavailable {
        /// Planet index within the system.
        planet: usize,
        /// Requested slot.
        slot: u8,
    },

    /// A turn is already running on this galaxy.
    #[error("A turn is already in progress")]
    TurnInProgress,

    /// A phase-1 worker failed or panicked.
    #[error("Worker failed: {0}")]
    WorkerFailed(String),

    /// Configuration could not be parsed or is inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Galaxy (de)serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
