//! Error types for the server host.

use thiserror::Error;

use stellar_core::error::GameError;
use stellar_core::galaxy::UserId;

/// Result type alias using [`ServerError`].
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors raised by the host, the scheduler and the binary.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The engine rejected a command or a turn.
    #[error(transparent)]
    Game(#[from] GameError),

    /// A command touched something the issuing user does not own.
    #[error("User {user:?} does not own {what}")]
    NotOwner {
        /// Issuing user.
        user: UserId,
        /// The asset that was addressed.
        what: String,
    },

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server configuration could not be parsed or is inconsistent.
    #[error("Invalid server configuration: {0}")]
    Config(String),

    /// A blocking turn task panicked or was cancelled.
    #[error("Turn task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
