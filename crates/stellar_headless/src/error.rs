//! Error type for headless runs.

use thiserror::Error;

use stellar_core::error::GameError;

use crate::scenario::ScenarioError;

/// Result type alias using [`HeadlessError`].
pub type Result<T> = std::result::Result<T, HeadlessError>;

/// Errors from running games headlessly.
#[derive(Debug, Error)]
pub enum HeadlessError {
    /// The engine rejected the configuration or a turn.
    #[error(transparent)]
    Game(#[from] GameError),

    /// The scenario could not be loaded or built.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON output could not be produced or read.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The batch thread pool could not be built.
    #[error("Thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
