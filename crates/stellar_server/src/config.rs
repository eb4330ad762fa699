//! Server configuration, loaded from RON.
//!
//! ```ron
//! (
//!     turn_interval_secs: 300,
//!     snapshot_every: 10,
//!     snapshot_dir: Some("snapshots"),
//!     engine: (worker_count: 8),
//! )
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use stellar_core::config::EngineConfig;

use crate::error::{Result, ServerError};

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Seconds between scheduled turns.
    pub turn_interval_secs: u64,
    /// Persist a snapshot every this many completed turns (0 disables).
    pub snapshot_every: u64,
    /// Where snapshots are written.
    pub snapshot_dir: Option<PathBuf>,
    /// Turn engine tuning.
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            turn_interval_secs: 300,
            snapshot_every: 0,
            snapshot_dir: None,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse and validate a config from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a RON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.turn_interval_secs == 0 {
            return Err(ServerError::Config("turn_interval_secs must be at least 1".into()));
        }
        if self.snapshot_every > 0 && self.snapshot_dir.is_none() {
            return Err(ServerError::Config(
                "snapshot_every is set but snapshot_dir is missing".into(),
            ));
        }
        self.engine.validate()?;
        Ok(())
    }

    /// Interval between scheduled turns.
    #[must_use]
    pub const fn turn_interval(&self) -> Duration {
        Duration::from_secs(self.turn_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = ServerConfig::from_ron_str("(turn_interval_secs: 60, engine: (worker_count: 2))").unwrap();
        assert_eq!(config.turn_interval(), Duration::from_secs(60));
        assert_eq!(config.engine.worker_count, 2);
        assert_eq!(config.engine.max_battle_rounds, EngineConfig::default().max_battle_rounds);
        assert_eq!(config.snapshot_every, 0);
    }

    #[test]
    fn test_snapshots_need_a_directory() {
        let err = ServerConfig::from_ron_str("(snapshot_every: 5)").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn test_engine_config_is_validated() {
        let err = ServerConfig::from_ron_str("(engine: (worker_count: 0))").unwrap_err();
        assert!(matches!(err, ServerError::Game(_)));
    }
}
