//! Engine configuration.
//!
//! Operational knobs for the turn engine. Formula constants that define game
//! rules live next to the code that uses them; the values here are the ones
//! a server operator is expected to tune.
//!
//! # Example RON
//!
//! ```ron
//! EngineConfig(
//!     worker_count: 4,
//!     max_battle_rounds: 10000,
//!     research_base_cost: 100,
//!     max_upkeep_failure_chance: 0.9,
//!     bussard_rate: 10,
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Configuration for [`TurnExecutor`](crate::turn::TurnExecutor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of system-handler workers. Rows are split into this many chunks.
    pub worker_count: usize,
    /// Round cap for a single space battle. Hitting it is logged as an anomaly.
    pub max_battle_rounds: u32,
    /// Research cost of raising a tech field from level 0 to 1.
    ///
    /// Level `n` to `n + 1` costs `research_base_cost * (n + 1)^2`.
    pub research_base_cost: i64,
    /// Upper bound on the chance that a maintenance action fails under upkeep deficit.
    pub max_upkeep_failure_chance: f64,
    /// Deuterium gathered per bussard collector per turn inside a nebula.
    pub bussard_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            max_battle_rounds: 10_000,
            research_base_cost: 100,
            max_upkeep_failure_chance: 0.9,
            bussard_rate: 10,
        }
    }
}

impl EngineConfig {
    /// Parse a config from RON text and validate it.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| GameError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(GameError::Config("worker_count must be at least 1".into()));
        }
        if self.max_battle_rounds == 0 {
            return Err(GameError::Config(
                "max_battle_rounds must be at least 1".into(),
            ));
        }
        if self.research_base_cost <= 0 {
            return Err(GameError::Config(format!(
                "research_base_cost must be positive, got {}",
                self.research_base_cost
            )));
        }
        if !(0.0..=1.0).contains(&self.max_upkeep_failure_chance) {
            return Err(GameError::Config(format!(
                "max_upkeep_failure_chance must be within [0, 1], got {}",
                self.max_upkeep_failure_chance
            )));
        }
        Ok(())
    }
}
