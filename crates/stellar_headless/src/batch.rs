//! Batch game runner for balance testing.
//!
//! Runs one scenario under many seeds in parallel using rayon to collect
//! balance metrics across many games efficiently.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use stellar_core::config::EngineConfig;

use crate::error::Result;
use crate::metrics::{BatchSummary, GameMetrics};
use crate::runner::run_game;
use crate::scenario::Scenario;

/// Configuration for a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario name or path
    pub scenario: String,
    /// Number of games to run
    pub game_count: u32,
    /// Maximum parallel games (0 = use rayon default)
    pub parallel_games: u32,
    /// Starting seed; game `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Turns per game
    pub turns: u64,
    /// Engine settings for every game
    pub engine: EngineConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: "skirmish".to_string(),
            game_count: 100,
            parallel_games: 0,
            seed_start: 0,
            turns: 50,
            engine: EngineConfig {
                worker_count: 1,
                ..EngineConfig::default()
            },
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: &str, game_count: u32) -> Self {
        Self {
            scenario: scenario.to_string(),
            game_count,
            ..Default::default()
        }
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set turns per game
    pub fn with_turns(mut self, turns: u64) -> Self {
        self.turns = turns;
        self
    }
}

/// Error during batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchError {
    /// Game index
    pub game_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual game metrics, in seed order
    pub games: Vec<GameMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Default results file inside `dir`
    pub fn default_path(dir: &Path) -> PathBuf {
        dir.join("batch.json")
    }
}

/// Run every game of the batch.
///
/// Individual game failures are collected in [`BatchResults::errors`]; only
/// a bad scenario or thread pool aborts the batch.
pub fn run_batch(config: &BatchConfig) -> Result<BatchResults> {
    let scenario = Scenario::resolve(&config.scenario)?;
    let start = Instant::now();
    let done = AtomicU32::new(0);

    let mut pool = rayon::ThreadPoolBuilder::new();
    if config.parallel_games > 0 {
        pool = pool.num_threads(config.parallel_games as usize);
    }
    let pool = pool.build()?;

    info!(
        scenario = %scenario.name,
        games = config.game_count,
        turns = config.turns,
        threads = pool.current_num_threads(),
        "starting batch"
    );

    let outcomes: Vec<(u32, u64, Result<GameMetrics>)> = pool.install(|| {
        (0..config.game_count)
            .into_par_iter()
            .map(|index| {
                let seed = config.seed_start.wrapping_add(u64::from(index));
                let outcome = run_game(&scenario, seed, config.turns, &config.engine).map(|(_, m)| m);
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(index, seed, finished, total = config.game_count, "game done");
                (index, seed, outcome)
            })
            .collect()
    });

    let mut games = Vec::with_capacity(outcomes.len());
    let mut errors = Vec::new();
    for (game_index, seed, outcome) in outcomes {
        match outcome {
            Ok(metrics) => games.push(metrics),
            Err(e) => {
                warn!(game_index, seed, error = %e, "game failed");
                errors.push(BatchError {
                    game_index,
                    seed,
                    message: e.to_string(),
                });
            }
        }
    }

    let summary = BatchSummary::from_games(&games);
    let duration_seconds = start.elapsed().as_secs_f64();
    info!(
        games = summary.games,
        draws = summary.draws,
        failures = errors.len(),
        duration_seconds,
        "batch complete"
    );
    Ok(BatchResults {
        config: config.clone(),
        games,
        summary,
        duration_seconds,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_is_seed_ordered_and_reproducible() {
        let config = BatchConfig::new("frontier", 4).with_seed(10).with_turns(5);
        let first = run_batch(&config).unwrap();
        let second = run_batch(&config).unwrap();

        assert!(first.errors.is_empty());
        let seeds: Vec<u64> = first.games.iter().map(|g| g.seed).collect();
        assert_eq!(seeds, vec![10, 11, 12, 13]);
        let hashes = |r: &BatchResults| r.games.iter().map(|g| g.final_state_hash).collect::<Vec<_>>();
        assert_eq!(hashes(&first), hashes(&second));
    }

    #[test]
    fn test_results_roundtrip_through_json() {
        let results = run_batch(&BatchConfig::new("frontier", 2).with_turns(2)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = BatchResults::default_path(dir.path());
        results.save(&path).unwrap();
        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games, results.games);
        assert_eq!(loaded.summary, results.summary);
    }

    #[test]
    fn test_unknown_scenario_aborts() {
        assert!(run_batch(&BatchConfig::new("/missing.ron", 1)).is_err());
    }
}
