//! Single-game runner.

use std::collections::BTreeMap;
use std::path::Path;

use stellar_core::config::EngineConfig;
use stellar_core::galaxy::{Galaxy, UserId};
use stellar_core::turn::TurnExecutor;

use crate::error::Result;
use crate::metrics::{GameMetrics, ReportTally};
use crate::scenario::Scenario;

/// Advance `galaxy` by up to `turns` turns, recording each.
///
/// A failed turn leaves the galaxy where it was; the run stops there and
/// the error is returned with the metrics gathered so far discarded.
///
/// Every user's report queue is drained after each turn and folded into
/// the metrics, so queues stay empty between turns.
pub fn advance(executor: &TurnExecutor, galaxy: &mut Galaxy, turns: u64, metrics: &mut GameMetrics) -> Result<()> {
    let mut drained = BTreeMap::new();
    for _ in 0..turns {
        let summary = executor.execute_turn(galaxy)?;
        metrics.record_turn(&summary);
        drain_reports(galaxy, &mut drained);
    }
    metrics.finalize(galaxy, &drained);
    Ok(())
}

fn drain_reports(galaxy: &mut Galaxy, drained: &mut BTreeMap<UserId, ReportTally>) {
    let users: Vec<UserId> = galaxy.users().iter().map(|u| u.id).collect();
    for id in users {
        if let Ok(user) = galaxy.user_mut(id) {
            let entries = user.drain_reports();
            drained.entry(id).or_default().absorb(id, &entries);
        }
    }
}

/// Build `scenario` with `seed` and play `turns` turns.
pub fn run_game(scenario: &Scenario, seed: u64, turns: u64, config: &EngineConfig) -> Result<(Galaxy, GameMetrics)> {
    let executor = TurnExecutor::new(config.clone())?;
    let (mut galaxy, _) = scenario.build(seed)?;
    let mut metrics = GameMetrics::new(scenario.name.clone(), seed);
    advance(&executor, &mut galaxy, turns, &mut metrics)?;
    tracing::info!(
        scenario = %scenario.name,
        seed,
        turns,
        battles = metrics.battles,
        winner = ?metrics.winner,
        "game finished"
    );
    Ok((galaxy, metrics))
}

/// Resume a bincode snapshot and play `turns` more turns.
pub fn run_snapshot(path: &Path, turns: u64, config: &EngineConfig) -> Result<(Galaxy, GameMetrics)> {
    let bytes = std::fs::read(path)?;
    let mut galaxy = Galaxy::deserialize(&bytes)?;
    let executor = TurnExecutor::new(config.clone())?;
    let mut metrics = GameMetrics::new(path.display().to_string(), galaxy.seed());
    advance(&executor, &mut galaxy, turns, &mut metrics)?;
    Ok((galaxy, metrics))
}

/// Play `scenario` `runs` times with the same seed and collect final hashes.
pub fn verify(scenario: &Scenario, seed: u64, turns: u64, runs: u32, config: &EngineConfig) -> Result<Vec<u64>> {
    (0..runs)
        .map(|_| run_game(scenario, seed, turns, config).map(|(_, m)| m.final_state_hash))
        .collect()
}
