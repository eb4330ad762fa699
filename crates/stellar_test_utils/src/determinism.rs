//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the turn engine produces identical
//! galaxies given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays must be exact: the same seed, setup and worker count must always
//! produce the same galaxy. Sources of non-determinism include:
//!
//! - **Thread scheduling**: Phase-1 handlers run concurrently. Each one
//!   draws from its own random lane and writes only its own data, and
//!   deferred outputs are merged in chunk order.
//!
//! - **Map iteration order**: Rust's default hasher is randomized. Engine
//!   state uses `Vec` and `BTreeMap` only.
//!
//! - **System randomness**: No calls to `thread_rng()`. All random behavior
//!   uses ChaCha streams seeded from the galaxy seed and turn number.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual handler determinism
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full multi-turn games are reproducible
//! 4. **Parallel tests**: Running N games on separate threads all match

use std::thread;

use stellar_core::config::EngineConfig;
use stellar_core::error::Result;
use stellar_core::galaxy::Galaxy;
use stellar_core::turn::TurnExecutor;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of turns executed.
    pub turns: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic engine).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the engine was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Turn engine is non-deterministic!\n\
                 Runs: {}\n\
                 Turns: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.turns,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `steps` - Number of steps per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute a state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..steps {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        turns: steps,
    }
}

/// Advance `galaxy` by `turns` turns.
///
/// Turn errors are logged and do not stop the run; the resulting state is
/// still compared.
pub fn run_turns(executor: &TurnExecutor, galaxy: &mut Galaxy, turns: u64) {
    for _ in 0..turns {
        if let Err(e) = executor.execute_turn(galaxy) {
            tracing::warn!(turn = galaxy.turn(), error = %e, "turn aborted during determinism run");
        }
    }
}

/// Run the same galaxy setup twice for `turns` turns and compare state hashes.
///
/// # Example
///
/// ```ignore
/// use stellar_test_utils::determinism::verify_galaxy_determinism;
/// use stellar_test_utils::fixtures::two_empires;
///
/// let result = verify_galaxy_determinism(|| two_empires(7).unwrap().0, 20, &config)?;
/// result.assert_deterministic();
/// ```
pub fn verify_galaxy_determinism<F>(setup_fn: F, turns: u64, config: &EngineConfig) -> Result<DeterminismResult>
where
    F: Fn() -> Galaxy,
{
    let executor = TurnExecutor::new(config.clone())?;
    Ok(verify_determinism(
        2,
        turns,
        &setup_fn,
        |galaxy| run_turns(&executor, galaxy, 1),
        Galaxy::state_hash,
    ))
}

/// Run `num_games` copies of the same setup on separate threads.
///
/// Each thread builds its own executor and pool, so this also catches
/// dependence on thread scheduling.
pub fn run_parallel_games<F>(setup_fn: F, num_games: usize, turns: u64, config: &EngineConfig) -> Result<DeterminismResult>
where
    F: Fn() -> Galaxy + Sync,
{
    let outcomes: Vec<Result<u64>> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_games)
            .map(|_| {
                s.spawn(|| -> Result<u64> {
                    let executor = TurnExecutor::new(config.clone())?;
                    let mut galaxy = setup_fn();
                    run_turns(&executor, &mut galaxy, turns);
                    Ok(galaxy.state_hash())
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
            .collect()
    });

    let hashes = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    Ok(DeterminismResult {
        is_deterministic,
        hashes,
        turns,
    })
}

/// Compare two runs turn by turn, finding the first divergence.
///
/// Returns `None` if the runs match for all `turns`, `Some(turn)` with the
/// first turn number whose resulting state differs.
pub fn find_first_divergence<F>(setup_fn: F, turns: u64, config: &EngineConfig) -> Result<Option<u64>>
where
    F: Fn() -> Galaxy,
{
    let executor = TurnExecutor::new(config.clone())?;
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Ok(Some(0));
    }
    for _ in 0..turns {
        run_turns(&executor, &mut first, 1);
        run_turns(&executor, &mut second, 1);
        if first.state_hash() != second.state_hash() {
            return Ok(Some(first.turn()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_determinism_counter() {
        let result = verify_determinism(3, 10, || 0u64, |n| *n += 2, |n| *n);
        result.assert_deterministic();
        assert_eq!(result.hashes, vec![20, 20, 20]);
    }

    #[test]
    fn test_unique_hashes() {
        let result = DeterminismResult {
            is_deterministic: false,
            hashes: vec![3, 1, 3],
            turns: 1,
        };
        assert_eq!(result.unique_hashes(), vec![1, 3]);
    }
}
