//! Headless turn runner for balance testing and CI verification.
//!
//! Plays scenarios without a server, for:
//!
//! - **Balance batches**: one scenario under many seeds, in parallel
//! - **CI verification**: the same seed must always produce the same galaxy
//! - **Snapshot inspection**: resume a bincode snapshot and advance it
//!
//! Results are written as JSON on stdout or to a file; logs go to stderr.
//!
//! # Example
//!
//! ```bash
//! # Play the built-in skirmish for 30 turns
//! cargo run -p stellar_headless -- run --scenario skirmish --turns 30
//!
//! # 500 seeds of a custom scenario
//! cargo run -p stellar_headless -- batch --scenario maps/duel.ron --count 500
//!
//! # Odds of 120 troops against a garrison of 80
//! cargo run -p stellar_headless -- invasion --attackers 120 --defenders 80
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod batch;
pub mod error;
pub mod metrics;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults};
pub use error::{HeadlessError, Result};
pub use metrics::{BatchSummary, EmpireMetrics, GameMetrics, ReportTally};
pub use runner::{run_game, run_snapshot};
pub use scenario::{Scenario, ScenarioError};
