//! Headless Stellar turn runner.
//!
//! # Usage
//!
//! ```bash
//! # Run a single game and print its metrics
//! cargo run -p stellar_headless -- run --scenario skirmish --turns 40
//!
//! # Resume a snapshot and save the result
//! cargo run -p stellar_headless -- run --snapshot turn-000040.bin --turns 10 --save next.bin
//!
//! # Run batch balance test
//! cargo run -p stellar_headless -- batch --scenario skirmish --count 1000 --output results/
//!
//! # Verify determinism
//! cargo run -p stellar_headless -- verify --scenario frontier --seed 12345 --runs 5
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stellar_core::combat::ground::{attacker_strength, defender_strength, GroundCombat, GroundForces};
use stellar_core::config::EngineConfig;
use stellar_headless::{
    batch::{run_batch, BatchConfig, BatchResults},
    runner::{run_game, run_snapshot, verify},
    Result, Scenario,
};

#[derive(Parser)]
#[command(name = "stellar_headless")]
#[command(about = "Headless Stellar turn runner for balance testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration (RON)
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a single game
    Run {
        /// Built-in scenario name or RON path
        #[arg(short, long, default_value = "skirmish", conflicts_with = "snapshot")]
        scenario: String,

        /// Resume from a bincode snapshot instead
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Turns to play
        #[arg(short, long, default_value = "50")]
        turns: u64,

        /// Galaxy seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Write the final galaxy as a bincode snapshot
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Run batch of games for balance testing
    Batch {
        /// Built-in scenario name or RON path
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Turns per game
        #[arg(short, long, default_value = "50")]
        turns: u64,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Forecast a ground invasion
    Invasion {
        /// Attacking troops
        #[arg(long)]
        attackers: u32,

        /// Defending garrison
        #[arg(long)]
        defenders: u32,

        /// Attacker weapons tech
        #[arg(long, default_value = "0")]
        attacker_weapons: u32,

        /// Defender weapons tech
        #[arg(long, default_value = "0")]
        defender_weapons: u32,

        /// Defender construction tech
        #[arg(long, default_value = "0")]
        defender_construction: u32,

        /// Defending system morale
        #[arg(long, default_value = "50")]
        morale: u32,

        /// Defending system defense rating
        #[arg(long, default_value = "0")]
        defense: u32,

        /// Simulated battles
        #[arg(short, long, default_value = "1000")]
        runs: u32,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Built-in scenario name or RON path
        #[arg(short, long, default_value = "skirmish")]
        scenario: String,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Turns per run
        #[arg(short, long, default_value = "30")]
        turns: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for results)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    let outcome = load_engine(cli.engine).and_then(|engine| dispatch(cli.command, &engine));
    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!(error = %e, "headless run failed");
            std::process::exit(2);
        }
    }
}

fn load_engine(path: Option<PathBuf>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)?;
    Ok(EngineConfig::from_ron_str(&text)?)
}

/// Returns whether the command succeeded.
fn dispatch(command: Commands, engine: &EngineConfig) -> Result<bool> {
    match command {
        Commands::Run {
            scenario,
            snapshot,
            turns,
            seed,
            save,
        } => {
            let (galaxy, metrics) = match snapshot {
                Some(path) => run_snapshot(&path, turns, engine)?,
                None => run_game(&Scenario::resolve(&scenario)?, seed, turns, engine)?,
            };
            if let Some(path) = save {
                std::fs::write(&path, galaxy.serialize()?)?;
                tracing::info!(path = %path.display(), "snapshot saved");
            }
            println!("{}", serde_json::to_string_pretty(&metrics)?);
            Ok(true)
        }
        Commands::Batch {
            scenario,
            count,
            parallel,
            turns,
            output,
            seed,
        } => {
            let config = BatchConfig {
                parallel_games: parallel,
                engine: EngineConfig {
                    worker_count: 1,
                    ..engine.clone()
                },
                ..BatchConfig::new(&scenario, count).with_seed(seed).with_turns(turns)
            };
            let results = run_batch(&config)?;
            let path = BatchResults::default_path(&output);
            results.save(&path)?;
            tracing::info!(path = %path.display(), "results saved");
            println!("{}", serde_json::to_string_pretty(&results.summary)?);
            Ok(results.errors.is_empty())
        }
        Commands::Invasion {
            attackers,
            defenders,
            attacker_weapons,
            defender_weapons,
            defender_construction,
            morale,
            defense,
            runs,
            seed,
        } => {
            let combat = GroundCombat::new(
                GroundForces {
                    troops: attackers,
                    strength: attacker_strength(attacker_weapons),
                },
                GroundForces {
                    troops: defenders,
                    strength: defender_strength(defender_weapons, morale, defense, defender_construction),
                },
            );
            let forecast = combat.simulate(runs, &mut ChaCha8Rng::seed_from_u64(seed));
            tracing::info!(win_rate = forecast.win_rate(), "invasion forecast");
            println!("{}", serde_json::to_string_pretty(&forecast)?);
            Ok(true)
        }
        Commands::Verify {
            scenario,
            seed,
            turns,
            runs,
        } => {
            let hashes = verify(&Scenario::resolve(&scenario)?, seed, turns, runs, engine)?;
            let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
            if deterministic {
                tracing::info!(runs, turns, hash = hashes.first().copied().unwrap_or(0), "deterministic");
            } else {
                tracing::error!(?hashes, "runs diverged");
            }
            Ok(deterministic)
        }
    }
}
