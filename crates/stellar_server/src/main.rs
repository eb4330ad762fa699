//! Stellar Turn Server

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stellar_core::galaxy::Galaxy;
use stellar_core::turn::TurnExecutor;
use stellar_server::{scheduler, GameHost, Schedule, ServerConfig};

#[derive(Parser)]
#[command(name = "stellar_server")]
#[command(about = "Advance a galaxy on a fixed turn schedule")]
#[command(version)]
struct Cli {
    /// Server configuration (RON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Galaxy snapshot to resume from
    #[arg(short, long)]
    galaxy: Option<PathBuf>,

    /// Width of a fresh galaxy when no snapshot is given
    #[arg(long, default_value = "32")]
    width: u32,

    /// Height of a fresh galaxy when no snapshot is given
    #[arg(long, default_value = "32")]
    height: u32,

    /// Seed of a fresh galaxy when no snapshot is given
    #[arg(long, default_value = "0")]
    seed: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = serve(Cli::parse()).await {
        tracing::error!(error = %e, "server stopped");
        std::process::exit(1);
    }
}

async fn serve(cli: Cli) -> stellar_server::Result<()> {
    let config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    let executor = TurnExecutor::new(config.engine.clone())?;
    let host = match &cli.galaxy {
        Some(path) => GameHost::load(path, executor)?,
        None => GameHost::new(Galaxy::new(cli.width, cli.height, cli.seed), executor),
    };

    tracing::info!(
        turn = host.turn().await,
        interval_secs = config.turn_interval_secs,
        workers = config.engine.worker_count,
        "Starting Stellar turn server"
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };
    let turns = scheduler::run(host.clone(), Schedule::from(&config), shutdown).await?;

    if let Some(dir) = &config.snapshot_dir {
        host.persist(dir).await?;
    }
    tracing::info!(turns, "server stopped cleanly");
    Ok(())
}
