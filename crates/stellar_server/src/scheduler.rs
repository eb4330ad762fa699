//! Periodic turn driver.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::host::GameHost;

/// What the scheduler needs from the server config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// Time between turns.
    pub interval: Duration,
    /// Snapshot cadence in turns (0 disables).
    pub snapshot_every: u64,
    /// Snapshot destination.
    pub snapshot_dir: Option<PathBuf>,
}

impl From<&ServerConfig> for Schedule {
    fn from(config: &ServerConfig) -> Self {
        Self {
            interval: config.turn_interval(),
            snapshot_every: config.snapshot_every,
            snapshot_dir: config.snapshot_dir.clone(),
        }
    }
}

/// Run turns every `schedule.interval` until `shutdown` resolves.
///
/// The first turn runs one full interval after start. Ticks missed while a
/// long turn was running are skipped, not replayed. A failed turn is logged
/// and the schedule continues. Returns the number of turns completed.
pub async fn run(host: GameHost, schedule: Schedule, shutdown: impl Future<Output = ()>) -> Result<u64> {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + schedule.interval, schedule.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut completed = 0;
    loop {
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!(completed, "scheduler shutting down");
                return Ok(completed);
            }
            _ = interval.tick() => {}
        }

        match host.run_turn().await {
            Ok(summary) => {
                completed += 1;
                if let Some(dir) = &schedule.snapshot_dir {
                    if schedule.snapshot_every > 0 && summary.turn % schedule.snapshot_every == 0 {
                        if let Err(e) = host.persist(dir).await {
                            tracing::error!(turn = summary.turn, error = %e, "snapshot failed");
                        }
                    }
                }
            }
            Err(e) => tracing::error!(error = %e, "scheduled turn failed"),
        }
    }
}
