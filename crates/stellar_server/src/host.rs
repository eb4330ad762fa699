//! Owns the live galaxy and serializes every mutation with turn execution.
//!
//! The galaxy sits behind a `tokio::sync::RwLock`. A turn holds the write
//! lock for its whole run on a blocking thread, and every client command
//! that mutates the galaxy takes the same lock, so commands land either
//! before or after a turn, never inside one. An atomic flag mirrors the
//! engine's in-progress marker so snapshot requests fail fast instead of
//! queueing behind a running turn.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, RwLock};

use stellar_core::error::GameError;
use stellar_core::galaxy::{FleetId, Galaxy, GridPos, UserId};
use stellar_core::orders::{BuildKind, Order, OrderKind};
use stellar_core::report::ReportEntry;
use stellar_core::turn::{TurnExecutor, TurnSummary};
use stellar_core::user::TechField;

use crate::error::{Result, ServerError};

/// Lowers the turn-running flag when dropped, including on cancellation.
struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The running game.
#[derive(Debug, Clone)]
pub struct GameHost {
    galaxy: Arc<RwLock<Galaxy>>,
    executor: Arc<TurnExecutor>,
    turn_running: Arc<AtomicBool>,
    completed: Arc<watch::Sender<u64>>,
}

impl GameHost {
    /// Host `galaxy` with a fresh executor.
    pub fn new(galaxy: Galaxy, executor: TurnExecutor) -> Self {
        let (completed, _) = watch::channel(galaxy.turn());
        Self {
            galaxy: Arc::new(RwLock::new(galaxy)),
            executor: Arc::new(executor),
            turn_running: Arc::new(AtomicBool::new(false)),
            completed: Arc::new(completed),
        }
    }

    /// Restore a host from a snapshot file.
    pub fn load(path: &Path, executor: TurnExecutor) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let galaxy = Galaxy::deserialize(&bytes)?;
        tracing::info!(path = %path.display(), turn = galaxy.turn(), "galaxy restored");
        Ok(Self::new(galaxy, executor))
    }

    /// Whether a turn is executing right now.
    #[must_use]
    pub fn is_turn_running(&self) -> bool {
        self.turn_running.load(Ordering::Acquire)
    }

    /// Receiver that observes the number of every completed turn.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.completed.subscribe()
    }

    /// Current turn number.
    pub async fn turn(&self) -> u64 {
        self.galaxy.read().await.turn()
    }

    /// Run `f` against a read-only view of the galaxy.
    pub async fn inspect<T>(&self, f: impl FnOnce(&Galaxy) -> T) -> T {
        f(&*self.galaxy.read().await)
    }

    /// Execute one turn on a blocking thread.
    ///
    /// Refuses to start while another turn runs.
    pub async fn run_turn(&self) -> Result<TurnSummary> {
        if self.is_turn_running() {
            return Err(GameError::TurnInProgress.into());
        }
        let mut guard = Arc::clone(&self.galaxy).write_owned().await;
        if self.turn_running.swap(true, Ordering::AcqRel) {
            return Err(GameError::TurnInProgress.into());
        }
        let running = RunningFlag(&self.turn_running);
        let executor = Arc::clone(&self.executor);
        let outcome = tokio::task::spawn_blocking(move || executor.execute_turn(&mut guard)).await;
        drop(running);

        let summary = outcome??;
        self.completed.send_replace(summary.turn);
        Ok(summary)
    }

    /// Serialized galaxy bytes.
    ///
    /// Refused while a turn is running.
    pub async fn snapshot(&self) -> Result<Vec<u8>> {
        if self.is_turn_running() {
            return Err(GameError::TurnInProgress.into());
        }
        let galaxy = self.galaxy.read().await;
        if galaxy.is_turn_in_progress() {
            return Err(GameError::TurnInProgress.into());
        }
        Ok(galaxy.serialize()?)
    }

    /// Write a snapshot to `dir/turn-<n>.bin`.
    pub async fn persist(&self, dir: &Path) -> Result<()> {
        let bytes = self.snapshot().await?;
        let turn = self.turn().await;
        let path = dir.join(format!("turn-{turn:06}.bin"));
        let written = path.clone();
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
            std::fs::write(&path, bytes)
        })
        .await??;
        tracing::info!(path = %written.display(), turn, "snapshot written");
        Ok(())
    }

    /// Give `fleet` a new order on behalf of `user`.
    pub async fn submit_order(&self, user: UserId, fleet: FleetId, kind: OrderKind) -> Result<()> {
        let mut galaxy = self.galaxy.write().await;
        if galaxy.fleet(fleet)?.owner != user {
            return Err(ServerError::NotOwner {
                user,
                what: format!("fleet {fleet:?}"),
            });
        }
        galaxy.set_order(fleet, Order::new(kind))?;
        tracing::debug!(?user, ?fleet, ?kind, "order accepted");
        Ok(())
    }

    /// Queue construction in a system owned by `user`.
    pub async fn enqueue_build(&self, user: UserId, system: GridPos, kind: BuildKind) -> Result<()> {
        let mut galaxy = self.galaxy.write().await;
        if galaxy.system(system)?.owner != user {
            return Err(ServerError::NotOwner {
                user,
                what: format!("system ({}, {})", system.x, system.y),
            });
        }
        galaxy.enqueue_build(system, kind)?;
        Ok(())
    }

    /// Select the field `user` researches next.
    pub async fn set_research_target(&self, user: UserId, field: TechField) -> Result<()> {
        let mut galaxy = self.galaxy.write().await;
        galaxy.user_mut(user)?.research_target = Some(field);
        Ok(())
    }

    /// Remove and return all report entries addressed to `user`.
    pub async fn drain_reports(&self, user: UserId) -> Result<Vec<ReportEntry>> {
        let mut galaxy = self.galaxy.write().await;
        Ok(galaxy.user_mut(user)?.drain_reports())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use stellar_core::config::EngineConfig;

    fn host() -> GameHost {
        let mut galaxy = Galaxy::new(4, 4, 1);
        galaxy.add_user("Ada", stellar_core::user::Faction::Terran);
        let executor = TurnExecutor::new(EngineConfig {
            worker_count: 2,
            ..EngineConfig::default()
        })
        .unwrap();
        GameHost::new(galaxy, executor)
    }

    #[tokio::test]
    async fn test_run_turn_notifies_subscribers() {
        let host = host();
        let mut turns = host.subscribe();
        let summary = host.run_turn().await.unwrap();
        assert_eq!(summary.turn, 1);
        turns.changed().await.unwrap();
        assert_eq!(*turns.borrow(), 1);
        assert!(!host.is_turn_running());
    }

    #[tokio::test]
    async fn test_snapshot_refused_while_flag_set() {
        let host = host();
        host.turn_running.store(true, Ordering::Release);
        let err = host.snapshot().await.unwrap_err();
        assert!(matches!(err, ServerError::Game(GameError::TurnInProgress)));
        assert!(matches!(
            host.run_turn().await.unwrap_err(),
            ServerError::Game(GameError::TurnInProgress)
        ));

        host.turn_running.store(false, Ordering::Release);
        let bytes = host.snapshot().await.unwrap();
        assert_eq!(Galaxy::deserialize(&bytes).unwrap().turn(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_turn_leaves_flag_clear() {
        let host = host();
        let held = Arc::clone(&host.galaxy).write_owned().await;
        let attempt = tokio::time::timeout(Duration::from_millis(20), host.run_turn()).await;
        assert!(attempt.is_err());
        assert!(!host.is_turn_running());

        drop(held);
        assert_eq!(host.run_turn().await.unwrap().turn, 1);
        assert!(!host.is_turn_running());
    }

    #[tokio::test]
    async fn test_research_target_is_set() {
        let host = host();
        let ada = UserId(1);
        host.set_research_target(ada, TechField::Energy).await.unwrap();
        let target = host.inspect(|g| g.user(ada).map(|u| u.research_target)).await.unwrap();
        assert_eq!(target, Some(TechField::Energy));
    }
}
