//! Host and scheduler integration tests.

use std::time::Duration;

use stellar_core::prelude::*;
use stellar_server::{scheduler, GameHost, Schedule, ServerError};
use stellar_test_utils::fixtures::two_empires;

fn host() -> (GameHost, Vec<UserId>) {
    let (galaxy, users) = two_empires(5).unwrap();
    let executor = TurnExecutor::new(EngineConfig {
        worker_count: 2,
        ..EngineConfig::default()
    })
    .unwrap();
    (GameHost::new(galaxy, executor), users)
}

async fn first_fleet(host: &GameHost, user: UserId) -> FleetId {
    host.inspect(|g| g.user(user).map(|u| u.fleets[0])).await.unwrap()
}

// ============================================================================
// Commands
// ============================================================================

mod commands {
    use super::*;

    #[tokio::test]
    async fn test_order_for_own_fleet_is_attached() {
        let (host, users) = host();
        let fleet = first_fleet(&host, users[0]).await;
        host.submit_order(
            users[0],
            fleet,
            OrderKind::MoveTo {
                destination: GridPos::new(3, 1),
            },
        )
        .await
        .unwrap();

        let order = host.inspect(|g| g.fleet(fleet).map(|f| f.order)).await.unwrap();
        assert!(order.is_some());
    }

    #[tokio::test]
    async fn test_order_for_foreign_fleet_is_refused() {
        let (host, users) = host();
        let fleet = first_fleet(&host, users[1]).await;
        let err = host.submit_order(users[0], fleet, OrderKind::Mine).await.unwrap_err();
        assert!(matches!(err, ServerError::NotOwner { .. }));
    }

    #[tokio::test]
    async fn test_invalid_order_surfaces_engine_error() {
        let (host, users) = host();
        let fleet = first_fleet(&host, users[0]).await;
        // A battle line carries no mining lasers.
        let err = host.submit_order(users[0], fleet, OrderKind::Mine).await.unwrap_err();
        assert!(matches!(err, ServerError::Game(GameError::InvalidOrder(_))));
    }

    #[tokio::test]
    async fn test_build_in_foreign_system_is_refused() {
        let (host, users) = host();
        let err = host
            .enqueue_build(
                users[0],
                GridPos::new(8, 8),
                BuildKind::Structure {
                    planet: 0,
                    slot: 9,
                    kind: StructureKind::Mine,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotOwner { .. }));
    }

    #[tokio::test]
    async fn test_drain_reports_empties_the_queue() {
        let (host, users) = host();
        host.run_turn().await.unwrap();
        host.drain_reports(users[0]).await.unwrap();
        assert!(host.drain_reports(users[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commands_serialize_with_turns() {
        let (host, users) = host();
        let fleet = first_fleet(&host, users[0]).await;

        let turn = tokio::spawn({
            let host = host.clone();
            async move { host.run_turn().await }
        });
        host.submit_order(
            users[0],
            fleet,
            OrderKind::MoveTo {
                destination: GridPos::new(2, 2),
            },
        )
        .await
        .unwrap();
        turn.await.unwrap().unwrap();

        assert_eq!(host.turn().await, 1);
        host.inspect(|g| g.check_invariants()).await.unwrap();
    }
}

// ============================================================================
// Scheduler
// ============================================================================

mod schedule {
    use super::*;

    #[tokio::test]
    async fn test_scheduler_runs_turns_until_shutdown() {
        let (host, _) = host();
        let mut turns = host.subscribe();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

        let schedule = Schedule {
            interval: Duration::from_millis(10),
            snapshot_every: 0,
            snapshot_dir: None,
        };
        let task = tokio::spawn(scheduler::run(host.clone(), schedule, async move {
            let _ = stopped.await;
        }));

        while *turns.borrow_and_update() < 3 {
            turns.changed().await.unwrap();
        }
        stop.send(()).unwrap();

        let completed = task.await.unwrap().unwrap();
        assert!(completed >= 3);
        assert_eq!(host.turn().await, completed);
    }

    #[tokio::test]
    async fn test_scheduler_writes_snapshots_on_cadence() {
        let (host, _) = host();
        let dir = tempfile::tempdir().unwrap();
        let mut turns = host.subscribe();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();

        let schedule = Schedule {
            interval: Duration::from_millis(10),
            snapshot_every: 2,
            snapshot_dir: Some(dir.path().to_path_buf()),
        };
        let task = tokio::spawn(scheduler::run(host.clone(), schedule, async move {
            let _ = stopped.await;
        }));

        while *turns.borrow_and_update() < 4 {
            turns.changed().await.unwrap();
        }
        stop.send(()).unwrap();
        task.await.unwrap().unwrap();

        let snapshot = dir.path().join("turn-000002.bin");
        let galaxy = Galaxy::deserialize(&std::fs::read(snapshot).unwrap()).unwrap();
        assert_eq!(galaxy.turn(), 2);
    }
}
