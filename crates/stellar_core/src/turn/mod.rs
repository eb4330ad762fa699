//! Turn execution.
//!
//! A turn runs in fixed phases:
//!
//! 1. **Parallel phase.** The system arena is split into row chunks, one
//!    [`SystemHandler`] per chunk, plus a single [`UserAndFleetHandler`]
//!    owning users and fleets. All of them run inside one scope on the
//!    executor's thread pool; the end of the scope is the barrier.
//! 2. **Merge.** Deferred outputs are applied in chunk order.
//! 3. **Orders.** Active fleets are shuffled and their orders stepped one at
//!    a time.
//! 4. **Visibility.** Sensor overlays are decayed and refreshed.
//! 5. **Combat.** Every contested system fights one battle.
//!
//! A failing or panicking phase-1 task is logged and its output dropped; the
//! turn still advances. An error while stepping orders or fighting aborts
//! the turn without advancing the counter.

pub mod chunk;
pub mod context;
pub mod fleet_handler;
pub mod system_handler;

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::combat;
use crate::config::EngineConfig;
use crate::error::{GameError, Result};
use crate::galaxy::{FleetId, Galaxy};
use crate::orders::{BuildKind, OrderStatus};
use crate::report::TurnReportItem;
use crate::rng::{lane_rng, FLEET_LANE, SEQUENTIAL_LANE, SYSTEM_LANE_BASE};
use crate::visibility;

use chunk::{partition_rows, split_chunks};
use context::TurnContext;
use fleet_handler::{FleetOutput, UserAndFleetHandler};
use system_handler::{SystemHandler, SystemOutput};

/// Outcome of one executed turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSummary {
    /// Turn number after the increment.
    pub turn: u64,
    /// Wall time spent.
    pub elapsed: Duration,
    /// Space battles fought.
    pub battles: u32,
    /// Orders stepped in the sequential phase.
    pub orders_executed: u32,
    /// Phase-1 tasks whose output was discarded.
    pub phase_one_failures: u32,
}

struct PhaseOne {
    systems: Vec<SystemOutput>,
    fleets: Option<FleetOutput>,
    failures: u32,
}

/// Runs turns against a [`Galaxy`].
///
/// The thread pool is built once and reused for every turn.
pub struct TurnExecutor {
    config: EngineConfig,
    pool: rayon::ThreadPool,
}

impl std::fmt::Debug for TurnExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnExecutor")
            .field("config", &self.config)
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl TurnExecutor {
    /// Validate `config` and build the worker pool.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count + 1)
            .thread_name(|i| format!("turn-worker-{i}"))
            .build()
            .map_err(|e| GameError::WorkerFailed(format!("failed to build thread pool: {e}")))?;
        Ok(Self { config, pool })
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute one turn.
    ///
    /// Returns [`GameError::TurnInProgress`] if the galaxy is already
    /// mid-turn. The in-progress flag is cleared on every other exit path.
    pub fn execute_turn(&self, galaxy: &mut Galaxy) -> Result<TurnSummary> {
        if galaxy.turn_in_progress {
            return Err(GameError::TurnInProgress);
        }
        let start = Instant::now();

        let result = {
            let mut marker = InProgress::begin(galaxy);
            self.run_phases(&mut *marker.galaxy)
        };
        let mut summary = result?;

        summary.elapsed = start.elapsed();
        galaxy.turn += 1;
        galaxy.last_turn_duration = summary.elapsed;
        summary.turn = galaxy.turn;

        #[cfg(debug_assertions)]
        {
            let hash = galaxy.state_hash();
            tracing::debug!(turn = galaxy.turn, state_hash = hash, "galaxy state hash");
        }

        tracing::info!(
            turn = summary.turn,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            battles = summary.battles,
            orders = summary.orders_executed,
            failures = summary.phase_one_failures,
            "turn complete"
        );
        Ok(summary)
    }

    fn run_phases(&self, galaxy: &mut Galaxy) -> Result<TurnSummary> {
        let turn = galaxy.turn();
        let ctx = TurnContext::capture(galaxy, &self.config);

        let phase_one = self.run_parallel(galaxy, &ctx);
        tracing::debug!(
            turn,
            chunks = phase_one.systems.len(),
            failures = phase_one.failures,
            "parallel phase joined"
        );

        let active = merge(galaxy, phase_one.systems, phase_one.fleets);

        let mut rng = lane_rng(galaxy.seed(), turn, SEQUENTIAL_LANE);
        let orders_executed = execute_orders(galaxy, active, &mut rng)?;
        tracing::debug!(turn, orders = orders_executed, "orders executed");

        visibility::refresh(galaxy);

        let battles = combat::resolve_battles(galaxy, self.config.max_battle_rounds, &mut rng)?;
        tracing::debug!(turn, battles, "combat resolved");

        #[cfg(feature = "debug-validation")]
        galaxy.check_invariants()?;

        Ok(TurnSummary {
            turn,
            elapsed: Duration::ZERO,
            battles,
            orders_executed,
            phase_one_failures: phase_one.failures,
        })
    }

    fn run_parallel(&self, galaxy: &mut Galaxy, ctx: &TurnContext) -> PhaseOne {
        let seed = galaxy.seed();
        let turn = galaxy.turn();
        let width = galaxy.width();
        let ranges = partition_rows(galaxy.height(), self.config.worker_count);
        let config = &self.config;

        let chunks = split_chunks(&mut galaxy.systems, width, &ranges);
        let users = &mut galaxy.users;
        let fleets = &mut galaxy.fleets;

        let mut system_slots: Vec<Option<SystemOutput>> = chunks.iter().map(|_| None).collect();
        let mut fleet_slot: Option<FleetOutput> = None;

        self.pool.scope(|scope| {
            for ((index, chunk), slot) in chunks.into_iter().enumerate().zip(system_slots.iter_mut()) {
                scope.spawn(move |_| {
                    let rng = lane_rng(seed, turn, SYSTEM_LANE_BASE + index as u64);
                    *slot = guarded("system handler", || SystemHandler::new(ctx, rng).run(chunk));
                });
            }

            let slot = &mut fleet_slot;
            scope.spawn(move |_| {
                let rng = lane_rng(seed, turn, FLEET_LANE);
                *slot = guarded("fleet handler", || {
                    UserAndFleetHandler::new(ctx, config, rng).run(users, fleets)
                });
            });
        });

        let failures = system_slots.iter().filter(|s| s.is_none()).count() as u32
            + u32::from(fleet_slot.is_none());
        PhaseOne {
            systems: system_slots.into_iter().flatten().collect(),
            fleets: fleet_slot,
            failures,
        }
    }
}

/// Run a phase-1 task, turning an error or a panic into a logged `None`.
fn guarded<T>(task: &'static str, f: impl FnOnce() -> Result<T>) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(output)) => Some(output),
        Ok(Err(e)) => {
            tracing::error!(task, error = %e, "phase-1 task failed, output discarded");
            None
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(task, panic = %message, "phase-1 task panicked, output discarded");
            None
        }
    }
}

/// Apply deferred phase-1 outputs. Returns the fleets with orders to step.
fn merge(galaxy: &mut Galaxy, systems: Vec<SystemOutput>, fleets: Option<FleetOutput>) -> Vec<FleetId> {
    let fleets = fleets.unwrap_or_default();

    for draw in &fleets.supply_draws {
        match galaxy.system_mut(draw.system) {
            Ok(system) => {
                system.add_deuterium(-i64::from(draw.deuterium));
                system.resources_left = system.resources_left.saturating_sub(draw.nebula);
            }
            Err(e) => tracing::warn!(error = %e, "supply draw for a missing system"),
        }
    }

    for (id, pos) in &fleets.removed_fleets {
        galaxy.detach_from_system(*id, *pos);
    }

    let mut completed = Vec::new();
    let mut reports = Vec::new();
    for output in systems {
        for penalty in output.research_penalties {
            let lost = match galaxy.user_mut(penalty.user) {
                Ok(user) => user.lose_research(penalty.amount),
                Err(e) => {
                    tracing::warn!(error = %e, "research penalty for a missing user");
                    continue;
                }
            };
            if lost > 0 {
                galaxy.push_report(
                    penalty.user,
                    TurnReportItem::ResearchLost {
                        system: penalty.system,
                        amount: lost,
                    },
                );
            }
        }
        reports.extend(output.reports);
        completed.extend(output.completed_ships);
    }

    for (user, item) in reports {
        galaxy.push_report(user, item);
    }

    for done in completed {
        let item = done.kind.label();
        let BuildKind::Ship {
            hull,
            components,
            name,
        } = done.kind
        else {
            continue;
        };
        let commissioned = galaxy
            .create_ship(done.owner, name, hull, components)
            .and_then(|ship| galaxy.commission_ship(done.system, ship));
        match commissioned {
            Ok(fleet) => {
                tracing::debug!(fleet = fleet.0, system = ?done.system, "ship commissioned");
                galaxy.push_report(
                    done.owner,
                    TurnReportItem::ConstructionComplete {
                        system: done.system,
                        item,
                    },
                );
            }
            Err(e) => tracing::warn!(error = %e, system = ?done.system, "completed ship dropped"),
        }
    }

    fleets.active_fleets
}

/// Step every active order once, in shuffled order.
/// Holds the galaxy's in-progress flag for the lifetime of a turn, including
/// an unwinding one.
struct InProgress<'a> {
    galaxy: &'a mut Galaxy,
}

impl<'a> InProgress<'a> {
    fn begin(galaxy: &'a mut Galaxy) -> Self {
        galaxy.turn_in_progress = true;
        Self { galaxy }
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.galaxy.turn_in_progress = false;
    }
}

fn execute_orders<R: Rng + ?Sized>(galaxy: &mut Galaxy, mut active: Vec<FleetId>, rng: &mut R) -> Result<u32> {
    active.shuffle(rng);
    let mut executed = 0;

    for id in active {
        let Some(mut order) = galaxy.fleets.get_mut(id).and_then(|f| f.order.take()) else {
            tracing::warn!(fleet = id.0, "active fleet has no order to step");
            continue;
        };

        let status = order.step(galaxy, id, rng);
        executed += 1;
        match status {
            Ok(OrderStatus::Completed) => {}
            Ok(_) => {
                if let Some(fleet) = galaxy.fleets.get_mut(id) {
                    fleet.order = Some(order);
                }
            }
            Err(e) => {
                if let Some(fleet) = galaxy.fleets.get_mut(id) {
                    fleet.order = Some(order);
                }
                return Err(e);
            }
        }
    }
    Ok(executed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galaxy::{GridPos, UserId};
    use crate::orders::{Order, OrderKind};
    use crate::ship::HullClass;
    use crate::system::SystemKind;
    use crate::user::Faction;

    fn executor() -> TurnExecutor {
        TurnExecutor::new(EngineConfig {
            worker_count: 2,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_turn_advances_and_clears_flag() {
        let mut galaxy = Galaxy::new(4, 4, 1);
        let summary = executor().execute_turn(&mut galaxy).unwrap();
        assert_eq!(summary.turn, 1);
        assert_eq!(galaxy.turn(), 1);
        assert!(!galaxy.is_turn_in_progress());
        assert_eq!(summary.phase_one_failures, 0);
    }

    #[test]
    fn test_rejects_overlapping_turn() {
        let mut galaxy = Galaxy::new(2, 2, 1);
        galaxy.turn_in_progress = true;
        let err = executor().execute_turn(&mut galaxy).unwrap_err();
        assert!(matches!(err, GameError::TurnInProgress));
        assert_eq!(galaxy.turn(), 0);
    }

    #[test]
    fn test_failed_chunk_is_discarded_and_turn_advances() {
        let mut galaxy = Galaxy::new(4, 4, 1);
        let system = galaxy.system_mut(GridPos::new(0, 3)).unwrap();
        system.owner = UserId(99);
        system.kind = SystemKind::Star;

        let summary = executor().execute_turn(&mut galaxy).unwrap();
        assert_eq!(summary.phase_one_failures, 1);
        assert_eq!(galaxy.turn(), 1);
    }

    #[test]
    fn test_unwinding_turn_clears_flag() {
        let mut galaxy = Galaxy::new(2, 2, 1);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let marker = InProgress::begin(&mut galaxy);
            assert!(marker.galaxy.is_turn_in_progress());
            panic!("sequential phase failed");
        }));
        assert!(result.is_err());
        assert!(!galaxy.is_turn_in_progress());
        assert_eq!(executor().execute_turn(&mut galaxy).unwrap().turn, 1);
    }

    #[test]
    fn test_guarded_catches_panics() {
        let result: Option<()> = guarded("test", || panic!("boom"));
        assert!(result.is_none());
        assert_eq!(guarded("test", || Ok(5)), Some(5));
    }

    #[test]
    fn test_move_order_runs_to_arrival() {
        let mut galaxy = Galaxy::new(6, 1, 3);
        let user = galaxy.add_user("Ada", Faction::Terran);
        let ship = galaxy.create_ship(user, "Scout", HullClass::Scout, vec![]).unwrap();
        let fleet = galaxy
            .spawn_fleet(user, "Recon", GridPos::new(0, 0), vec![ship])
            .unwrap();
        galaxy
            .set_order(
                fleet,
                Order::new(OrderKind::MoveTo {
                    destination: GridPos::new(3, 0),
                }),
            )
            .unwrap();

        let executor = executor();
        for _ in 0..3 {
            executor.execute_turn(&mut galaxy).unwrap();
        }
        let moved = galaxy.fleet(fleet).unwrap();
        assert_eq!(moved.position, GridPos::new(3, 0));
        assert!(moved.order.is_none());
        assert!(galaxy.system(GridPos::new(3, 0)).unwrap().fleets.contains(&fleet));
        assert!(!galaxy.system(GridPos::new(0, 0)).unwrap().fleets.contains(&fleet));
    }
}
