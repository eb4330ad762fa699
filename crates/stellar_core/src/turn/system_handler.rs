//! Phase-1 system processing.
//!
//! A [`SystemHandler`] runs the economy of every owned system in one
//! [`GridChunk`] and advances each build queue by one unit. It mutates only
//! the systems in its chunk. Anything that belongs to users (research
//! penalties, reports, new ships) is returned in a [`SystemOutput`] and
//! merged after the barrier.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::error::{GameError, Result};
use crate::galaxy::{GridPos, UserId};
use crate::orders::{BuildKind, OrderStatus};
use crate::report::TurnReportItem;
use crate::system::{PlanetKind, StarSystem, GAS_GIANT_DEUTERIUM};
use crate::turn::chunk::GridChunk;
use crate::turn::context::{TurnContext, UserFacts};

/// Research points a system's deficit costs its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResearchPenalty {
    /// Owner losing points.
    pub user: UserId,
    /// System whose deficit triggered the loss.
    pub system: GridPos,
    /// Points to remove.
    pub amount: i64,
}

/// A ship that left the slipway this turn.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedShip {
    /// Building system.
    pub system: GridPos,
    /// Owner at completion.
    pub owner: UserId,
    /// The finished build order.
    pub kind: BuildKind,
}

/// Deferred effects of one chunk.
#[derive(Debug, Default)]
pub struct SystemOutput {
    /// Research lost to deficits.
    pub research_penalties: Vec<ResearchPenalty>,
    /// Ships to put into service.
    pub completed_ships: Vec<CompletedShip>,
    /// Reports for system owners.
    pub reports: Vec<(UserId, TurnReportItem)>,
}

/// Economy and construction for one chunk of rows.
pub struct SystemHandler<'a> {
    ctx: &'a TurnContext,
    rng: ChaCha8Rng,
    output: SystemOutput,
}

/// Probability of a deficit penalty: 5% per point, at most 50%.
fn deficit_chance(deficit: i64) -> f64 {
    (deficit as f64 / 20.0).min(0.5)
}

impl<'a> SystemHandler<'a> {
    /// Create a handler drawing from its own random stream.
    #[must_use]
    pub fn new(ctx: &'a TurnContext, rng: ChaCha8Rng) -> Self {
        Self {
            ctx,
            rng,
            output: SystemOutput::default(),
        }
    }

    /// Process every owned system in `chunk`.
    ///
    /// Owners are checked before anything is touched, so an error leaves the
    /// chunk unchanged.
    pub fn run(mut self, mut chunk: GridChunk<'_>) -> Result<SystemOutput> {
        let systems = chunk.systems_mut();
        if let Some(system) = systems
            .iter()
            .find(|s| s.is_owned() && self.ctx.user(s.owner).is_none())
        {
            return Err(GameError::UnknownUser(system.owner));
        }

        for system in systems.iter_mut().filter(|s| s.is_owned()) {
            let facts = *self
                .ctx
                .user(system.owner)
                .ok_or(GameError::UnknownUser(system.owner))?;
            self.process(system, &facts);
        }

        tracing::debug!(
            rows = ?chunk.rows(),
            penalties = self.output.research_penalties.len(),
            ships = self.output.completed_ships.len(),
            "system chunk processed"
        );
        Ok(self.output)
    }

    fn report(&mut self, user: UserId, item: TurnReportItem) {
        self.output.reports.push((user, item));
    }

    fn roll(&mut self, chance: f64) -> bool {
        chance > 0.0 && self.rng.gen_bool(chance.min(1.0))
    }

    fn process(&mut self, system: &mut StarSystem, facts: &UserFacts) {
        let owner = system.owner;
        let pos = system.position;
        let economy = system.economy();

        if economy.food >= 0 {
            system.adjust_morale(1);
            for planet in system.planets.iter_mut().filter(|p| p.is_inhabited()) {
                planet.grow((planet.population() / 50).max(1));
            }
        } else {
            system.adjust_morale(-5);
            let population_lost: u32 = system
                .planets
                .iter_mut()
                .filter(|p| p.is_inhabited())
                .map(|p| p.shrink((p.population() / 20).max(1)))
                .sum();
            self.report(
                owner,
                TurnReportItem::Starvation {
                    system: pos,
                    population_lost,
                },
            );
        }

        if economy.power < 0 {
            system.adjust_morale(-2);
        }

        if economy.industry < 0 && self.roll(deficit_chance(-economy.industry)) {
            let amount = system.ore() / 10;
            if amount > 0 {
                system.add_ore(-i64::from(amount));
                self.report(owner, TurnReportItem::OreLost { system: pos, amount });
            }
        }

        if economy.research < 0 && self.roll(deficit_chance(-economy.research)) {
            self.output.research_penalties.push(ResearchPenalty {
                user: owner,
                system: pos,
                amount: -economy.research * 5,
            });
        }

        let gas_giants = system
            .planets
            .iter()
            .filter(|p| p.kind == PlanetKind::GasGiant)
            .count() as i64;
        system.add_deuterium(gas_giants * i64::from(GAS_GIANT_DEUTERIUM));
        if economy.ore > 0 {
            system.add_ore(economy.ore);
        }

        self.advance_queue(system, facts);
    }

    fn advance_queue(&mut self, system: &mut StarSystem, facts: &UserFacts) {
        let owner = system.owner;
        let pos = system.position;

        if let Some(head) = system.build_queue.front() {
            let delay_chance = self.ctx.upkeep_failure_chance(owner);
            if head.is_ship() && facts.deficit_ratio() > 0.0 && self.roll(delay_chance) {
                self.report(owner, TurnReportItem::ConstructionDelayed { system: pos });
            } else if let Some(head) = system.build_queue.front_mut() {
                if head.advance() == OrderStatus::Completed {
                    if let Some(done) = system.build_queue.pop_front() {
                        self.complete(system, done.kind);
                    }
                }
            }
        }

        let mut cumulative = 0;
        for order in &mut system.build_queue {
            cumulative += order.work_left();
            order.remaining_turns = cumulative;
        }
    }

    fn complete(&mut self, system: &mut StarSystem, kind: BuildKind) {
        let owner = system.owner;
        let pos = system.position;
        match kind {
            BuildKind::Structure { planet, slot, kind } => {
                match system.build_structure(planet, slot, kind) {
                    Ok(()) => self.report(
                        owner,
                        TurnReportItem::ConstructionComplete {
                            system: pos,
                            item: format!("{kind:?}"),
                        },
                    ),
                    Err(e) => {
                        tracing::debug!(error = %e, ?pos, "finished structure could not be placed");
                        self.report(
                            owner,
                            TurnReportItem::ConstructionFailed {
                                system: pos,
                                structure: kind,
                            },
                        );
                    }
                }
            }
            ship @ BuildKind::Ship { .. } => self.output.completed_ships.push(CompletedShip {
                system: pos,
                owner,
                kind: ship,
            }),
        }
    }
}
