//! Read-only facts captured before phase 1.
//!
//! The system handlers own disjoint slices of systems and the fleet handler
//! owns the users and fleets, so neither can look at the other's data while
//! they run. Everything one side needs from the other is copied here first.

use crate::config::EngineConfig;
use crate::galaxy::{user_index, Galaxy, GridPos, UserId};
use crate::system::{SystemEconomy, SystemKind};
use crate::user::{Faction, TechLevels};

/// Per-user facts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserFacts {
    /// Researched technology.
    pub tech: TechLevels,
    /// Faction.
    pub faction: Faction,
    /// Industry needed to maintain every ship.
    pub upkeep_cost: i64,
    /// Industry surplus across owned systems.
    pub upkeep_supply: i64,
    /// Research surplus across owned systems.
    pub research_income: i64,
}

impl UserFacts {
    /// Share of upkeep not covered by supply, in `[0, 1]`.
    #[must_use]
    pub fn deficit_ratio(&self) -> f64 {
        if self.upkeep_cost <= 0 || self.upkeep_supply >= self.upkeep_cost {
            return 0.0;
        }
        (self.upkeep_cost - self.upkeep_supply) as f64 / self.upkeep_cost as f64
    }
}

/// Per-system facts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemFacts {
    /// Owner at the start of the turn.
    pub owner: UserId,
    /// Terrain.
    pub kind: SystemKind,
    /// Economic balance.
    pub economy: SystemEconomy,
    /// Stored deuterium.
    pub deuterium: u32,
    /// Depletable pool.
    pub resources_left: u32,
    /// Whether an enabled shipyard exists.
    pub has_shipyard: bool,
}

/// Snapshot shared read-only by all phase-1 tasks.
#[derive(Debug, Clone)]
pub struct TurnContext {
    turn: u64,
    width: u32,
    max_failure_chance: f64,
    users: Vec<UserFacts>,
    systems: Vec<SystemFacts>,
}

impl TurnContext {
    /// Capture the facts of `galaxy`.
    #[must_use]
    pub fn capture(galaxy: &Galaxy, config: &EngineConfig) -> Self {
        let systems: Vec<SystemFacts> = galaxy
            .systems()
            .iter()
            .map(|s| SystemFacts {
                owner: s.owner,
                kind: s.kind,
                economy: s.economy(),
                deuterium: s.deuterium(),
                resources_left: s.resources_left,
                has_shipyard: s.has_shipyard(),
            })
            .collect();

        let mut users: Vec<UserFacts> = galaxy
            .users()
            .iter()
            .map(|u| UserFacts {
                tech: u.tech,
                faction: u.faction,
                upkeep_cost: 0,
                upkeep_supply: 0,
                research_income: 0,
            })
            .collect();

        for system in &systems {
            if let Some(i) = user_index(galaxy.users(), system.owner) {
                users[i].upkeep_supply += system.economy.industry.max(0);
                users[i].research_income += system.economy.research.max(0);
            }
        }
        for fleet in galaxy.fleets().iter() {
            if let Some(i) = user_index(galaxy.users(), fleet.owner) {
                users[i].upkeep_cost += fleet
                    .ships()
                    .iter()
                    .map(|s| s.hull_class.upkeep())
                    .sum::<i64>();
            }
        }

        Self {
            turn: galaxy.turn(),
            width: galaxy.width(),
            max_failure_chance: config.max_upkeep_failure_chance,
            users,
            systems,
        }
    }

    /// Turn being executed.
    #[must_use]
    pub const fn turn(&self) -> u64 {
        self.turn
    }

    /// Facts for `user`.
    #[must_use]
    pub fn user(&self, user: UserId) -> Option<&UserFacts> {
        let index = (user.0 as usize).checked_sub(1)?;
        self.users.get(index)
    }

    /// Facts for the system at `pos`.
    #[must_use]
    pub fn system(&self, pos: GridPos) -> Option<&SystemFacts> {
        if pos.x >= self.width {
            return None;
        }
        self.systems
            .get(pos.y as usize * self.width as usize + pos.x as usize)
    }

    /// Chance that one upkeep-gated action fails for `user`.
    #[must_use]
    pub fn upkeep_failure_chance(&self, user: UserId) -> f64 {
        self.user(user)
            .map_or(0.0, |u| u.deficit_ratio().min(self.max_failure_chance))
    }
}
