//! Game metrics collection for balance analysis.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stellar_core::galaxy::{Galaxy, UserId};
use stellar_core::report::{ReportEntry, TurnReportItem};
use stellar_core::turn::TurnSummary;
use stellar_core::user::{TechField, User};

/// Report counts for one empire, folded in as its queue is drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportTally {
    /// Space battles fought.
    pub battles: u32,
    /// Own ships destroyed in battle.
    pub ships_lost: u32,
    /// Enemy ships destroyed in battle.
    pub enemies_destroyed: u32,
    /// Invasions won as the attacker.
    pub systems_captured: u32,
    /// Technologies granted.
    pub technologies: u32,
}

impl ReportTally {
    /// Count `entries` received by `user`.
    pub fn absorb(&mut self, user: UserId, entries: &[ReportEntry]) {
        for entry in entries {
            match &entry.item {
                TurnReportItem::Battle(report) => {
                    self.battles += 1;
                    self.ships_lost += report.ships_lost;
                    self.enemies_destroyed += report.enemies_destroyed;
                }
                TurnReportItem::Invasion {
                    attacker,
                    attacker_won: true,
                    ..
                } if *attacker == user => self.systems_captured += 1,
                TurnReportItem::TechnologyGranted { .. } => self.technologies += 1,
                _ => {}
            }
        }
    }
}

/// End-of-game figures for one empire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmpireMetrics {
    /// Empire name.
    pub name: String,
    /// Systems owned.
    pub systems: u32,
    /// Fleets owned.
    pub fleets: u32,
    /// Ships across all fleets.
    pub ships: u32,
    /// Sum of all technology levels.
    pub tech_total: u32,
    /// Unspent research points.
    pub research_points: i64,
    /// Space battles fought.
    pub battles: u32,
    /// Own ships destroyed in battle.
    pub ships_lost: u32,
    /// Enemy ships destroyed in battle.
    pub enemies_destroyed: u32,
    /// Invasions won as the attacker.
    pub systems_captured: u32,
    /// Technologies granted.
    pub technologies: u32,
}

impl EmpireMetrics {
    /// Fold the user's state, its already drained reports and any still
    /// pending ones into metrics.
    #[must_use]
    pub fn observe(user: &User, galaxy: &Galaxy, drained: ReportTally) -> Self {
        let ships = user
            .fleets
            .iter()
            .filter_map(|id| galaxy.fleet(*id).ok())
            .map(|f| f.ships().len() as u32)
            .sum();
        let mut reports = drained;
        reports.absorb(user.id, user.reports());
        Self {
            name: user.name.clone(),
            systems: user.systems.len() as u32,
            fleets: user.fleets.len() as u32,
            ships,
            tech_total: TechField::ALL.iter().map(|f| user.tech.get(*f)).sum(),
            research_points: user.research_points,
            battles: reports.battles,
            ships_lost: reports.ships_lost,
            enemies_destroyed: reports.enemies_destroyed,
            systems_captured: reports.systems_captured,
            technologies: reports.technologies,
        }
    }

    /// Whether the empire still holds anything.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.systems > 0 || self.ships > 0
    }
}

/// Complete metrics for a single game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Scenario name.
    pub scenario: String,
    /// Random seed used.
    pub seed: u64,
    /// Turns executed.
    pub turns: u64,
    /// Space battles across all turns.
    pub battles: u32,
    /// Orders stepped across all turns.
    pub orders_executed: u32,
    /// Parallel-phase tasks that failed.
    pub phase_one_failures: u32,
    /// Summed turn wall time in milliseconds.
    pub turn_ms_total: u64,
    /// The only empire left holding anything, if exactly one is.
    pub winner: Option<String>,
    /// Per-empire figures.
    pub empires: Vec<EmpireMetrics>,
    /// Final galaxy state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl GameMetrics {
    /// Create a new game metrics instance.
    #[must_use]
    pub fn new(scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            scenario: scenario.into(),
            seed,
            ..Default::default()
        }
    }

    /// Accumulate one turn.
    pub fn record_turn(&mut self, summary: &TurnSummary) {
        self.turns = summary.turn;
        self.battles += summary.battles;
        self.orders_executed += summary.orders_executed;
        self.phase_one_failures += summary.phase_one_failures;
        self.turn_ms_total += summary.elapsed.as_millis() as u64;
    }

    /// Record the final galaxy along with the report counts drained during play.
    pub fn finalize(&mut self, galaxy: &Galaxy, drained: &BTreeMap<UserId, ReportTally>) {
        self.empires = galaxy
            .users()
            .iter()
            .map(|u| {
                let tally = drained.get(&u.id).copied().unwrap_or_default();
                EmpireMetrics::observe(u, galaxy, tally)
            })
            .collect();
        let mut alive = self.empires.iter().filter(|e| e.is_alive());
        self.winner = match (alive.next(), alive.next()) {
            (Some(only), None) if self.empires.len() > 1 => Some(only.name.clone()),
            _ => None,
        };
        self.turns = galaxy.turn();
        self.final_state_hash = galaxy.state_hash();
    }
}

/// Aggregate over a batch of games.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Games that finished.
    pub games: u32,
    /// Wins per empire name.
    pub wins: BTreeMap<String, u32>,
    /// Games with no single survivor.
    pub draws: u32,
    /// Mean battles per game.
    pub avg_battles: f64,
    /// Mean turn wall time in milliseconds.
    pub avg_turn_ms: f64,
    /// Parallel-phase failures across all games.
    pub phase_one_failures: u32,
}

impl BatchSummary {
    /// Summarize finished games.
    #[must_use]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        let mut summary = Self {
            games: games.len() as u32,
            ..Self::default()
        };
        let mut battles = 0u64;
        let mut turn_ms = 0u64;
        let mut turns = 0u64;
        for game in games {
            match &game.winner {
                Some(name) => *summary.wins.entry(name.clone()).or_default() += 1,
                None => summary.draws += 1,
            }
            battles += u64::from(game.battles);
            turn_ms += game.turn_ms_total;
            turns += game.turns;
            summary.phase_one_failures += game.phase_one_failures;
        }
        if !games.is_empty() {
            summary.avg_battles = battles as f64 / games.len() as f64;
        }
        if turns > 0 {
            summary.avg_turn_ms = turn_ms as f64 / turns as f64;
        }
        summary
    }

    /// Win rate for `empire` (0.0 to 1.0).
    #[must_use]
    pub fn win_rate(&self, empire: &str) -> f64 {
        if self.games == 0 {
            return 0.0;
        }
        f64::from(self.wins.get(empire).copied().unwrap_or(0)) / f64::from(self.games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(winner: Option<&str>, battles: u32) -> GameMetrics {
        GameMetrics {
            winner: winner.map(str::to_string),
            battles,
            turns: 10,
            turn_ms_total: 20,
            ..GameMetrics::default()
        }
    }

    #[test]
    fn test_batch_summary_counts_wins_and_draws() {
        let games = [game(Some("A"), 2), game(Some("A"), 0), game(None, 1), game(Some("B"), 1)];
        let summary = BatchSummary::from_games(&games);
        assert_eq!(summary.games, 4);
        assert_eq!(summary.wins["A"], 2);
        assert_eq!(summary.draws, 1);
        assert!((summary.win_rate("A") - 0.5).abs() < 1e-9);
        assert!((summary.avg_battles - 1.0).abs() < 1e-9);
        assert!((summary.avg_turn_ms - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_batch_summary() {
        let summary = BatchSummary::from_games(&[]);
        assert_eq!(summary.games, 0);
        assert_eq!(summary.win_rate("A"), 0.0);
    }
}
