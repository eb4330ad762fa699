//! Balance testing utilities for headless combat runs.
//!
//! Runs many independent space battles between two ship lists, outside of
//! any galaxy, to compare designs. Each battle uses its own seeded stream so
//! a matchup is reproducible.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use stellar_core::combat::space::{BattleEnd, Combatant, SpaceBattle, SpaceCombatResolver};
use stellar_core::galaxy::{FleetId, GridPos, ShipId, UserId};
use stellar_core::user::TechLevels;

use crate::fixtures::ShipDesign;

/// Side A owner in balance runs.
pub const SIDE_A: UserId = UserId(1);

/// Side B owner in balance runs.
pub const SIDE_B: UserId = UserId(2);

/// One side of a matchup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Squadron {
    /// Ships fielded.
    pub designs: Vec<ShipDesign>,
    /// Technology applied to every ship.
    pub tech: TechLevels,
}

impl Squadron {
    /// A squadron at base technology.
    #[must_use]
    pub fn new(designs: Vec<ShipDesign>) -> Self {
        Self {
            designs,
            tech: TechLevels::default(),
        }
    }
}

/// Result of a simulated battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleResult {
    /// The winning side (None if both sides survive or both die).
    pub winner: Option<UserId>,
    /// Rounds fought.
    pub rounds: u32,
    /// Why the battle stopped.
    pub end: BattleEnd,
    /// Ships side A lost.
    pub lost_a: u32,
    /// Ships side B lost.
    pub lost_b: u32,
}

/// Statistics for a set of battles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleStats {
    /// Total battles run.
    pub total_battles: u32,
    /// Wins for side A.
    pub wins_a: u32,
    /// Wins for side B.
    pub wins_b: u32,
    /// Stalemates and mutual destruction.
    pub draws: u32,
    /// Average rounds to resolution.
    pub avg_rounds: f64,
}

impl BattleStats {
    /// Calculate win rate for side A (0.0 to 1.0).
    pub fn win_rate_a(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        self.wins_a as f64 / self.total_battles as f64
    }

    /// Calculate win rate for side B (0.0 to 1.0).
    pub fn win_rate_b(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        self.wins_b as f64 / self.total_battles as f64
    }

    /// Check if matchup is balanced (within acceptable range).
    pub fn is_balanced(&self, min_rate: f64, max_rate: f64) -> bool {
        let rate = self.win_rate_a();
        rate >= min_rate && rate <= max_rate
    }
}

fn enlist(battle: &mut SpaceBattle, squadron: &Squadron, owner: UserId, next_id: &mut u64) {
    let fleet = FleetId(u64::from(owner.0));
    for design in &squadron.designs {
        *next_id += 1;
        let ship = design.build(ShipId(*next_id), &squadron.tech);
        battle.add(Combatant::new(fleet, owner, ship, squadron.tech));
    }
}

/// Fight one battle between `a` and `b` with `seed`.
#[must_use]
pub fn run_battle(a: &Squadron, b: &Squadron, seed: u64, max_rounds: u32) -> BattleResult {
    let mut battle = SpaceBattle::new(GridPos::new(0, 0));
    let mut next_id = 0;
    enlist(&mut battle, a, SIDE_A, &mut next_id);
    enlist(&mut battle, b, SIDE_B, &mut next_id);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let summary = SpaceCombatResolver::new(max_rounds).resolve(&mut battle, &mut rng);

    let has = |owner: UserId| battle.combatants().iter().any(|c| c.owner == owner);
    let winner = match (has(SIDE_A), has(SIDE_B)) {
        (true, false) => Some(SIDE_A),
        (false, true) => Some(SIDE_B),
        _ => None,
    };
    BattleResult {
        winner,
        rounds: summary.rounds,
        end: summary.end,
        lost_a: battle.tally(SIDE_A).ships_lost,
        lost_b: battle.tally(SIDE_B).ships_lost,
    }
}

/// Fight `battles` independent battles, seeds `seed..seed + battles`.
#[must_use]
pub fn run_matchup(a: &Squadron, b: &Squadron, battles: u32, seed: u64, max_rounds: u32) -> BattleStats {
    let mut stats = BattleStats::default();
    let mut rounds = 0u64;
    for i in 0..battles {
        let result = run_battle(a, b, seed.wrapping_add(u64::from(i)), max_rounds);
        stats.total_battles += 1;
        rounds += u64::from(result.rounds);
        match result.winner {
            Some(SIDE_A) => stats.wins_a += 1,
            Some(_) => stats.wins_b += 1,
            None => stats.draws += 1,
        }
    }
    if stats.total_battles > 0 {
        stats.avg_rounds = rounds as f64 / f64::from(stats.total_battles);
    }
    tracing::debug!(
        battles,
        wins_a = stats.wins_a,
        wins_b = stats.wins_b,
        draws = stats.draws,
        "matchup complete"
    );
    stats
}
