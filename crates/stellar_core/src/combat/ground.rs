//! Ground combat for invasions.
//!
//! A ground battle is a troop-attrition duel. Each round both sides roll
//! `uniform[0, 6)` plus their strength; the lower total loses one trooper and
//! ties go to the defender. Every round removes exactly one trooper, so a
//! battle between `a` and `d` troops lasts at most `a + d - 1` rounds.
//!
//! [`GroundCombat::simulate`] runs independent resolutions against a
//! caller-supplied RNG for odds previews and never touches the galaxy;
//! [`invade`] applies one resolution to a real fleet and system.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::galaxy::{FleetId, Galaxy};
use crate::report::TurnReportItem;
use crate::user::{TechField, TechLevels};

/// Morale of a system right after it changes hands.
pub const CONQUERED_MORALE: i64 = 25;

/// Strength of invading troops.
#[must_use]
pub fn attacker_strength(weapons_tech: u32) -> f64 {
    1.0 + f64::from(weapons_tech) / 10.0 * 1.4
}

/// Strength of defending troops.
#[must_use]
pub fn defender_strength(weapons_tech: u32, morale: u32, defense_rating: u32, construction_tech: u32) -> f64 {
    1.0 + f64::from(weapons_tech) / 10.0 * (f64::from(morale) / 50.0)
        + (f64::from(defense_rating) * 2.5 + f64::from(construction_tech) * 1.6) / 50.0
}

/// One side of a ground battle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundForces {
    /// Troops committed.
    pub troops: u32,
    /// Per-round bonus added to the die roll.
    pub strength: f64,
}

/// Result of a single resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundOutcome {
    /// Whether the attacker won.
    pub attacker_won: bool,
    /// Attacker troops lost.
    pub attacker_losses: u32,
    /// Defender troops lost.
    pub defender_losses: u32,
    /// Rounds fought.
    pub rounds: u32,
}

impl GroundOutcome {
    /// Attacker troops left standing.
    #[must_use]
    pub const fn attacker_remaining(&self, committed: u32) -> u32 {
        committed.saturating_sub(self.attacker_losses)
    }
}

/// State machine of one ground battle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroundBattle {
    /// Both sides still have troops.
    Skirmish {
        /// Attacker troops left.
        attacker: u32,
        /// Defender troops left.
        defender: u32,
        /// Rounds fought so far.
        rounds: u32,
    },
    /// One side is out of troops.
    WinnerDetermined(GroundOutcome),
}

/// Odds preview from repeated resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InvasionForecast {
    /// Resolutions run.
    pub runs: u32,
    /// Resolutions the attacker won.
    pub attacker_wins: u32,
    /// Mean attacker losses.
    pub avg_attacker_losses: f64,
    /// Mean defender losses.
    pub avg_defender_losses: f64,
}

impl InvasionForecast {
    /// Fraction of runs the attacker won.
    #[must_use]
    pub fn win_rate(&self) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        f64::from(self.attacker_wins) / f64::from(self.runs)
    }
}

/// Ground combat between two forces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundCombat {
    /// Invading side.
    pub attacker: GroundForces,
    /// Defending side.
    pub defender: GroundForces,
}

impl GroundCombat {
    /// Create a ground battle setup.
    #[must_use]
    pub const fn new(attacker: GroundForces, defender: GroundForces) -> Self {
        Self { attacker, defender }
    }

    fn start(&self) -> GroundBattle {
        self.settle(self.attacker.troops, self.defender.troops, 0)
    }

    fn settle(&self, attacker: u32, defender: u32, rounds: u32) -> GroundBattle {
        if attacker == 0 || defender == 0 {
            GroundBattle::WinnerDetermined(GroundOutcome {
                attacker_won: attacker > 0,
                attacker_losses: self.attacker.troops - attacker,
                defender_losses: self.defender.troops - defender,
                rounds,
            })
        } else {
            GroundBattle::Skirmish {
                attacker,
                defender,
                rounds,
            }
        }
    }

    /// Fight one round.
    pub fn step<R: Rng + ?Sized>(&self, battle: GroundBattle, rng: &mut R) -> GroundBattle {
        match battle {
            GroundBattle::Skirmish {
                attacker,
                defender,
                rounds,
            } => {
                let attack = rng.gen_range(0.0..6.0) + self.attacker.strength;
                let defend = rng.gen_range(0.0..6.0) + self.defender.strength;
                if attack > defend {
                    self.settle(attacker, defender - 1, rounds + 1)
                } else {
                    self.settle(attacker - 1, defender, rounds + 1)
                }
            }
            done @ GroundBattle::WinnerDetermined(_) => done,
        }
    }

    /// Fight to the end.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> GroundOutcome {
        let mut battle = self.start();
        loop {
            match battle {
                GroundBattle::WinnerDetermined(outcome) => return outcome,
                GroundBattle::Skirmish { .. } => battle = self.step(battle, rng),
            }
        }
    }

    /// Run `runs` independent resolutions.
    pub fn simulate<R: Rng + ?Sized>(&self, runs: u32, rng: &mut R) -> InvasionForecast {
        let mut wins = 0;
        let mut attacker_losses = 0u64;
        let mut defender_losses = 0u64;
        for _ in 0..runs {
            let outcome = self.resolve(rng);
            wins += u32::from(outcome.attacker_won);
            attacker_losses += u64::from(outcome.attacker_losses);
            defender_losses += u64::from(outcome.defender_losses);
        }
        let runs_f = f64::from(runs.max(1));
        InvasionForecast {
            runs,
            attacker_wins: wins,
            avg_attacker_losses: attacker_losses as f64 / runs_f,
            avg_defender_losses: defender_losses as f64 / runs_f,
        }
    }
}

/// Build the ground battle a fleet would fight against its current system.
pub fn setup(galaxy: &Galaxy, fleet_id: FleetId) -> Result<GroundCombat> {
    let fleet = galaxy.fleet(fleet_id)?;
    let system = galaxy.system(fleet.position)?;
    let attacker_tech = galaxy.user(fleet.owner)?.tech;
    let defender_tech = galaxy
        .user(system.owner)
        .map(|u| u.tech)
        .unwrap_or_else(|_| TechLevels::default());

    Ok(GroundCombat::new(
        GroundForces {
            troops: fleet.troops(),
            strength: attacker_strength(attacker_tech.get(TechField::Weapons)),
        },
        GroundForces {
            troops: system.troops(),
            strength: defender_strength(
                defender_tech.get(TechField::Weapons),
                system.morale(),
                system.defense_rating(),
                defender_tech.get(TechField::Construction),
            ),
        },
    ))
}

/// Land a fleet's troops on its current system and apply the result.
///
/// After a victory the survivors garrison the system up to its troop
/// capacity; the rest stay aboard.
pub fn invade<R: Rng + ?Sized>(galaxy: &mut Galaxy, fleet_id: FleetId, rng: &mut R) -> Result<GroundOutcome> {
    let combat = setup(galaxy, fleet_id)?;
    let outcome = combat.resolve(rng);

    let fleet = galaxy.fleet_mut(fleet_id)?;
    let attacker = fleet.owner;
    let pos = fleet.position;
    fleet.remove_troops(outcome.attacker_losses);

    let defender = galaxy.system(pos)?.owner;
    galaxy
        .system_mut(pos)?
        .add_troops(-i64::from(outcome.defender_losses));

    if outcome.attacker_won {
        let capacity = galaxy.system(pos)?.troop_capacity();
        let landing = outcome.attacker_remaining(combat.attacker.troops).min(capacity);
        let survivors = galaxy.fleet_mut(fleet_id)?.remove_troops(landing);
        galaxy.set_system_owner(pos, attacker)?;
        let system = galaxy.system_mut(pos)?;
        system.set_troops(i64::from(survivors));
        system.set_morale(CONQUERED_MORALE);
    }

    tracing::debug!(
        fleet = fleet_id.0,
        attacker_won = outcome.attacker_won,
        rounds = outcome.rounds,
        "invasion resolved"
    );

    let report = TurnReportItem::Invasion {
        system: pos,
        attacker,
        defender,
        attacker_won: outcome.attacker_won,
        attacker_losses: outcome.attacker_losses,
        defender_losses: outcome.defender_losses,
    };
    galaxy.push_report(defender, report.clone());
    galaxy.push_report(attacker, report);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn combat(a: u32, sa: f64, d: u32, sd: f64) -> GroundCombat {
        GroundCombat::new(
            GroundForces {
                troops: a,
                strength: sa,
            },
            GroundForces {
                troops: d,
                strength: sd,
            },
        )
    }

    #[test]
    fn test_strength_formulas() {
        assert!((attacker_strength(10) - 2.4).abs() < 1e-9);
        // 1 + 1 * (50 / 50) + (2 * 2.5 + 0) / 50
        assert!((defender_strength(10, 50, 2, 0) - 2.1).abs() < 1e-9);
        assert!((defender_strength(0, 100, 0, 0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_side_loses_immediately() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = combat(0, 5.0, 10, 1.0).resolve(&mut rng);
        assert!(!outcome.attacker_won);
        assert_eq!(outcome.rounds, 0);

        let outcome = combat(3, 1.0, 0, 5.0).resolve(&mut rng);
        assert!(outcome.attacker_won);
        assert_eq!(outcome.attacker_losses, 0);
    }

    #[test]
    fn test_losses_equal_rounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        for _ in 0..50 {
            let outcome = combat(12, 1.5, 9, 1.2).resolve(&mut rng);
            assert_eq!(outcome.attacker_losses + outcome.defender_losses, outcome.rounds);
            if outcome.attacker_won {
                assert_eq!(outcome.defender_losses, 9);
            } else {
                assert_eq!(outcome.attacker_losses, 12);
            }
        }
    }

    #[test]
    fn test_ties_go_to_defender() {
        // With a 6 point edge the defender can never lose a round.
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let outcome = combat(5, 0.0, 1, 6.0).resolve(&mut rng);
        assert!(!outcome.attacker_won);
        assert_eq!(outcome.defender_losses, 0);
    }

    /// Chance the attacker's `uniform[0, 6) + sa` beats `uniform[0, 6) + sd`.
    fn round_odds(sa: f64, sd: f64) -> f64 {
        // The difference of two uniforms is triangular on (-6, 6).
        let c = sd - sa;
        if c >= 6.0 {
            0.0
        } else if c >= 0.0 {
            (6.0 - c).powi(2) / 72.0
        } else if c > -6.0 {
            1.0 - (6.0 + c).powi(2) / 72.0
        } else {
            1.0
        }
    }

    /// Exact attacker win probability over all round sequences.
    fn exact_win_rate(a: u32, sa: f64, d: u32, sd: f64) -> f64 {
        let p = round_odds(sa, sd);
        let (a, d) = (a as usize, d as usize);
        // wins[i][j]: attacker wins holding i troops against j defenders.
        let mut wins = vec![vec![0.0; d + 1]; a + 1];
        for row in wins.iter_mut().skip(1) {
            row[0] = 1.0;
        }
        for i in 1..=a {
            for j in 1..=d {
                wins[i][j] = p * wins[i][j - 1] + (1.0 - p) * wins[i - 1][j];
            }
        }
        wins[a][d]
    }

    #[test]
    fn test_forecast_converges_to_exact_odds() {
        let cases = [
            (10, 3.0, 10, 1.0),
            (5, 1.0, 5, 1.0),
            (8, 1.0, 12, 2.5),
            (15, 2.0, 10, 2.4),
            (3, 1.0, 1, 1.5),
            (20, 1.4, 20, 2.1),
        ];
        let mut rng = ChaCha8Rng::seed_from_u64(77);
        for (a, sa, d, sd) in cases {
            let expected = exact_win_rate(a, sa, d, sd);
            let observed = combat(a, sa, d, sd).simulate(10_000, &mut rng).win_rate();
            assert!(
                (observed - expected).abs() < 0.02,
                "{a}@{sa} vs {d}@{sd}: observed {observed}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_exact_odds_edges() {
        assert!((round_odds(1.0, 1.0) - 0.5).abs() < 1e-12);
        assert_eq!(round_odds(0.0, 6.0), 0.0);
        assert!((exact_win_rate(1, 1.0, 1, 1.0) - 0.5).abs() < 1e-12);
        assert_eq!(exact_win_rate(0, 9.0, 3, 0.0), 0.0);
        assert_eq!(exact_win_rate(3, 0.0, 0, 9.0), 1.0);
    }

    #[test]
    fn test_simulate_is_pure_and_favours_strength() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let forecast = combat(10, 3.0, 10, 1.0).simulate(1_000, &mut rng);
        assert_eq!(forecast.runs, 1_000);
        assert!(forecast.win_rate() > 0.9);
    }
}
