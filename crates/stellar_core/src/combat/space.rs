//! Round-based ship-to-ship combat.
//!
//! A [`SpaceBattle`] holds copies of every ship present in one system. The
//! [`SpaceCombatResolver`] drives it to exhaustion: each round reshuffles
//! the roster and restores action points, then random ships with points
//! left fire at random enemies until nobody can act. The battle ends when a
//! single faction remains, after two consecutive rounds without a shot, or
//! at the round cap. [`SpaceBattle::apply`] writes the outcome back.

use std::collections::{BTreeMap, BTreeSet};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::combat::damage::{apply_hit, WeaponKind};
use crate::error::Result;
use crate::galaxy::{FleetId, Galaxy, GridPos, UserId};
use crate::report::{BattleReport, TurnReportItem};
use crate::ship::{Component, Ship, ShipStats, MAX_XP};
use crate::user::{TechField, TechLevels};

/// XP gained per hit.
pub const XP_PER_HIT: u32 = 1;

/// XP gained per kill.
pub const XP_PER_KILL: u32 = 10;

/// Hit rolls at or above this value hit.
pub const HIT_THRESHOLD: f64 = 100.0;

/// Damage multiplier of a critical hit.
pub const CRITICAL_MULTIPLIER: f64 = 1.5;

/// Rounds without a shot after which the battle is called off.
const IDLE_ROUNDS_LIMIT: u32 = 2;

/// One installed weapon and its remaining shots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponMount {
    /// Weapon family.
    pub kind: WeaponKind,
    /// Damage per shot before weapons tech.
    pub damage: f64,
    /// Shots left this battle.
    pub uses_left: u32,
}

/// A ship taking part in a battle.
#[derive(Debug, Clone, PartialEq)]
pub struct Combatant {
    /// Fleet the ship belongs to.
    pub fleet: FleetId,
    /// Owning user.
    pub owner: UserId,
    /// Working copy of the ship.
    pub ship: Ship,
    /// Owner's technology.
    pub tech: TechLevels,
    stats: ShipStats,
    weapons: Vec<WeaponMount>,
}

impl Combatant {
    /// Wrap a ship for battle.
    #[must_use]
    pub fn new(fleet: FleetId, owner: UserId, ship: Ship, tech: TechLevels) -> Self {
        let stats = ship.stats(&tech);
        let weapons = ship
            .components
            .iter()
            .filter_map(|c| match *c {
                Component::BeamEmitter { damage } => Some((WeaponKind::Beam, damage)),
                Component::TorpedoLauncher { damage, .. } => Some((WeaponKind::Torpedo, damage)),
                _ => None,
            })
            .map(|(kind, damage)| WeaponMount {
                kind,
                damage,
                uses_left: kind.uses_per_battle(),
            })
            .collect();
        Self {
            fleet,
            owner,
            ship,
            tech,
            stats,
            weapons,
        }
    }

    /// Derived stats of the ship.
    #[must_use]
    pub const fn stats(&self) -> &ShipStats {
        &self.stats
    }

    /// Weapons and their remaining shots.
    #[must_use]
    pub fn weapons(&self) -> &[WeaponMount] {
        &self.weapons
    }

    fn restore_action_points(&mut self) {
        self.ship.action_points = self.ship.round_action_points(&self.stats);
    }

    fn ready_mount(&self, kind: WeaponKind) -> Option<usize> {
        if self.ship.action_points < kind.action_cost() {
            return None;
        }
        self.weapons
            .iter()
            .position(|w| w.kind == kind && w.uses_left > 0)
    }

    /// Mount to fire: beams while the target's shields hold, torpedoes once
    /// they are down, falling back to whatever can still fire.
    fn choose_weapon(&self, target_shielded: bool) -> Option<usize> {
        let (preferred, fallback) = if target_shielded {
            (WeaponKind::Beam, WeaponKind::Torpedo)
        } else {
            (WeaponKind::Torpedo, WeaponKind::Beam)
        };
        self.ready_mount(preferred)
            .or_else(|| self.ready_mount(fallback))
    }
}

/// Per-user losses and kills.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BattleTally {
    /// Own ships destroyed.
    pub ships_lost: u32,
    /// Enemy ships destroyed.
    pub enemies_destroyed: u32,
}

/// All ships fighting in one system.
#[derive(Debug, Clone)]
pub struct SpaceBattle {
    system: GridPos,
    combatants: Vec<Combatant>,
    destroyed: Vec<Combatant>,
    round: u32,
    tallies: BTreeMap<UserId, BattleTally>,
}

impl SpaceBattle {
    /// Create an empty battle.
    #[must_use]
    pub fn new(system: GridPos) -> Self {
        Self {
            system,
            combatants: Vec::new(),
            destroyed: Vec::new(),
            round: 0,
            tallies: BTreeMap::new(),
        }
    }

    /// Collect every ship present at `pos`.
    ///
    /// Fleets whose owner no longer exists are skipped with a warning.
    pub fn gather(galaxy: &Galaxy, pos: GridPos) -> Result<Self> {
        let mut battle = Self::new(pos);
        for fleet_id in &galaxy.system(pos)?.fleets {
            let Some(fleet) = galaxy.fleets().get(*fleet_id) else {
                tracing::warn!(fleet = fleet_id.0, ?pos, "system lists a missing fleet");
                continue;
            };
            let Ok(owner) = galaxy.user(fleet.owner) else {
                tracing::warn!(
                    fleet = fleet_id.0,
                    owner = fleet.owner.0,
                    ?pos,
                    "fleet owner missing, left out of battle"
                );
                continue;
            };
            let tech = owner.tech;
            for ship in fleet.ships() {
                battle.add(Combatant::new(fleet.id, fleet.owner, ship.clone(), tech));
            }
        }
        Ok(battle)
    }

    /// Add a combatant.
    pub fn add(&mut self, combatant: Combatant) {
        self.tallies.entry(combatant.owner).or_default();
        self.combatants.push(combatant);
    }

    /// System the battle is fought in.
    #[must_use]
    pub const fn system(&self) -> GridPos {
        self.system
    }

    /// Ships still fighting.
    #[must_use]
    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    /// Ships destroyed so far.
    #[must_use]
    pub fn destroyed(&self) -> &[Combatant] {
        &self.destroyed
    }

    /// Rounds started so far.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Tally for `user`.
    #[must_use]
    pub fn tally(&self, user: UserId) -> BattleTally {
        self.tallies.get(&user).copied().unwrap_or_default()
    }

    /// Number of distinct owners still fighting.
    #[must_use]
    pub fn faction_count(&self) -> usize {
        self.combatants
            .iter()
            .map(|c| c.owner)
            .collect::<BTreeSet<_>>()
            .len()
    }

    fn next_round<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.round += 1;
        self.combatants.shuffle(rng);
        for combatant in &mut self.combatants {
            combatant.restore_action_points();
        }
    }

    fn destroy(&mut self, index: usize, killer: UserId) {
        let dead = self.combatants.remove(index);
        self.tallies.entry(dead.owner).or_default().ships_lost += 1;
        self.tallies.entry(killer).or_default().enemies_destroyed += 1;
        self.destroyed.push(dead);
    }

    /// One report per participating user.
    #[must_use]
    pub fn reports(&self) -> Vec<(UserId, BattleReport)> {
        self.tallies
            .iter()
            .map(|(user, tally)| {
                (
                    *user,
                    BattleReport {
                        system: self.system,
                        ships_lost: tally.ships_lost,
                        enemies_destroyed: tally.enemies_destroyed,
                        rounds: self.round,
                    },
                )
            })
            .collect()
    }

    /// Write survivors back, remove destroyed ships and deliver reports.
    pub fn apply(self, galaxy: &mut Galaxy) -> Result<()> {
        for (user, report) in self.reports() {
            galaxy.push_report(user, TurnReportItem::Battle(report));
        }

        for survivor in self.combatants {
            let Some(ship) = galaxy
                .fleets
                .get_mut(survivor.fleet)
                .and_then(|f| f.ship_mut(survivor.ship.id))
            else {
                tracing::warn!(
                    fleet = survivor.fleet.0,
                    ship = survivor.ship.id.0,
                    "surviving ship vanished during battle"
                );
                continue;
            };
            ship.hull = survivor.ship.hull;
            ship.armor = survivor.ship.armor;
            ship.shield = survivor.ship.shield;
            ship.xp = survivor.ship.xp;
            ship.action_points = 0;
            ship.clamp_to(&survivor.stats);
        }

        for dead in self.destroyed {
            if let Err(e) = galaxy.remove_ship(dead.fleet, dead.ship.id) {
                tracing::warn!(error = %e, "destroyed ship already gone");
            }
        }
        Ok(())
    }
}

/// Why a battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleEnd {
    /// Only one owner has ships left.
    OneFactionLeft,
    /// The attacker found no enemy to shoot at.
    NoTargets,
    /// Nobody fired for two consecutive rounds.
    Stalemate,
    /// The round cap was hit.
    RoundCap,
}

/// Outcome statistics of one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleSummary {
    /// Rounds fought.
    pub rounds: u32,
    /// Shots fired.
    pub shots: u32,
    /// Shots that hit.
    pub hits: u32,
    /// Why the battle ended.
    pub end: BattleEnd,
}

/// Drives a [`SpaceBattle`] to completion.
#[derive(Debug, Clone, Copy)]
pub struct SpaceCombatResolver {
    max_rounds: u32,
}

impl SpaceCombatResolver {
    /// Create a resolver that forcibly ends battles after `max_rounds`.
    #[must_use]
    pub const fn new(max_rounds: u32) -> Self {
        Self { max_rounds }
    }

    /// Fight until the battle ends.
    pub fn resolve<R: Rng + ?Sized>(&self, battle: &mut SpaceBattle, rng: &mut R) -> BattleSummary {
        let mut shots = 0;
        let mut hits = 0;
        let mut shots_this_round = 0;
        let mut idle_rounds = 0;
        battle.next_round(rng);

        let end = loop {
            if battle.faction_count() < 2 {
                break BattleEnd::OneFactionLeft;
            }

            let ready: Vec<usize> = (0..battle.combatants.len())
                .filter(|&i| battle.combatants[i].ship.action_points > 0)
                .collect();
            let Some(&attacker) = ready.choose(rng) else {
                if shots_this_round == 0 {
                    idle_rounds += 1;
                    if idle_rounds >= IDLE_ROUNDS_LIMIT {
                        break BattleEnd::Stalemate;
                    }
                } else {
                    idle_rounds = 0;
                }
                if battle.round >= self.max_rounds {
                    tracing::error!(
                        system = ?battle.system,
                        rounds = battle.round,
                        survivors = battle.combatants.len(),
                        "battle hit the round cap and was forcibly ended"
                    );
                    break BattleEnd::RoundCap;
                }
                battle.next_round(rng);
                shots_this_round = 0;
                continue;
            };

            let owner = battle.combatants[attacker].owner;
            let targets: Vec<usize> = (0..battle.combatants.len())
                .filter(|&i| battle.combatants[i].owner != owner)
                .collect();
            let Some(&target) = targets.choose(rng) else {
                break BattleEnd::NoTargets;
            };

            let shielded = battle.combatants[target].ship.shield > 0.0;
            let Some(mount) = battle.combatants[attacker].choose_weapon(shielded) else {
                battle.combatants[attacker].ship.action_points = 0;
                continue;
            };

            shots += 1;
            shots_this_round += 1;
            let shooter = &mut battle.combatants[attacker];
            let weapon = shooter.weapons[mount];
            shooter.weapons[mount].uses_left -= 1;
            shooter.ship.action_points -= weapon.kind.action_cost();
            let sensor = f64::from(shooter.stats.sensor_strength);
            let computer = f64::from(shooter.tech.get(TechField::Computer));
            let weapons_tech = f64::from(shooter.tech.get(TechField::Weapons));
            let xp = shooter.ship.xp;

            let victim = &battle.combatants[target];
            let roll = rng.gen_range(60.0..160.0)
                + f64::from(victim.stats.signature) / 10.0
                + sensor / 5.0
                + computer / 2.0
                - (f64::from(victim.stats.maneuverability) / 2.0).min(30.0);
            if roll < HIT_THRESHOLD {
                continue;
            }

            hits += 1;
            let mut damage = weapon.damage * (1.0 + weapons_tech * 0.1);
            if rng.gen_range(0..1000) < xp + 50 {
                damage *= CRITICAL_MULTIPLIER;
            }
            apply_hit(&mut battle.combatants[target].ship, weapon.kind, damage);

            let killed = battle.combatants[target].ship.is_destroyed();
            let shooter = &mut battle.combatants[attacker].ship;
            shooter.xp += XP_PER_HIT;
            if killed {
                shooter.xp += XP_PER_KILL;
            }
            shooter.xp = shooter.xp.min(MAX_XP);
            if killed {
                battle.destroy(target, owner);
            }
        };

        tracing::debug!(
            system = ?battle.system,
            rounds = battle.round,
            shots,
            hits,
            ?end,
            "battle resolved"
        );
        BattleSummary {
            rounds: battle.round,
            shots,
            hits,
            end,
        }
    }
}
