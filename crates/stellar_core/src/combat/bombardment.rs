//! Orbital bombardment.
//!
//! Every torpedo launcher in the attacking fleet fires once at a random
//! inhabited planet. Bunkers on that planet soak population and troop
//! casualties; each shot may also wreck a random structure. System morale
//! drops once after all launchers have fired.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Result;
use crate::galaxy::{FleetId, Galaxy};
use crate::report::TurnReportItem;
use crate::system::{StarSystem, StructureKind};
use crate::user::TechField;

/// A torpedo launcher as seen by the bombardment resolver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Launcher {
    /// Damage per shot after weapons tech.
    pub damage: f64,
    /// Chance per shot to destroy a structure.
    pub structure_hit_chance: f64,
}

/// Everything one bombardment did to a system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BombardmentOutcome {
    /// Launchers that fired.
    pub launchers: u32,
    /// Population killed, merged per planet index in first-hit order.
    pub population_killed: Vec<(usize, u32)>,
    /// Garrison troops killed.
    pub troops_killed: u32,
    /// Structures destroyed as `(planet, kind)`.
    pub structures_destroyed: Vec<(usize, StructureKind)>,
    /// Morale lost.
    pub morale_lost: u32,
}

impl BombardmentOutcome {
    /// Total population killed.
    #[must_use]
    pub fn total_population_killed(&self) -> u32 {
        self.population_killed.iter().map(|(_, n)| n).sum()
    }

    fn record_population(&mut self, planet: usize, killed: u32) {
        match self.population_killed.iter_mut().find(|(p, _)| *p == planet) {
            Some((_, total)) => *total += killed,
            None => self.population_killed.push((planet, killed)),
        }
    }
}

/// Morale lost after `launchers` shots.
#[must_use]
pub fn morale_loss(launchers: u32) -> u32 {
    (5.0 + f64::from(launchers) * 0.85).max(2.0) as u32
}

/// Fire every launcher at `system`.
pub fn resolve<R: Rng + ?Sized>(system: &mut StarSystem, launchers: &[Launcher], rng: &mut R) -> BombardmentOutcome {
    let mut outcome = BombardmentOutcome {
        launchers: launchers.len() as u32,
        ..BombardmentOutcome::default()
    };

    for launcher in launchers {
        let inhabited: Vec<usize> = system
            .planets
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_inhabited())
            .map(|(i, _)| i)
            .collect();

        let mut bunkers = 0.0;
        if let Some(&planet) = inhabited.choose(rng) {
            bunkers = f64::from(system.planets[planet].count_enabled(StructureKind::Bunker));
            let casualties = (launcher.damage * 0.75 - bunkers * 7.0).max(5.0) as u32;
            let killed = system.planets[planet].shrink(casualties);
            outcome.record_population(planet, killed);
        }

        let troop_casualties = (launcher.damage * 0.02 - bunkers * 0.30).max(1.0) as i64;
        outcome.troops_killed += (-system.add_troops(-troop_casualties)) as u32;

        if rng.gen_bool(launcher.structure_hit_chance.clamp(0.0, 1.0)) {
            let built: Vec<usize> = system
                .planets
                .iter()
                .enumerate()
                .filter(|(_, p)| p.structure_count() > 0)
                .map(|(i, _)| i)
                .collect();
            if let Some(&planet) = built.choose(rng) {
                let slots: Vec<u8> = system.planets[planet].structures().map(|(slot, _)| slot).collect();
                if let Some(&slot) = slots.choose(rng) {
                    if let Some(kind) = system.remove_structure(planet, slot) {
                        outcome.structures_destroyed.push((planet, kind));
                    }
                }
            }
        }
    }

    let morale = morale_loss(outcome.launchers);
    let before = system.morale();
    system.adjust_morale(-i64::from(morale));
    outcome.morale_lost = before - system.morale();
    outcome
}

/// Bombard a fleet's current system and report to both sides.
pub fn bombard<R: Rng + ?Sized>(galaxy: &mut Galaxy, fleet_id: FleetId, rng: &mut R) -> Result<BombardmentOutcome> {
    let fleet = galaxy.fleet(fleet_id)?;
    let attacker = fleet.owner;
    let pos = fleet.position;
    let scale = 1.0 + f64::from(galaxy.user(attacker)?.tech.get(TechField::Weapons)) * 0.1;
    let launchers: Vec<Launcher> = fleet
        .torpedo_launchers()
        .into_iter()
        .map(|(damage, structure_hit_chance)| Launcher {
            damage: damage * scale,
            structure_hit_chance,
        })
        .collect();

    let system = galaxy.system_mut(pos)?;
    let defender = system.owner;
    let outcome = resolve(system, &launchers, rng);

    tracing::debug!(
        fleet = fleet_id.0,
        launchers = outcome.launchers,
        population_killed = outcome.total_population_killed(),
        "bombardment resolved"
    );

    galaxy.push_report(
        defender,
        TurnReportItem::BombardmentSuffered {
            system: pos,
            population_killed: outcome.population_killed.clone(),
            troops_killed: outcome.troops_killed,
            structures_destroyed: outcome.structures_destroyed.clone(),
            morale_lost: outcome.morale_lost,
        },
    );
    galaxy.push_report(
        attacker,
        TurnReportItem::BombardmentConducted {
            system: pos,
            launchers: outcome.launchers,
            population_killed: outcome.total_population_killed(),
        },
    );
    Ok(outcome)
}
