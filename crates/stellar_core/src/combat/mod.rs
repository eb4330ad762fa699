//! Combat resolution.
//!
//! - [`space`] - round-based fleet battles, detected once per turn
//! - [`ground`] - troop attrition for invasions
//! - [`bombardment`] - one-shot orbital strikes
//! - [`damage`] - the shield/armor/hull damage cascade

pub mod bombardment;
pub mod damage;
pub mod ground;
pub mod space;

use std::collections::BTreeSet;

use rand::Rng;

use crate::error::Result;
use crate::galaxy::{Galaxy, GridPos};
use space::{SpaceBattle, SpaceCombatResolver};

/// Systems holding fleets of at least two owners with at least one armed ship.
#[must_use]
pub fn detect_battles(galaxy: &Galaxy) -> Vec<GridPos> {
    galaxy
        .systems()
        .iter()
        .filter(|system| system.fleets.len() >= 2)
        .filter(|system| {
            let fleets: Vec<_> = system
                .fleets
                .iter()
                .filter_map(|id| galaxy.fleets().get(*id))
                .collect();
            let owners: BTreeSet<_> = fleets.iter().map(|f| f.owner).collect();
            owners.len() >= 2 && fleets.iter().any(|f| f.is_armed())
        })
        .map(|system| system.position)
        .collect()
}

/// Detect and fight every battle in the galaxy; returns the number fought.
pub fn resolve_battles<R: Rng + ?Sized>(galaxy: &mut Galaxy, max_rounds: u32, rng: &mut R) -> Result<u32> {
    let resolver = SpaceCombatResolver::new(max_rounds);
    let contested = detect_battles(galaxy);
    for pos in &contested {
        let mut battle = SpaceBattle::gather(galaxy, *pos)?;
        resolver.resolve(&mut battle, rng);
        battle.apply(galaxy)?;
    }
    Ok(contested.len() as u32)
}
