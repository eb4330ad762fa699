//! Layered damage model for space combat.
//!
//! A hit passes through shield, then armor, then hull. Each layer converts
//! incoming damage with a per-weapon multiplier and optional flat reduction,
//! absorbs what its pool can hold and passes the unabsorbed remainder on,
//! converted back to raw damage and scaled by the layer's pass-through ratio.
//! A layer whose pool is already empty passes raw damage through unchanged.

use serde::{Deserialize, Serialize};

use crate::ship::Ship;

/// Weapon families that fire in space combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeaponKind {
    /// Beam emitter: strong against shields.
    Beam,
    /// Torpedo launcher: strong against armor and hull.
    Torpedo,
}

impl WeaponKind {
    /// Action points spent per shot.
    #[must_use]
    pub const fn action_cost(self) -> u32 {
        match self {
            Self::Beam => 2,
            Self::Torpedo => 3,
        }
    }

    /// Shots per installed weapon per battle.
    #[must_use]
    pub const fn uses_per_battle(self) -> u32 {
        match self {
            Self::Beam => 3,
            Self::Torpedo => 1,
        }
    }
}

/// Defensive layers in hit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Energy shield.
    Shield,
    /// Armor plating.
    Armor,
    /// Structural hull.
    Hull,
}

/// How a weapon interacts with one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerProfile {
    /// Damage multiplier against the layer's pool.
    pub multiplier: f64,
    /// Flat reduction after the multiplier.
    pub flat: f64,
    /// Fraction of the unabsorbed raw damage passed to the next layer.
    pub pass_ratio: f64,
}

impl LayerProfile {
    const fn new(multiplier: f64, flat: f64, pass_ratio: f64) -> Self {
        Self {
            multiplier,
            flat,
            pass_ratio,
        }
    }
}

/// Interaction table for `weapon` against `layer`.
#[must_use]
pub const fn profile(weapon: WeaponKind, layer: Layer) -> LayerProfile {
    match (weapon, layer) {
        (WeaponKind::Beam, Layer::Shield) => LayerProfile::new(2.0, 0.0, 1.0),
        (WeaponKind::Beam, Layer::Armor) => LayerProfile::new(0.5, 0.0, 1.0),
        (WeaponKind::Beam, Layer::Hull) => LayerProfile::new(1.0, 0.0, 1.0),
        (WeaponKind::Torpedo, Layer::Shield) => LayerProfile::new(1.0, 0.0, 0.5),
        (WeaponKind::Torpedo, Layer::Armor) => LayerProfile::new(2.0, 5.0, 1.0),
        (WeaponKind::Torpedo, Layer::Hull) => LayerProfile::new(3.0, 0.0, 1.0),
    }
}

/// Run `damage` through one absorbing layer; returns the raw damage passed on.
#[must_use]
pub fn absorb(pool: &mut f64, damage: f64, profile: LayerProfile) -> f64 {
    if damage <= 0.0 {
        return 0.0;
    }
    if *pool <= 0.0 {
        return damage;
    }
    let effective = (damage * profile.multiplier - profile.flat).max(0.0);
    if *pool >= effective {
        *pool -= effective;
        return 0.0;
    }
    let overflow = effective - *pool;
    *pool = 0.0;
    overflow / profile.multiplier * profile.pass_ratio
}

/// Damage dealt to each layer by one hit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DamageDealt {
    /// Shield points removed.
    pub shield: f64,
    /// Armor points removed.
    pub armor: f64,
    /// Hull points removed.
    pub hull: f64,
}

/// Apply one hit to `ship`. Pools never go below zero except the hull,
/// which the caller treats as destroyed at or below zero.
pub fn apply_hit(ship: &mut Ship, weapon: WeaponKind, damage: f64) -> DamageDealt {
    let before = (ship.shield, ship.armor, ship.hull);

    let through_shield = absorb(&mut ship.shield, damage, profile(weapon, Layer::Shield));
    let through_armor = absorb(&mut ship.armor, through_shield, profile(weapon, Layer::Armor));
    let hull = profile(weapon, Layer::Hull);
    if through_armor > 0.0 {
        ship.hull -= through_armor * hull.multiplier;
    }

    DamageDealt {
        shield: before.0 - ship.shield,
        armor: before.1 - ship.armor,
        hull: before.2 - ship.hull,
    }
}
