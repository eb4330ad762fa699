//! Users, factions and the technology ledger.

use serde::{Deserialize, Serialize};

use crate::galaxy::{FleetId, GridPos, UserId};
use crate::report::{ReportEntry, TurnReportItem};
use crate::visibility::SensorOverlay;

/// Researchable technology fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TechField {
    /// Weapon damage, ground troop strength, armor repair.
    Weapons,
    /// Hull and armor maxima, hull repair, ground defense.
    Construction,
    /// Shield maxima and regeneration.
    Energy,
    /// Targeting in space combat.
    Computer,
    /// Fleet speed.
    Propulsion,
    /// Sensor range.
    Sensors,
}

impl TechField {
    /// All fields in ledger order.
    pub const ALL: [Self; 6] = [
        Self::Weapons,
        Self::Construction,
        Self::Energy,
        Self::Computer,
        Self::Propulsion,
        Self::Sensors,
    ];

    const fn index(self) -> usize {
        match self {
            Self::Weapons => 0,
            Self::Construction => 1,
            Self::Energy => 2,
            Self::Computer => 3,
            Self::Propulsion => 4,
            Self::Sensors => 5,
        }
    }
}

/// Researched level per field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TechLevels {
    levels: [u32; 6],
}

impl TechLevels {
    /// Level of `field`.
    #[must_use]
    pub const fn get(&self, field: TechField) -> u32 {
        self.levels[field.index()]
    }

    /// Set the level of `field`.
    pub fn set(&mut self, field: TechField, level: u32) {
        self.levels[field.index()] = level;
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, field: TechField, level: u32) -> Self {
        self.set(field, level);
        self
    }

    /// Raise `field` by one level and return the new level.
    pub fn advance(&mut self, field: TechField) -> u32 {
        self.levels[field.index()] += 1;
        self.levels[field.index()]
    }

    /// Flat sensor strength added by the sensors field.
    #[must_use]
    pub const fn sensor_bonus(&self) -> u32 {
        self.get(TechField::Sensors) * 10
    }
}

/// Playable factions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    /// Balanced generalists.
    #[default]
    Terran,
    /// Scholarly faction with a research bonus.
    Zenthari,
    /// Militarist faction with no research bonus.
    Kragg,
}

impl Faction {
    /// Research points granted every turn regardless of systems.
    #[must_use]
    pub const fn research_bonus(self) -> i64 {
        match self {
            Self::Terran => 2,
            Self::Zenthari => 5,
            Self::Kragg => 0,
        }
    }
}

/// Research cost to go from `level` to `level + 1`.
#[must_use]
pub const fn research_cost(base: i64, level: u32) -> i64 {
    let next = level as i64 + 1;
    base * next * next
}

/// A player of the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Faction.
    pub faction: Faction,
    /// Researched technology.
    pub tech: TechLevels,
    /// Unspent research points.
    pub research_points: i64,
    /// Field currently being researched.
    pub research_target: Option<TechField>,
    /// Fleets owned by this user.
    pub fleets: Vec<FleetId>,
    /// Systems owned by this user.
    pub systems: Vec<GridPos>,
    /// Fog-of-war overlay.
    pub sensor: SensorOverlay,
    reports: Vec<ReportEntry>,
}

impl User {
    /// Create a user with no assets.
    #[must_use]
    pub fn new(id: UserId, name: impl Into<String>, faction: Faction, width: u32, height: u32) -> Self {
        Self {
            id,
            name: name.into(),
            faction,
            tech: TechLevels::default(),
            research_points: 0,
            research_target: None,
            fleets: Vec::new(),
            systems: Vec::new(),
            sensor: SensorOverlay::new(width, height),
            reports: Vec::new(),
        }
    }

    /// Append a report entry.
    pub fn push_report(&mut self, turn: u64, item: TurnReportItem) {
        self.reports.push(ReportEntry { turn, item });
    }

    /// Pending report entries.
    #[must_use]
    pub fn reports(&self) -> &[ReportEntry] {
        &self.reports
    }

    /// Remove and return all pending report entries.
    pub fn drain_reports(&mut self) -> Vec<ReportEntry> {
        std::mem::take(&mut self.reports)
    }

    /// Add research points and grant the target technology once its cost is met.
    ///
    /// Returns the granted field and its new level.
    pub fn accrue_research(&mut self, amount: i64, base_cost: i64) -> Option<(TechField, u32)> {
        self.research_points += amount;
        let field = self.research_target?;
        let cost = research_cost(base_cost, self.tech.get(field));
        if self.research_points < cost {
            return None;
        }
        self.research_points -= cost;
        self.research_target = None;
        Some((field, self.tech.advance(field)))
    }

    /// Remove research points without going below zero.
    pub fn lose_research(&mut self, amount: i64) -> i64 {
        let lost = amount.clamp(0, self.research_points.max(0));
        self.research_points -= lost;
        lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(UserId(1), "Ada", Faction::Terran, 4, 4)
    }

    #[test]
    fn test_research_cost_grows_quadratically() {
        assert_eq!(research_cost(100, 0), 100);
        assert_eq!(research_cost(100, 1), 400);
        assert_eq!(research_cost(100, 2), 900);
    }

    #[test]
    fn test_accrue_without_target_banks_points() {
        let mut user = user();
        assert_eq!(user.accrue_research(500, 100), None);
        assert_eq!(user.research_points, 500);
    }

    #[test]
    fn test_accrue_grants_and_clears_target() {
        let mut user = user();
        user.research_target = Some(TechField::Weapons);
        assert_eq!(user.accrue_research(60, 100), None);
        assert_eq!(user.accrue_research(60, 100), Some((TechField::Weapons, 1)));
        assert_eq!(user.research_points, 20);
        assert_eq!(user.research_target, None);
        assert_eq!(user.tech.get(TechField::Weapons), 1);
    }

    #[test]
    fn test_lose_research_floors_at_zero() {
        let mut user = user();
        user.research_points = 30;
        assert_eq!(user.lose_research(50), 30);
        assert_eq!(user.research_points, 0);
    }
}
