//! Per-user sensor overlay (fog of war).
//!
//! Each user owns a strength grid the size of the galaxy. Every turn the
//! overlay decays, then every fleet and owned system reveals the cells around
//! it with a strength that falls off linearly with Chebyshev distance.

use serde::{Deserialize, Serialize};

use crate::galaxy::{Galaxy, GridPos};

/// Sensor strength of an owned system with no sensor upgrades.
pub const SYSTEM_SENSOR_STRENGTH: u32 = 60;

/// Sensor strength grid for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorOverlay {
    width: u32,
    height: u32,
    cells: Vec<u8>,
}

impl SensorOverlay {
    /// Create a blank overlay.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![0; (width * height) as usize],
        }
    }

    /// Halve every cell so stale sightings fade over a few turns.
    pub fn decay(&mut self) {
        for cell in &mut self.cells {
            *cell /= 2;
        }
    }

    /// Strength at `pos`, 0 when out of bounds.
    #[must_use]
    pub fn strength_at(&self, pos: GridPos) -> u8 {
        if pos.x >= self.width || pos.y >= self.height {
            return 0;
        }
        self.cells[(pos.y * self.width + pos.x) as usize]
    }

    /// Whether the cell currently has any sensor coverage.
    #[must_use]
    pub fn is_visible(&self, pos: GridPos) -> bool {
        self.strength_at(pos) > 0
    }

    /// Reveal outward from `center`.
    ///
    /// Range is derived from strength: one extra cell per 50 points.
    pub fn reveal(&mut self, center: GridPos, strength: u32) {
        if self.cells.is_empty() {
            return;
        }
        let strength = strength.min(u32::from(u8::MAX));
        let range = 1 + strength / 50;

        let x0 = center.x.saturating_sub(range);
        let y0 = center.y.saturating_sub(range);
        let x1 = (center.x + range).min(self.width - 1);
        let y1 = (center.y + range).min(self.height - 1);

        for y in y0..=y1 {
            for x in x0..=x1 {
                let distance = center.distance(GridPos::new(x, y));
                let value = strength * (range + 1 - distance) / (range + 1);
                let cell = &mut self.cells[(y * self.width + x) as usize];
                *cell = (*cell).max(value as u8);
            }
        }
    }
}

/// Recompute every user's overlay from their fleets and systems.
pub fn refresh(galaxy: &mut Galaxy) {
    let mut sources: Vec<(usize, GridPos, u32)> = Vec::new();

    for (index, user) in galaxy.users.iter().enumerate() {
        for fleet_id in &user.fleets {
            if let Some(fleet) = galaxy.fleets.get(*fleet_id) {
                sources.push((index, fleet.position, fleet.sensor_strength(&user.tech)));
            }
        }
        for &pos in &user.systems {
            sources.push((index, pos, SYSTEM_SENSOR_STRENGTH + user.tech.sensor_bonus()));
        }
    }

    for user in &mut galaxy.users {
        user.sensor.decay();
    }
    for (index, pos, strength) in sources {
        galaxy.users[index].sensor.reveal(pos, strength);
    }
}
