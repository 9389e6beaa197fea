//! Particle records delivered by the movement layer each round.

use crate::id::MaterialId;

/// A position in model coordinates `[x, y, z]`.
pub type Position = [f64; 3];

/// One particle observation produced by the movement/physics layer.
///
/// The movement layer pushes these into rasters directly; rasters
/// never pull particle data.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleRecord {
    /// Stable particle identifier.
    pub id: u64,
    /// Current position in model coordinates.
    pub position: Position,
    /// Material class of the particle.
    pub material: MaterialId,
    /// Mass carried by the particle (kg).
    pub mass: f64,
    /// Path length travelled since release (m).
    pub travelled_distance: f64,
    /// Last known surface cell, used by mesh rasters to seed the
    /// containment search. `None` forces a full lookup.
    pub cell_hint: Option<u32>,
}

impl ParticleRecord {
    /// Create a record with no travelled distance and no cell hint.
    pub fn new(id: u64, position: Position, material: MaterialId, mass: f64) -> Self {
        Self {
            id,
            position,
            material,
            mass,
            travelled_distance: 0.0,
            cell_hint: None,
        }
    }

    /// Set the travelled distance.
    pub fn with_travelled_distance(mut self, distance: f64) -> Self {
        self.travelled_distance = distance;
        self
    }

    /// Set the surface cell hint.
    pub fn with_cell_hint(mut self, cell: u32) -> Self {
        self.cell_hint = Some(cell);
        self
    }
}
