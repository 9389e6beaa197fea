//! The [`MeasurementRaster`] contract shared by all raster variants.

use plume_core::{MaterialId, ParticleRecord, Position, SimTime};

use crate::config::RasterOptions;
use crate::error::RasterError;

/// Sparse spatial accumulator indexed by (cell, time index, material).
///
/// Writers call [`measure`](Self::measure) concurrently from many
/// particle-movement threads. Readers may poll concurrently and see a
/// slightly stale view; callers that need exact totals must read
/// between rounds and build the raster with an exact
/// [`SyncPolicy`](crate::SyncPolicy).
///
/// Cell ids are variant-specific: row-major `ix * ny + iy` for
/// rectangles, triangle index for meshes.
pub trait MeasurementRaster: Send + Sync {
    /// Construction options (time axis, materials, policy).
    fn options(&self) -> &RasterOptions;

    /// Number of addressable spatial cells.
    fn cell_count(&self) -> usize;

    /// Resolve the cell owning `position`, if any.
    ///
    /// `hint` is a previously known cell that variants may use to speed
    /// up the search; it never changes the answer.
    fn cell_at(&self, position: &Position, hint: Option<u32>) -> Option<usize>;

    /// Add one particle directly to `cell` at `time_index`.
    ///
    /// Returns `false` and changes nothing when any index is out of range.
    fn record(&self, cell: usize, time_index: usize, material: MaterialId, mass: f64) -> bool;

    /// Count a particle of `mass` at `position` and simulated `time`.
    ///
    /// Positions outside every cell, times before the first stamp or past
    /// the last interval, and unknown materials are dropped silently.
    /// Returns whether it was counted.
    fn measure(&self, time: SimTime, position: &Position, material: MaterialId, mass: f64) -> bool {
        self.measure_hinted(time, position, None, material, mass)
    }

    /// [`measure`](Self::measure) with a cell hint.
    fn measure_hinted(
        &self,
        time: SimTime,
        position: &Position,
        hint: Option<u32>,
        material: MaterialId,
        mass: f64,
    ) -> bool {
        let Some(time_index) = self.options().times.window_index(time) else {
            log::trace!("drop measurement at {time}: outside the time axis");
            return false;
        };
        match self.cell_at(position, hint) {
            Some(cell) => self.record(cell, time_index, material, mass),
            None => {
                log::trace!("drop measurement at {position:?}: outside raster");
                false
            }
        }
    }

    /// Count a particle record, honouring `min_travel_length` and the
    /// record's cell hint.
    fn measure_particle(&self, time: SimTime, particle: &ParticleRecord) -> bool {
        if particle.travelled_distance < self.options().min_travel_length {
            return false;
        }
        self.measure_hinted(
            time,
            &particle.position,
            particle.cell_hint,
            particle.material,
            particle.mass,
        )
    }

    /// Particles counted at `(cell, time_index, material)`.
    fn particles_counted(&self, cell: usize, time_index: usize, material: MaterialId) -> u32;

    /// Particles counted at `(cell, time_index)`, summed over materials.
    fn particles_counted_material_sum(&self, cell: usize, time_index: usize) -> u32;

    /// Mass accumulated at `(cell, time_index, material)`.
    fn mass(&self, cell: usize, time_index: usize, material: MaterialId) -> f64;

    /// Mass accumulated in `cell` over all times and materials.
    fn mass_sum(&self, cell: usize) -> f64;

    /// Largest material-summed count of any `(cell, time_index)`.
    /// Used for colour-scale normalisation.
    fn max_particle_count(&self) -> u32;

    /// Number of cells that have backing storage.
    fn allocated_cells(&self) -> usize;

    /// Drop all counters and storage.
    ///
    /// Takes `&mut self`: it cannot overlap with `measure()` calls.
    fn reset(&mut self);

    /// Force-release every per-cell lock, for recovery after a writer
    /// died holding one. Returns how many locks were held.
    ///
    /// Variants built on exclusive mutexes return
    /// [`RasterError::Unsupported`].
    fn break_all_locks(&self) -> Result<usize, RasterError>;

    /// Time dimension.
    fn number_of_times(&self) -> usize {
        self.options().number_of_times()
    }

    /// Material dimension.
    fn number_of_materials(&self) -> usize {
        self.options().materials as usize
    }
}
