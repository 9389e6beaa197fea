//! Uniform rectangle raster.
//!
//! Cell lookup is a constant-time `floor((pos - origin) / cell_size)` per
//! axis. Storage rows are x-columns: the first particle to land in
//! column `ix` allocates that column's row table, the first to land in
//! `(ix, iy)` allocates the cell block.

use plume_core::{MaterialId, Position};

use crate::config::RasterOptions;
use crate::error::RasterError;
use crate::lock::MutexCellLock;
use crate::raster::MeasurementRaster;
use crate::sparse::SparseCells;

/// Placement and resolution of a rectangle raster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectangleGeometry {
    /// Lower-left corner `[x_min, y_min]`.
    pub origin: [f64; 2],
    /// Cell extent `[dx, dy]`. Must be finite and positive.
    pub cell_size: [f64; 2],
    /// Cell counts `[nx, ny]`. Must be non-zero.
    pub counts: [u32; 2],
}

impl RectangleGeometry {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), RasterError> {
        if self.counts[0] == 0 || self.counts[1] == 0 {
            return Err(RasterError::InvalidGeometry {
                reason: format!("cell counts must be non-zero, got {:?}", self.counts),
            });
        }
        for size in self.cell_size {
            if !size.is_finite() || size <= 0.0 {
                return Err(RasterError::InvalidGeometry {
                    reason: format!("cell size must be finite and positive, got {size}"),
                });
            }
        }
        if !self.origin.iter().all(|v| v.is_finite()) {
            return Err(RasterError::InvalidGeometry {
                reason: format!("origin must be finite, got {:?}", self.origin),
            });
        }
        Ok(())
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.counts[0] as usize * self.counts[1] as usize
    }
}

/// Rectangle raster with mutex-per-cell locking.
///
/// [`break_all_locks`](MeasurementRaster::break_all_locks) is unsupported:
/// an exclusive mutex can only be released by its holder.
pub struct RectangleRaster {
    geometry: RectangleGeometry,
    options: RasterOptions,
    cells: SparseCells<MutexCellLock>,
}

impl RectangleRaster {
    /// Build a raster from explicit geometry.
    pub fn new(geometry: RectangleGeometry, options: RasterOptions) -> Result<Self, RasterError> {
        geometry.validate()?;
        options.validate()?;
        let cells = SparseCells::new(
            geometry.cell_count(),
            geometry.counts[1] as usize,
            options.number_of_times(),
            options.materials as usize,
        );
        Ok(Self {
            geometry,
            options,
            cells,
        })
    }

    /// Build a raster that exactly covers the bounding box of `vertices`
    /// with `nx × ny` cells.
    pub fn covering(
        vertices: &[Position],
        nx: u32,
        ny: u32,
        options: RasterOptions,
    ) -> Result<Self, RasterError> {
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for v in vertices {
            for axis in 0..2 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
        }
        if vertices.is_empty() || nx == 0 || ny == 0 {
            return Err(RasterError::InvalidGeometry {
                reason: "covering raster needs vertices and non-zero cell counts".into(),
            });
        }
        let geometry = RectangleGeometry {
            origin: min,
            cell_size: [
                (max[0] - min[0]) / nx as f64,
                (max[1] - min[1]) / ny as f64,
            ],
            counts: [nx, ny],
        };
        Self::new(geometry, options)
    }

    /// Build an `nx × ny` raster of `dx × dy` cells around `(x, y)`.
    ///
    /// With `to_cell_center` the point lies at the centre of a cell;
    /// otherwise it lies on the shared corner of four cells.
    #[allow(clippy::too_many_arguments)]
    pub fn focus_on_point(
        x: f64,
        y: f64,
        to_cell_center: bool,
        dx: f64,
        dy: f64,
        nx: u32,
        ny: u32,
        options: RasterOptions,
    ) -> Result<Self, RasterError> {
        let half_x = dx * (nx / 2) as f64;
        let half_y = dy * (ny / 2) as f64;
        let origin = if to_cell_center {
            [x - dx * 0.5 - half_x, y - dy * 0.5 - half_y]
        } else {
            [x - half_x, y - half_y]
        };
        Self::new(
            RectangleGeometry {
                origin,
                cell_size: [dx, dy],
                counts: [nx, ny],
            },
            options,
        )
    }

    /// The raster geometry.
    pub fn geometry(&self) -> &RectangleGeometry {
        &self.geometry
    }

    /// `(ix, iy)` of the cell containing `(x, y)`, or `None` outside.
    pub fn cell_of(&self, x: f64, y: f64) -> Option<(u32, u32)> {
        let g = &self.geometry;
        let fx = ((x - g.origin[0]) / g.cell_size[0]).floor();
        let fy = ((y - g.origin[1]) / g.cell_size[1]).floor();
        // NaN fails both comparisons.
        if !(fx >= 0.0 && fx < g.counts[0] as f64 && fy >= 0.0 && fy < g.counts[1] as f64) {
            return None;
        }
        Some((fx as u32, fy as u32))
    }

    /// Row-major cell id of `(ix, iy)`.
    pub fn cell_id(&self, ix: u32, iy: u32) -> Option<usize> {
        let [nx, ny] = self.geometry.counts;
        (ix < nx && iy < ny).then(|| ix as usize * ny as usize + iy as usize)
    }

    /// `(ix, iy)` of a row-major cell id.
    pub fn cell_xy(&self, cell: usize) -> Option<(u32, u32)> {
        let ny = self.geometry.counts[1] as usize;
        (cell < self.geometry.cell_count()).then(|| ((cell / ny) as u32, (cell % ny) as u32))
    }

    /// Centre of cell `(ix, iy)`.
    pub fn mid_coordinate(&self, ix: u32, iy: u32) -> [f64; 2] {
        let g = &self.geometry;
        [
            g.origin[0] + (ix as f64 + 0.5) * g.cell_size[0],
            g.origin[1] + (iy as f64 + 0.5) * g.cell_size[1],
        ]
    }

    /// Corners of cell `(ix, iy)`, counter-clockwise from lower-left.
    pub fn rectangle_bounds(&self, ix: u32, iy: u32) -> [[f64; 2]; 4] {
        let g = &self.geometry;
        let x0 = g.origin[0] + ix as f64 * g.cell_size[0];
        let y0 = g.origin[1] + iy as f64 * g.cell_size[1];
        let x1 = g.origin[0] + (ix + 1) as f64 * g.cell_size[0];
        let y1 = g.origin[1] + (iy + 1) as f64 * g.cell_size[1];
        [[x0, y0], [x1, y0], [x1, y1], [x0, y1]]
    }

    /// [`rectangle_bounds`](Self::rectangle_bounds) with the ring closed
    /// (first corner repeated), as polygon consumers expect.
    pub fn rectangle_bounds_closed(&self, ix: u32, iy: u32) -> [[f64; 2]; 5] {
        let [a, b, c, d] = self.rectangle_bounds(ix, iy);
        [a, b, c, d, a]
    }

    /// Particles counted at `(ix, iy, time_index, material)`.
    pub fn particles_counted_xy(
        &self,
        ix: u32,
        iy: u32,
        time_index: usize,
        material: MaterialId,
    ) -> u32 {
        self.cell_id(ix, iy)
            .map_or(0, |cell| self.particles_counted(cell, time_index, material))
    }

    /// Particles counted at `(ix, iy, time_index)` summed over materials.
    pub fn particles_counted_material_sum_xy(&self, ix: u32, iy: u32, time_index: usize) -> u32 {
        self.cell_id(ix, iy)
            .map_or(0, |cell| self.particles_counted_material_sum(cell, time_index))
    }

    /// Total particles counted in the raster.
    pub fn total_particles(&self) -> u64 {
        self.cells.total_count()
    }
}

impl MeasurementRaster for RectangleRaster {
    fn options(&self) -> &RasterOptions {
        &self.options
    }

    fn cell_count(&self) -> usize {
        self.cells.cell_count()
    }

    fn cell_at(&self, position: &Position, _hint: Option<u32>) -> Option<usize> {
        let (ix, iy) = self.cell_of(position[0], position[1])?;
        self.cell_id(ix, iy)
    }

    fn record(&self, cell: usize, time_index: usize, material: MaterialId, mass: f64) -> bool {
        self.cells
            .record(cell, time_index, material.0 as usize, mass, self.options.policy)
    }

    fn particles_counted(&self, cell: usize, time_index: usize, material: MaterialId) -> u32 {
        self.cells.count(cell, time_index, material.0 as usize)
    }

    fn particles_counted_material_sum(&self, cell: usize, time_index: usize) -> u32 {
        self.cells.material_sum(cell, time_index)
    }

    fn mass(&self, cell: usize, time_index: usize, material: MaterialId) -> f64 {
        self.cells.mass(cell, time_index, material.0 as usize)
    }

    fn mass_sum(&self, cell: usize) -> f64 {
        self.cells.mass_total(cell)
    }

    fn max_particle_count(&self) -> u32 {
        self.cells.max_count()
    }

    fn allocated_cells(&self) -> usize {
        self.cells.allocated_cells()
    }

    fn reset(&mut self) {
        self.cells.reset();
    }

    fn break_all_locks(&self) -> Result<usize, RasterError> {
        Err(RasterError::Unsupported {
            operation: "break_all_locks",
            reason: "rectangle rasters use exclusive mutexes that only their holder can release",
        })
    }
}

impl std::fmt::Debug for RectangleRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RectangleRaster")
            .field("geometry", &self.geometry)
            .field("times", &self.options.number_of_times())
            .field("materials", &self.options.materials)
            .field("policy", &self.options.policy)
            .field("allocated_cells", &self.cells.allocated_cells())
            .finish()
    }
}
