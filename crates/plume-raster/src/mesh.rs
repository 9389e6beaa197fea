//! Triangulated-mesh raster.
//!
//! Each surface triangle is one raster cell. Lookup tries the caller's
//! hint triangle first, then walks across edges toward the target, and
//! finally falls back to a uniform bucket index over triangle bounding
//! boxes built once at construction.
//!
//! Cells use [`SpinCellLock`]s, so
//! [`break_all_locks`](MeasurementRaster::break_all_locks) can
//! force-release them after a writer died mid-update. Forcing a lock
//! that a live writer still holds lets a second writer in; the counters
//! stay memory-safe but that cell may lose an update.

use smallvec::SmallVec;

use plume_core::{MaterialId, Position};

use crate::config::RasterOptions;
use crate::error::RasterError;
use crate::lock::SpinCellLock;
use crate::raster::MeasurementRaster;
use crate::sparse::SparseCells;

/// Triangles per storage row.
const TRIANGLES_PER_ROW: usize = 64;

/// Maximum edge crossings of the hinted walk before falling back to the index.
const MAX_WALK_STEPS: usize = 32;

/// Barycentric tolerance: points this close outside an edge count as inside.
const EDGE_EPSILON: f64 = 1e-9;

/// Triangle mesh topology.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions.
    pub vertices: Vec<Position>,
    /// Vertex indices of each triangle.
    pub triangles: Vec<[u32; 3]>,
    /// Neighbour across each edge, `None` on the boundary. Edge `k` is
    /// opposite vertex `k`. May be empty, which disables the walk.
    pub neighbours: Vec<[Option<u32>; 3]>,
}

impl Mesh {
    /// Check that every index refers to an existing vertex or triangle.
    pub fn validate(&self) -> Result<(), RasterError> {
        if self.triangles.is_empty() {
            return Err(RasterError::InvalidMesh {
                reason: "mesh has no triangles".into(),
            });
        }
        let nv = self.vertices.len() as u32;
        let nt = self.triangles.len() as u32;
        if let Some((t, _)) = self
            .triangles
            .iter()
            .enumerate()
            .find(|(_, tri)| tri.iter().any(|&v| v >= nv))
        {
            return Err(RasterError::InvalidMesh {
                reason: format!("triangle {t} references a vertex >= {nv}"),
            });
        }
        if !self.neighbours.is_empty() {
            if self.neighbours.len() != self.triangles.len() {
                return Err(RasterError::InvalidMesh {
                    reason: format!(
                        "{} neighbour entries for {} triangles",
                        self.neighbours.len(),
                        self.triangles.len()
                    ),
                });
            }
            if let Some((t, _)) = self
                .neighbours
                .iter()
                .enumerate()
                .find(|(_, n)| n.iter().flatten().any(|&x| x >= nt))
            {
                return Err(RasterError::InvalidMesh {
                    reason: format!("triangle {t} has a neighbour >= {nt}"),
                });
            }
        }
        Ok(())
    }
}

/// Uniform bucket grid over triangle bounding boxes.
struct BucketIndex {
    origin: [f64; 2],
    bucket_size: [f64; 2],
    dims: [usize; 2],
    buckets: Vec<SmallVec<[u32; 8]>>,
}

impl BucketIndex {
    fn build(mesh: &Mesh) -> Self {
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for tri in &mesh.triangles {
            for &v in tri {
                let p = mesh.vertices[v as usize];
                for axis in 0..2 {
                    min[axis] = min[axis].min(p[axis]);
                    max[axis] = max[axis].max(p[axis]);
                }
            }
        }
        // About one triangle per bucket on average.
        let side = (mesh.triangles.len() as f64).sqrt().ceil().max(1.0) as usize;
        let dims = [side, side];
        let bucket_size = [
            ((max[0] - min[0]) / side as f64).max(f64::MIN_POSITIVE),
            ((max[1] - min[1]) / side as f64).max(f64::MIN_POSITIVE),
        ];
        let mut index = Self {
            origin: min,
            bucket_size,
            dims,
            buckets: vec![SmallVec::new(); side * side],
        };
        for (t, tri) in mesh.triangles.iter().enumerate() {
            let mut lo = [f64::INFINITY; 2];
            let mut hi = [f64::NEG_INFINITY; 2];
            for &v in tri {
                let p = mesh.vertices[v as usize];
                for axis in 0..2 {
                    lo[axis] = lo[axis].min(p[axis]);
                    hi[axis] = hi[axis].max(p[axis]);
                }
            }
            let (bx0, by0) = index.clamped_bucket(lo[0], lo[1]);
            let (bx1, by1) = index.clamped_bucket(hi[0], hi[1]);
            for bx in bx0..=bx1 {
                for by in by0..=by1 {
                    index.buckets[bx * dims[1] + by].push(t as u32);
                }
            }
        }
        index
    }

    fn clamped_bucket(&self, x: f64, y: f64) -> (usize, usize) {
        let fx = ((x - self.origin[0]) / self.bucket_size[0]).floor();
        let fy = ((y - self.origin[1]) / self.bucket_size[1]).floor();
        (
            (fx.max(0.0) as usize).min(self.dims[0] - 1),
            (fy.max(0.0) as usize).min(self.dims[1] - 1),
        )
    }

    fn candidates(&self, x: f64, y: f64) -> &[u32] {
        let fx = ((x - self.origin[0]) / self.bucket_size[0]).floor();
        let fy = ((y - self.origin[1]) / self.bucket_size[1]).floor();
        // Points on the far boundary belong to the last bucket.
        let bx = if fx as usize == self.dims[0] { fx - 1.0 } else { fx };
        let by = if fy as usize == self.dims[1] { fy - 1.0 } else { fy };
        if !(bx >= 0.0 && by >= 0.0 && (bx as usize) < self.dims[0] && (by as usize) < self.dims[1])
        {
            return &[];
        }
        &self.buckets[bx as usize * self.dims[1] + by as usize]
    }
}

/// Measurement raster over a triangulated surface mesh.
pub struct TriangleRaster {
    mesh: Mesh,
    index: BucketIndex,
    options: RasterOptions,
    cells: SparseCells<SpinCellLock>,
}

impl TriangleRaster {
    /// Build a raster over `mesh`.
    pub fn new(mesh: Mesh, options: RasterOptions) -> Result<Self, RasterError> {
        mesh.validate()?;
        options.validate()?;
        let index = BucketIndex::build(&mesh);
        let cells = SparseCells::new(
            mesh.triangles.len(),
            TRIANGLES_PER_ROW,
            options.number_of_times(),
            options.materials as usize,
        );
        Ok(Self {
            mesh,
            index,
            options,
            cells,
        })
    }

    /// The mesh topology.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Barycentric coordinates of `(x, y)` in triangle `t`.
    fn barycentric(&self, t: usize, x: f64, y: f64) -> [f64; 3] {
        let [a, b, c] = self.mesh.triangles[t].map(|v| self.mesh.vertices[v as usize]);
        let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
        if det == 0.0 {
            return [-1.0; 3];
        }
        let l0 = ((b[1] - c[1]) * (x - c[0]) + (c[0] - b[0]) * (y - c[1])) / det;
        let l1 = ((c[1] - a[1]) * (x - c[0]) + (a[0] - c[0]) * (y - c[1])) / det;
        [l0, l1, 1.0 - l0 - l1]
    }

    /// Whether `(x, y)` lies inside (or on the edge of) triangle `t`.
    pub fn contains(&self, t: usize, x: f64, y: f64) -> bool {
        t < self.mesh.triangles.len()
            && self
                .barycentric(t, x, y)
                .iter()
                .all(|&l| l >= -EDGE_EPSILON)
    }

    /// Walk from `start` across edges toward `(x, y)`.
    fn walk(&self, start: usize, x: f64, y: f64) -> Option<usize> {
        if self.mesh.neighbours.is_empty() {
            return None;
        }
        let mut current = start;
        for _ in 0..MAX_WALK_STEPS {
            let bary = self.barycentric(current, x, y);
            if bary.iter().all(|&l| l >= -EDGE_EPSILON) {
                return Some(current);
            }
            // Cross the edge opposite the most negative coordinate.
            let edge = (0..3)
                .min_by(|&i, &j| bary[i].total_cmp(&bary[j]))
                .unwrap_or(0);
            current = self.mesh.neighbours[current][edge]? as usize;
        }
        None
    }

    /// Triangle containing `(x, y)`, searching from `hint` when given.
    pub fn triangle_of(&self, x: f64, y: f64, hint: Option<u32>) -> Option<usize> {
        if !(x.is_finite() && y.is_finite()) {
            return None;
        }
        if let Some(h) = hint.map(|h| h as usize) {
            if h < self.mesh.triangles.len() {
                if let Some(t) = self.walk(h, x, y) {
                    return Some(t);
                }
            }
        }
        self.index
            .candidates(x, y)
            .iter()
            .map(|&t| t as usize)
            .find(|&t| self.contains(t, x, y))
    }

    /// Centroid of triangle `t`.
    pub fn centroid(&self, t: usize) -> Option<Position> {
        let tri = self.mesh.triangles.get(t)?;
        let mut c = [0.0; 3];
        for &v in tri {
            let p = self.mesh.vertices[v as usize];
            for axis in 0..3 {
                c[axis] += p[axis] / 3.0;
            }
        }
        Some(c)
    }

    /// Total particles counted in the raster.
    pub fn total_particles(&self) -> u64 {
        self.cells.total_count()
    }

    /// Triangles that have backing storage.
    pub fn allocated_triangles(&self) -> Vec<usize> {
        self.cells.allocated_cell_ids()
    }
}

impl MeasurementRaster for TriangleRaster {
    fn options(&self) -> &RasterOptions {
        &self.options
    }

    fn cell_count(&self) -> usize {
        self.cells.cell_count()
    }

    fn cell_at(&self, position: &Position, hint: Option<u32>) -> Option<usize> {
        self.triangle_of(position[0], position[1], hint)
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
        let released = self.cells.force_release_all().unwrap_or(0);
        if released > 0 {
            log::warn!("force-released {released} triangle raster cell locks");
        }
        Ok(released)
    }
}

impl std::fmt::Debug for TriangleRaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriangleRaster")
            .field("triangles", &self.mesh.triangles.len())
            .field("times", &self.options.number_of_times())
            .field("materials", &self.options.materials)
            .field("policy", &self.options.policy)
            .field("allocated_cells", &self.cells.allocated_cells())
            .finish()
    }
}
