//! Seeded particle streams and small geometries.

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use plume_core::{MaterialId, ParticleRecord, TimeAxis};
use plume_raster::{Mesh, RasterOptions, RectangleGeometry, RectangleRaster, SyncPolicy};

/// Deterministic particle generator over an axis-aligned box.
///
/// Same seed, same stream.
pub struct ParticleGenerator {
    rng: ChaCha8Rng,
    min: [f64; 2],
    max: [f64; 2],
    materials: u16,
    next_id: u64,
}

impl ParticleGenerator {
    /// Particles uniformly placed in `[min, max)` with material ids below `materials`.
    pub fn new(seed: u64, min: [f64; 2], max: [f64; 2], materials: u16) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            min,
            max,
            materials: materials.max(1),
            next_id: 0,
        }
    }

    /// Uniform `f64` in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        (self.rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Next particle: unit mass, travelled distance 1.
    pub fn next_particle(&mut self) -> ParticleRecord {
        let x = self.min[0] + self.unit() * (self.max[0] - self.min[0]);
        let y = self.min[1] + self.unit() * (self.max[1] - self.min[1]);
        let material = MaterialId((self.rng.next_u32() % self.materials as u32) as u16);
        let id = self.next_id;
        self.next_id += 1;
        ParticleRecord::new(id, [x, y, 0.0], material, 1.0).with_travelled_distance(1.0)
    }

    /// The next `n` particles.
    pub fn take(&mut self, n: usize) -> Vec<ParticleRecord> {
        (0..n).map(|_| self.next_particle()).collect()
    }
}

/// A row of `n` unit squares along x, each split into two triangles,
/// with full adjacency.
///
/// Square `i` spans `[i, i+1) × [0, 1)`. Triangle `2i` is its lower-right
/// half, `2i + 1` its upper-left half.
pub fn strip_mesh(n: u32) -> Mesh {
    let n = n.max(1);
    let mut vertices = Vec::with_capacity(2 * (n as usize + 1));
    for i in 0..=n {
        vertices.push([i as f64, 0.0, 0.0]);
    }
    for i in 0..=n {
        vertices.push([i as f64, 1.0, 0.0]);
    }
    let mut triangles = Vec::with_capacity(2 * n as usize);
    let mut neighbours = Vec::with_capacity(2 * n as usize);
    for i in 0..n {
        let (bl, br, tl, tr) = (i, i + 1, n + 1 + i, n + 2 + i);
        let lower = 2 * i;
        let upper = 2 * i + 1;
        triangles.push([bl, br, tr]);
        neighbours.push([(i + 1 < n).then_some(upper + 2), Some(upper), None]);
        triangles.push([bl, tr, tl]);
        neighbours.push([None, (i > 0).then(|| lower - 2), Some(lower)]);
    }
    Mesh {
        vertices,
        triangles,
        neighbours,
    }
}

/// An `n × n` grid of unit cells at the origin over `times`, one material.
pub fn unit_grid(n: u32, times: TimeAxis, policy: SyncPolicy) -> RectangleRaster {
    let geometry = RectangleGeometry {
        origin: [0.0, 0.0],
        cell_size: [1.0, 1.0],
        counts: [n.max(1), n.max(1)],
    };
    match RectangleRaster::new(geometry, RasterOptions::new(times, 1).with_policy(policy)) {
        Ok(raster) => raster,
        Err(e) => panic!("unit grid fixture is valid by construction: {e}"),
    }
}
