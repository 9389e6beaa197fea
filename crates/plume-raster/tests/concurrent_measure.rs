//! Concurrent writer accounting for both raster variants.
//!
//! Eight threads each measure a seeded stream of positions into a shared
//! raster. Under the exact policies the per-cell counts must sum to the
//! number of in-range measurements; under `Unsynchronized` only the
//! upper bound holds.

use std::sync::Arc;
use std::thread;

use plume_core::{MaterialId, SimTime, TimeAxis};
use plume_raster::{
    MeasurementRaster, Mesh, RasterOptions, RectangleGeometry, RectangleRaster, SyncPolicy,
    TriangleRaster,
};
use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Writer threads.
const THREADS: u64 = 8;

/// Measurements per thread.
const PER_THREAD: u64 = 20_000;

fn options(policy: SyncPolicy) -> RasterOptions {
    RasterOptions::new(TimeAxis::uniform(0, 10, 4).unwrap(), 2).with_policy(policy)
}

/// A 4×4 grid on `[0, 4) × [0, 4)`. Few cells, so writers collide often.
fn rectangle(policy: SyncPolicy) -> RectangleRaster {
    RectangleRaster::new(
        RectangleGeometry {
            origin: [0.0, 0.0],
            cell_size: [1.0, 1.0],
            counts: [4, 4],
        },
        options(policy),
    )
    .unwrap()
}

/// Unit square split into two triangles.
fn square_mesh(policy: SyncPolicy) -> TriangleRaster {
    TriangleRaster::new(
        Mesh {
            vertices: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
            ],
            triangles: vec![[0, 1, 2], [0, 2, 3]],
            neighbours: vec![[None, Some(1), None], [None, None, Some(0)]],
        },
        options(policy),
    )
    .unwrap()
}

/// Uniform `f64` in `[0, 1)` from the top 53 bits.
fn unit(rng: &mut ChaCha8Rng) -> f64 {
    (rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
}

/// Hammer `raster` from `THREADS` writers and return how many
/// measurements reported success.
fn hammer<R: MeasurementRaster + 'static>(raster: Arc<R>, extent: f64) -> u64 {
    let handles: Vec<_> = (0..THREADS)
        .map(|seed| {
            let raster = Arc::clone(&raster);
            thread::spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let mut accepted = 0u64;
                for _ in 0..PER_THREAD {
                    let x = unit(&mut rng) * extent;
                    let y = unit(&mut rng) * extent;
                    let t = SimTime((rng.next_u32() % 40) as i64);
                    let material = MaterialId((rng.next_u32() % 2) as u16);
                    if raster.measure(t, &[x, y, 0.0], material, 0.5) {
                        accepted += 1;
                    }
                }
                accepted
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).sum()
}

fn counted<R: MeasurementRaster>(raster: &R) -> u64 {
    let mut total = 0u64;
    for cell in 0..raster.cell_count() {
        for t in 0..raster.number_of_times() {
            total += raster.particles_counted_material_sum(cell, t) as u64;
        }
    }
    total
}

fn mass<R: MeasurementRaster>(raster: &R) -> f64 {
    (0..raster.cell_count()).map(|c| raster.mass_sum(c)).sum()
}

#[test]
fn rectangle_locked_counts_exactly() {
    let raster = Arc::new(rectangle(SyncPolicy::Locked));
    let accepted = hammer(Arc::clone(&raster), 4.0);
    assert_eq!(accepted, THREADS * PER_THREAD);
    assert_eq!(counted(&*raster), accepted);
    assert!((mass(&*raster) - accepted as f64 * 0.5).abs() < 1e-6);
    assert_eq!(raster.allocated_cells(), 16);
}

#[test]
fn rectangle_atomic_counts_exactly() {
    let raster = Arc::new(rectangle(SyncPolicy::Atomic));
    let accepted = hammer(Arc::clone(&raster), 4.0);
    assert_eq!(counted(&*raster), accepted);
    assert!((mass(&*raster) - accepted as f64 * 0.5).abs() < 1e-6);
}

#[test]
fn rectangle_drops_out_of_bounds_writers() {
    // Half the extent lies outside the grid.
    let raster = Arc::new(rectangle(SyncPolicy::Locked));
    let accepted = hammer(Arc::clone(&raster), 8.0);
    assert!(accepted < THREADS * PER_THREAD);
    assert_eq!(counted(&*raster), accepted);
}

#[test]
fn mesh_locked_counts_exactly() {
    let raster = Arc::new(square_mesh(SyncPolicy::Locked));
    let accepted = hammer(Arc::clone(&raster), 1.0);
    assert_eq!(accepted, THREADS * PER_THREAD);
    assert_eq!(counted(&*raster), accepted);
    assert_eq!(raster.break_all_locks(), Ok(0));
}

#[test]
fn mesh_atomic_counts_exactly() {
    let raster = Arc::new(square_mesh(SyncPolicy::Atomic));
    let accepted = hammer(Arc::clone(&raster), 1.0);
    assert_eq!(counted(&*raster), accepted);
}

#[test]
fn unsynchronized_never_overcounts() {
    let raster = Arc::new(rectangle(SyncPolicy::Unsynchronized));
    let accepted = hammer(Arc::clone(&raster), 4.0);
    assert!(counted(&*raster) <= accepted);
    assert!(counted(&*raster) > 0);
}

#[test]
fn reset_after_writers_join() {
    let raster = Arc::new(rectangle(SyncPolicy::Locked));
    hammer(Arc::clone(&raster), 4.0);
    let mut raster = Arc::try_unwrap(raster).ok().unwrap();
    raster.reset();
    assert_eq!(counted(&raster), 0);
    assert_eq!(raster.max_particle_count(), 0);
    assert_eq!(raster.allocated_cells(), 0);
}
