//! Benchmark profiles and utilities for the Plume measurement framework.
//!
//! Provides pre-built rasters and runs for benchmarking and examples:
//!
//! - [`reference_raster`]: 100x100 grid (10K cells), one hour of minute samples
//! - [`stress_raster`]: 316x316 grid (~100K cells), same axis
//! - [`reference_run`]: transport workers measuring seeded particles each round

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use plume_core::{TimeAxis, WorkerError};
use plume_engine::{ConfigError, Controller, FnWorker, RunConfig, RunReport, StepContext};
use plume_raster::{
    MeasurementRaster, RasterError, RasterOptions, RectangleGeometry, RectangleRaster, SyncPolicy,
};
use plume_test_utils::ParticleGenerator;

/// Cell edge length of the benchmark grids, in metres.
pub const CELL_SIZE: f64 = 10.0;

/// Materials carried by benchmark particles.
pub const MATERIALS: u16 = 3;

/// One hour sampled every minute: 61 stamps.
pub fn reference_axis() -> TimeAxis {
    // Constant shape; cannot fail.
    match TimeAxis::uniform(0, 60_000, 61) {
        Ok(axis) => axis,
        Err(e) => unreachable!("reference axis is valid: {e}"),
    }
}

fn square_raster(n: u32, policy: SyncPolicy) -> Result<RectangleRaster, RasterError> {
    let geometry = RectangleGeometry {
        origin: [0.0, 0.0],
        cell_size: [CELL_SIZE, CELL_SIZE],
        counts: [n, n],
    };
    RectangleRaster::new(
        geometry,
        RasterOptions::new(reference_axis(), MATERIALS).with_policy(policy),
    )
}

/// 100x100 grid (10K cells).
pub fn reference_raster(policy: SyncPolicy) -> Result<RectangleRaster, RasterError> {
    square_raster(100, policy)
}

/// 316x316 grid (~100K cells).
pub fn stress_raster(policy: SyncPolicy) -> Result<RectangleRaster, RasterError> {
    square_raster(316, policy)
}

/// A particle generator covering a square grid of `n` cells per side.
pub fn grid_particles(seed: u64, n: u32) -> ParticleGenerator {
    let extent = n as f64 * CELL_SIZE;
    ParticleGenerator::new(seed, [0.0, 0.0], [extent, extent], MATERIALS)
}

/// Shape of a [`reference_run`].
#[derive(Clone, Debug)]
pub struct ReferenceRun {
    /// Transport worker threads.
    pub workers: usize,
    /// Particles each worker measures per round.
    pub particles_per_round: usize,
    /// Rounds to run.
    pub rounds: i64,
    /// Base seed; worker `i` uses `seed + i`.
    pub seed: u64,
}

impl Default for ReferenceRun {
    fn default() -> Self {
        Self {
            workers: 4,
            particles_per_round: 1_000,
            rounds: 60,
            seed: 42,
        }
    }
}

/// Run `shape` against `raster`: each transport worker measures
/// `particles_per_round` fresh particles every round, one round per
/// simulated second.
///
/// Particles cover the 100x100 reference extent.
pub fn reference_run(
    shape: &ReferenceRun,
    raster: Arc<dyn MeasurementRaster>,
) -> Result<RunReport, ConfigError> {
    let mut controller = Controller::new(RunConfig {
        start_ms: 0,
        end_ms: (shape.rounds - 1).max(0) * 1000,
        dt_ms: 1000,
        checkpoint_every: 0,
        round_warn_ms: 0,
    });
    for i in 0..shape.workers {
        let raster = Arc::clone(&raster);
        let mut particles = grid_particles(shape.seed + i as u64, 100);
        let batch = shape.particles_per_round;
        controller.add_worker(Box::new(FnWorker::new(
            format!("transport-{i}"),
            move |ctx: &StepContext| -> Result<(), WorkerError> {
                for _ in 0..batch {
                    let p = particles.next_particle();
                    raster.measure_particle(ctx.time, &p);
                }
                Ok(())
            },
        )));
    }
    controller.run()
}
