//! Plume: a lock-step particle measurement runtime.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Plume sub-crates. For most users, adding `plume` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use plume::prelude::*;
//!
//! // A 4×4 grid of 1 m cells, sampled every 10 s for one minute.
//! let times = TimeAxis::uniform(0, 10_000, 7).unwrap();
//! let geometry = RectangleGeometry {
//!     origin: [0.0, 0.0],
//!     cell_size: [1.0, 1.0],
//!     counts: [4, 4],
//! };
//! let raster = Arc::new(RectangleRaster::new(geometry, RasterOptions::new(times, 1)).unwrap());
//!
//! // Two workers, each dropping one particle per round into its own cell.
//! let mut controller = Controller::new(RunConfig {
//!     end_ms: 9_000,
//!     ..RunConfig::default()
//! });
//! for i in 0..2u32 {
//!     let raster = Arc::clone(&raster);
//!     controller.add_worker(Box::new(FnWorker::new(format!("w{i}"), move |ctx: &StepContext| {
//!         raster.measure(ctx.time, &[i as f64 + 0.5, 0.5, 0.0], MaterialId(0), 1.0);
//!         Ok(())
//!     })));
//! }
//! let report = controller.run().unwrap();
//! assert_eq!(report.rounds, 10);
//! assert_eq!(raster.particles_counted(0, 0, MaterialId(0)), 10);
//! assert_eq!(raster.max_particle_count(), 10);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `plume-core` | IDs, simulation time, time axes, particle records, errors |
//! | [`raster`] | `plume-raster` | Rectangle and triangle-mesh measurement rasters |
//! | [`engine`] | `plume-engine` | Round barrier, workers, cadences, run controller |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types and errors (`plume-core`).
///
/// Contains [`types::SimTime`], [`types::TimeAxis`],
/// [`types::ParticleRecord`] and the barrier and worker error types.
pub use plume_core as types;

/// Measurement rasters (`plume-raster`).
///
/// The [`raster::MeasurementRaster`] trait with its two variants:
/// [`raster::RectangleRaster`] and [`raster::TriangleRaster`].
pub use plume_raster as raster;

/// Lock-step runtime (`plume-engine`).
///
/// [`engine::ThreadBarrier`] for direct barrier use,
/// [`engine::Controller`] for managed runs.
pub use plume_engine as engine;

/// Common imports for typical Plume usage.
///
/// ```rust
/// use plume::prelude::*;
/// ```
///
/// This imports the most frequently used types: run configuration, the
/// worker contract, raster types, and core ids.
pub mod prelude {
    // Core types
    pub use plume_core::{
        MaterialId, ParticleRecord, Position, RoundId, SimTime, TimeAxis, WorkerId,
    };

    // Errors
    pub use plume_core::{BarrierError, ProtocolViolation, WorkerError};

    // Rasters
    pub use plume_raster::{
        MeasurementRaster, Mesh, RasterError, RasterOptions, RectangleGeometry, RectangleRaster,
        SyncPolicy, TriangleRaster,
    };

    // Engine
    pub use plume_engine::{
        CadenceMode, ConfigError, Controller, EntityKind, FnCallback, FnWorker, MeasurementWorker,
        MonitoredEntity, ParticleMovementWorker, RunConfig, RunReport, StepContext, ThreadBarrier,
        Worker,
    };
}
