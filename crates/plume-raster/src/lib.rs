//! Concurrent measurement rasters for Plume simulations.
//!
//! A raster counts particles (and accumulates their mass) per spatial
//! cell, per time index and per material. Particle-movement workers
//! write into it from many threads at once while the rest of the
//! application may read it at any time.
//!
//! # Architecture
//!
//! ```text
//! MeasurementRaster (trait: measure, particles_counted, reset, ...)
//! ├── RectangleRaster: axis-aligned grid, MutexCellLock per cell
//! └── TriangleRaster:  triangle mesh, SpinCellLock per cell
//!     └── SparseCells (shared): rows of lazily allocated CellBlocks
//! ```
//!
//! # Synchronization
//!
//! [`SyncPolicy`] is chosen once at construction:
//!
//! - **Locked:** per-cell lock around each update. Exact. Default.
//! - **Atomic:** lock-free atomic increments. Exact.
//! - **Unsynchronized:** plain load/store. Lost updates are possible
//!   under contention; use only for single-writer rasters.
//!
//! Storage for a cell is created on first write. Cells never written
//! cost one empty slot in their row.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod lock;
pub mod mesh;
pub mod raster;
pub mod rectangle;
mod sparse;

pub use config::{RasterOptions, SyncPolicy};
pub use error::RasterError;
pub use lock::{CellLock, MutexCellLock, SpinCellLock};
pub use mesh::{Mesh, TriangleRaster};
pub use raster::MeasurementRaster;
pub use rectangle::{RectangleGeometry, RectangleRaster};

// Compile-time assertion: rasters are shared by reference across worker threads.
#[allow(dead_code)]
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<RectangleRaster>();
    assert::<TriangleRaster>();
};
