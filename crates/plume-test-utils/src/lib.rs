//! Test fixtures for Plume development.
//!
//! Provides scripted [`Worker`](plume_engine::Worker) implementations,
//! seeded particle generators, and small meshes and grids for building
//! test scenarios.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod particles;

pub use fixtures::{
    BrokenHooksWorker, CountingWorker, FailingWorker, PanickingWorker, RecordingWorker,
    SleepyWorker,
};
pub use particles::{strip_mesh, unit_grid, ParticleGenerator};
