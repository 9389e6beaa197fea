//! Lock-step round engine for Plume particle-transport runs.
//!
//! A [`Controller`] drives N worker threads through discrete simulation
//! rounds with a [`ThreadBarrier`]: every worker steps exactly once per
//! round, and simulated time only advances after all of them are done.
//!
//! # Architecture
//!
//! ```text
//! Controller (caller thread)
//! ├── ThreadBarrier (Mutex + 2 Condvars, atomic SimTime)
//! ├── runner thread × N ── Worker::step per round
//! │   ├── MeasurementWorker: MeasurementCadence over MonitoredEntity timelines
//! │   ├── ParticleMovementWorker: particle updates → raster / timelines
//! │   └── FnWorker: closures
//! └── StepFault channel (runner → controller)
//! ```
//!
//! Step errors and panics are caught by the runner and reported; they
//! never stall a round. Barrier misuse is fatal and poisons the barrier
//! so every party fails fast instead of hanging.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod barrier;
pub mod cadence;
pub mod config;
pub mod controller;
pub mod measurement;
pub mod metrics;
pub mod movement;
pub mod runner;
pub mod timeline;
pub mod worker;

pub use barrier::{BarrierState, Release, RoundSummary, ThreadBarrier};
pub use cadence::{CadenceEvent, CadenceMode, MeasurementCadence};
pub use config::{ConfigError, RunConfig};
pub use controller::{Controller, RunReport};
pub use measurement::MeasurementWorker;
pub use metrics::{RoundMetrics, RunMetrics};
pub use movement::{Location, MovementStats, ParticleMovementWorker, ParticleUpdate};
pub use runner::{spawn_worker, CancelToken, StepFault, WorkerExit};
pub use timeline::{EntityKind, MonitoredEntity, TimeLine};
pub use worker::{FnCallback, FnWorker, RoundCallback, StepContext, Worker};
