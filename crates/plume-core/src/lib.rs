//! Core types for the Plume simulation barrier and measurement rasters.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental vocabulary shared by the rest of the workspace:
//! strongly-typed IDs, the simulation clock value, the measurement
//! time axis, particle records, and the error types that cross crate
//! boundaries.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod particle;
pub mod time;

pub use error::{BarrierError, ProtocolViolation, TimeAxisError, WorkerError};
pub use id::{MaterialId, RoundId, SimTime, WorkerId};
pub use particle::{ParticleRecord, Position};
pub use time::TimeAxis;
