//! Raster construction options.

use plume_core::TimeAxis;

use crate::error::RasterError;

/// How concurrent `measure()` calls into the same cell are reconciled.
///
/// Fixed at construction. Only [`Locked`](SyncPolicy::Locked) and
/// [`Atomic`](SyncPolicy::Atomic) give exact totals under concurrency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Per-cell lock around each update. Exact.
    #[default]
    Locked,
    /// Lock-free atomic increment and CAS mass accumulation. Exact.
    Atomic,
    /// Plain load-then-store increments. Concurrent writers to the same
    /// cell may lose updates; use only for descriptive/visual output
    /// where throughput matters more than exact counts.
    Unsynchronized,
}

impl SyncPolicy {
    /// Map the classic on/off toggle: `true` → `Locked`, `false` → `Unsynchronized`.
    pub fn from_synchronized(synchronized: bool) -> Self {
        if synchronized {
            Self::Locked
        } else {
            Self::Unsynchronized
        }
    }

    /// Whether this policy guarantees exact totals under concurrent writers.
    pub fn is_exact(self) -> bool {
        !matches!(self, Self::Unsynchronized)
    }
}

/// Options shared by every raster variant.
///
/// Immutable after the raster is built.
#[derive(Clone, Debug)]
pub struct RasterOptions {
    /// Measurement time axis; its length is the raster's time dimension.
    pub times: TimeAxis,
    /// Number of material classes (material ids `0..materials`).
    pub materials: u16,
    /// Concurrency policy for per-cell updates.
    pub policy: SyncPolicy,
    /// Particles that travelled less than this (m) are not measured.
    /// Default: 0.0.
    pub min_travel_length: f64,
}

impl RasterOptions {
    /// Options with the default `Locked` policy and no travel threshold.
    pub fn new(times: TimeAxis, materials: u16) -> Self {
        Self {
            times,
            materials,
            policy: SyncPolicy::default(),
            min_travel_length: 0.0,
        }
    }

    /// Replace the sync policy.
    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the minimum travel length.
    pub fn with_min_travel_length(mut self, min_travel_length: f64) -> Self {
        self.min_travel_length = min_travel_length;
        self
    }

    /// Number of time indices.
    pub fn number_of_times(&self) -> usize {
        self.times.len()
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), RasterError> {
        if self.materials == 0 {
            return Err(RasterError::InvalidGeometry {
                reason: "at least one material is required".into(),
            });
        }
        if !self.min_travel_length.is_finite() || self.min_travel_length < 0.0 {
            return Err(RasterError::InvalidGeometry {
                reason: format!(
                    "min_travel_length must be finite and non-negative, got {}",
                    self.min_travel_length
                ),
            });
        }
        Ok(())
    }
}
