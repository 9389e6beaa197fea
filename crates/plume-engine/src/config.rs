//! Run configuration, validation, and error types.
//!
//! [`RunConfig`] is the input to [`Controller`](crate::Controller).
//! [`validate()`](RunConfig::validate) checks structural invariants
//! before any thread is spawned.

use std::error::Error;
use std::fmt;

use plume_core::{BarrierError, SimTime, TimeAxis, TimeAxisError};

// ── RunConfig ──────────────────────────────────────────────────────

/// Time range and pacing of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Simulation time of the first round, in milliseconds. Default: 0.
    pub start_ms: i64,
    /// Last simulation time that is still released, in milliseconds.
    /// Default: 3 600 000 (one hour).
    pub end_ms: i64,
    /// Round length in milliseconds. Must be positive. Default: 1000.
    pub dt_ms: i64,
    /// Call the checkpoint hook every this many rounds. 0 disables it.
    /// Default: 0.
    pub checkpoint_every: u64,
    /// Warn when a round takes longer than this many wall-clock
    /// milliseconds. 0 disables the warning. Default: 1000.
    pub round_warn_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_ms: 0,
            end_ms: 3_600_000,
            dt_ms: 1000,
            checkpoint_every: 0,
            round_warn_ms: 1000,
        }
    }
}

impl RunConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dt_ms <= 0 {
            return Err(ConfigError::InvalidDt { dt_ms: self.dt_ms });
        }
        if self.end_ms < self.start_ms {
            return Err(ConfigError::InvalidRange {
                start_ms: self.start_ms,
                end_ms: self.end_ms,
            });
        }
        Ok(())
    }

    /// Number of rounds a full run releases.
    pub fn round_count(&self) -> u64 {
        if self.dt_ms <= 0 || self.end_ms < self.start_ms {
            return 0;
        }
        ((self.end_ms - self.start_ms) / self.dt_ms) as u64 + 1
    }

    /// Simulation time of the first round.
    pub fn start_time(&self) -> SimTime {
        SimTime(self.start_ms)
    }

    /// A uniform measurement axis from `start_ms` to `end_ms` sampled
    /// every `interval_ms`.
    pub fn measurement_axis(&self, interval_ms: i64) -> Result<TimeAxis, ConfigError> {
        self.validate()?;
        let count = if interval_ms > 0 {
            ((self.end_ms - self.start_ms) / interval_ms) as usize + 1
        } else {
            0
        };
        TimeAxis::uniform(self.start_ms, interval_ms, count).map_err(ConfigError::InvalidTimeAxis)
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors from run configuration and from driving a run.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// A measurement time axis could not be built.
    InvalidTimeAxis(TimeAxisError),
    /// `dt_ms` is zero or negative.
    InvalidDt {
        /// The invalid value.
        dt_ms: i64,
    },
    /// `end_ms` lies before `start_ms`.
    InvalidRange {
        /// Configured start.
        start_ms: i64,
        /// Configured end.
        end_ms: i64,
    },
    /// `run()` was called with no workers.
    NoWorkers,
    /// A worker thread could not be spawned.
    ThreadSpawnFailed {
        /// OS error description.
        reason: String,
    },
    /// The barrier failed while the run was in progress.
    Barrier(BarrierError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimeAxis(e) => write!(f, "invalid time axis: {e}"),
            Self::InvalidDt { dt_ms } => write!(f, "dt_ms must be positive, got {dt_ms}"),
            Self::InvalidRange { start_ms, end_ms } => {
                write!(f, "end_ms ({end_ms}) is before start_ms ({start_ms})")
            }
            Self::NoWorkers => write!(f, "no workers registered"),
            Self::ThreadSpawnFailed { reason } => {
                write!(f, "failed to spawn worker thread: {reason}")
            }
            Self::Barrier(e) => write!(f, "barrier failure: {e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidTimeAxis(e) => Some(e),
            Self::Barrier(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BarrierError> for ConfigError {
    fn from(e: BarrierError) -> Self {
        Self::Barrier(e)
    }
}
