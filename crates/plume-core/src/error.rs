//! Error types shared across the Plume workspace.
//!
//! Organised by subsystem: barrier protocol (fatal misuse), worker step
//! failures (caught and logged, never fatal), and time-axis construction.

use std::error::Error;
use std::fmt;

use crate::id::{RoundId, WorkerId};

/// Misuse of the round barrier protocol.
///
/// These are programming defects, not runtime conditions. The barrier
/// records the first violation and fails every subsequent call with it,
/// so a misbehaving worker cannot deadlock the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A worker called `initialized` twice.
    DuplicateRegistration {
        /// The worker that registered twice.
        worker: WorkerId,
    },
    /// A worker id outside the barrier's expected set.
    UnknownWorker {
        /// The unrecognised worker.
        worker: WorkerId,
        /// Number of workers the barrier expects.
        expected: usize,
    },
    /// A worker registered after the barrier left the registering phase.
    LateRegistration {
        /// The late worker.
        worker: WorkerId,
    },
    /// `loopfinished` called outside a running round, or twice in one round.
    OutOfRound {
        /// The offending worker.
        worker: WorkerId,
        /// The barrier's current round.
        round: RoundId,
    },
    /// A worker that already retired via `request_stop` kept calling in.
    Retired {
        /// The retired worker.
        worker: WorkerId,
    },
    /// The controller drove the barrier out of order (e.g. released a
    /// round while one was still in flight).
    ControllerMisuse {
        /// Description of the misuse.
        reason: String,
    },
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRegistration { worker } => {
                write!(f, "worker {worker} registered twice")
            }
            Self::UnknownWorker { worker, expected } => {
                write!(f, "worker {worker} is not one of the {expected} expected workers")
            }
            Self::LateRegistration { worker } => {
                write!(f, "worker {worker} registered after the barrier was ready")
            }
            Self::OutOfRound { worker, round } => {
                write!(f, "worker {worker} finished outside round {round}")
            }
            Self::Retired { worker } => write!(f, "retired worker {worker} called the barrier"),
            Self::ControllerMisuse { reason } => write!(f, "controller misuse: {reason}"),
        }
    }
}

impl Error for ProtocolViolation {}

/// Errors returned by barrier operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BarrierError {
    /// The barrier protocol was violated (fatal).
    Protocol(ProtocolViolation),
    /// The barrier has been stopped; no further rounds will be released.
    Stopped,
}

impl fmt::Display for BarrierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(v) => write!(f, "protocol violation: {v}"),
            Self::Stopped => write!(f, "barrier stopped"),
        }
    }
}

impl Error for BarrierError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Protocol(v) => Some(v),
            Self::Stopped => None,
        }
    }
}

impl From<ProtocolViolation> for BarrierError {
    fn from(v: ProtocolViolation) -> Self {
        Self::Protocol(v)
    }
}

/// Errors from a worker's per-round step.
///
/// The runner catches these, logs them, reports them to the controller,
/// and still completes the round for the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerError {
    /// The step body failed.
    StepFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// One or more attached round callbacks failed.
    CallbackFailed {
        /// Name of the failing callback.
        name: String,
        /// Human-readable description of the failure.
        reason: String,
    },
    /// An input channel was disconnected.
    ChannelClosed {
        /// Name of the channel.
        channel: String,
    },
    /// The step or a lifecycle hook panicked; the payload message, if any.
    Panicked {
        /// Panic message.
        message: String,
    },
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepFailed { reason } => write!(f, "step failed: {reason}"),
            Self::CallbackFailed { name, reason } => {
                write!(f, "callback '{name}' failed: {reason}")
            }
            Self::ChannelClosed { channel } => write!(f, "channel '{channel}' closed"),
            Self::Panicked { message } => write!(f, "worker panicked: {message}"),
        }
    }
}

impl Error for WorkerError {}

/// Errors constructing a [`TimeAxis`](crate::TimeAxis).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimeAxisError {
    /// The axis has no stamps.
    Empty,
    /// A uniform axis with a zero or negative interval.
    NonPositiveInterval {
        /// The rejected interval.
        interval_ms: i64,
    },
    /// Explicit stamps are not strictly increasing at `index`.
    NotIncreasing {
        /// Index of the first stamp not greater than its predecessor.
        index: usize,
    },
    /// A uniform axis whose stamps would not fit in `i64` milliseconds.
    Overflow {
        /// First stamp.
        start_ms: i64,
        /// Interval between stamps.
        interval_ms: i64,
        /// Number of stamps.
        count: usize,
    },
}

impl fmt::Display for TimeAxisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "time axis has no stamps"),
            Self::NonPositiveInterval { interval_ms } => {
                write!(f, "time axis interval must be positive, got {interval_ms}ms")
            }
            Self::NotIncreasing { index } => {
                write!(f, "time axis stamps not strictly increasing at index {index}")
            }
            Self::Overflow {
                start_ms,
                interval_ms,
                count,
            } => write!(
                f,
                "time axis of {count} stamps every {interval_ms}ms from {start_ms}ms overflows"
            ),
        }
    }
}

impl Error for TimeAxisError {}
