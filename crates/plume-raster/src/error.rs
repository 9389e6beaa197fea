//! Raster-specific error types.

use std::error::Error;
use std::fmt;

/// Errors from raster construction and lock management.
///
/// Out-of-range measurements are never errors; they are dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RasterError {
    /// The operation is not supported by this raster variant.
    Unsupported {
        /// The unsupported operation.
        operation: &'static str,
        /// Why this variant cannot perform it.
        reason: &'static str,
    },
    /// Geometry or options violate a construction invariant.
    InvalidGeometry {
        /// Description of the violated invariant.
        reason: String,
    },
    /// Mesh arrays are inconsistent.
    InvalidMesh {
        /// Description of the inconsistency.
        reason: String,
    },
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported { operation, reason } => {
                write!(f, "{operation} is not supported: {reason}")
            }
            Self::InvalidGeometry { reason } => write!(f, "invalid raster geometry: {reason}"),
            Self::InvalidMesh { reason } => write!(f, "invalid mesh: {reason}"),
        }
    }
}

impl Error for RasterError {}
