//! `GridError`: unified error type for cellgrid public APIs.
//!
//! Configuration and I/O failures are reported through this type.
//! Usage-protocol violations (waiting on an exchange that was never started,
//! refining a cell the rank does not own, decoding an id outside the valid
//! range) indicate caller bugs that would corrupt global consistency if
//! ignored; those panic instead and are documented per method.

use thiserror::Error;

/// Unified error type for cellgrid operations.
#[derive(Debug, Error)]
pub enum GridError {
    /// Grid length must be non-zero along every axis.
    #[error("invalid grid length {0:?}: every axis must be non-zero")]
    InvalidGridLength([u64; 3]),

    /// The requested maximum refinement level does not fit the id space.
    #[error("refinement level {requested} exceeds maximum {maximum} supported by this grid length")]
    InvalidRefinementLevel { requested: u32, maximum: u32 },

    /// An invalid neighborhood stencil was supplied.
    #[error("invalid neighborhood: {0}")]
    InvalidNeighborhood(String),

    /// Stretched-geometry breakpoints must be strictly increasing.
    #[error("coordinates along axis {axis} are not strictly increasing")]
    NonMonotonicCoordinates { axis: usize },

    /// Geometry does not match the grid it is attached to.
    #[error("geometry mismatch along axis {axis}: expected {expected} breakpoints, got {actual}")]
    GeometryMismatch {
        axis: usize,
        expected: usize,
        actual: usize,
    },

    /// The partitioning oracle failed or returned a malformed assignment.
    #[error("partitioner error: {0}")]
    Partitioner(String),

    /// The transport delivered a message of unexpected shape.
    #[error("transport error with peer {peer}: {detail}")]
    Transport { peer: usize, detail: String },

    /// A snapshot file did not parse as the expected format.
    #[error("snapshot format error: {0}")]
    SnapshotFormat(String),

    /// Underlying I/O failure; the grid state itself is unaffected.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
