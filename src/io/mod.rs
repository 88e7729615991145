//! Grid output: binary snapshots and legacy VTK files.

pub mod snapshot;
pub mod vtk;

pub use snapshot::{read_snapshot, write_snapshot, Snapshot};
pub use vtk::write_vtk;
