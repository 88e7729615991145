//! # cellgrid
//!
//! cellgrid is a distributed, adaptively refinable Cartesian cell grid for
//! scientific computing. Cells are partitioned across cooperating ranks, can
//! be locally refined and coarsened at runtime, and boundary cells are kept
//! synchronized with read-only copies of remotely owned neighbor data through
//! an asynchronous halo-exchange protocol.
//!
//! ## Features
//! - Dense octree-style cell identifiers encoding refinement level and
//!   position, with parent/child navigation
//! - Cartesian and stretched-Cartesian geometry mappings
//! - Level-bridging neighbor discovery over a configurable stencil
//! - Pluggable load balancing (recursive coordinate bisection, random,
//!   METIS behind `metis-support`) consumed through a narrow oracle contract
//! - Pluggable communication backends (serial, in-process threads, MPI
//!   behind `mpi-support`) for halo exchange and payload migration
//! - Collective refinement/unrefinement with refine-wins precedence
//! - Binary grid snapshots with rank-parallel writes, and a legacy VTK writer
//!
//! ## Determinism
//!
//! Collective decisions (load balancing, refinement application) are computed
//! from replicated state with deterministic algorithms, so every rank arrives
//! at the same grid without negotiation. The random load balancer draws from
//! a caller-supplied seed.
//!
//! ## Usage
//!
//! ```
//! use cellgrid::prelude::*;
//!
//! let comm = NoComm;
//! let mut grid: Grid<u64> = GridBuilder::new([10, 10, 1])
//!     .neighborhood_size(1)
//!     .max_refinement_level(0)
//!     .build(comm)
//!     .unwrap();
//! grid.balance_load().unwrap();
//! let cells = grid.get_cells();
//! for cell in cells {
//!     *grid.get_mut(cell).unwrap() = cell.get();
//! }
//! grid.update_copies_of_remote_neighbors().unwrap();
//! ```

pub mod comm;
pub mod data;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod io;
pub mod partition;
pub mod topology;

/// A convenient prelude importing the most-used traits and types.
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{CommTag, Communicator, NoComm, ThreadComm, Wait};
    pub use crate::data::codec::{PayloadCodec, PodCodec};
    pub use crate::error::GridError;
    pub use crate::geometry::{CartesianGeometry, GridGeometry, StretchedGeometry};
    pub use crate::grid::{Grid, GridBuilder};
    #[cfg(feature = "metis-support")]
    pub use crate::partition::MetisPartitioner;
    pub use crate::partition::{Partitioner, RandomPartitioner, RcbPartitioner};
    pub use crate::topology::cell::CellId;
    pub use crate::topology::mapping::CellMapping;
    pub use crate::topology::neighborhood::Neighborhood;
    pub use crate::topology::neighbors::Neighbor;
}
