//! Geometry mappings from cell ids to physical coordinates.
//!
//! Geometry is immutable once attached to a grid, except through a wholesale
//! replacement (`Grid::set_geometry`). All lookups go through the
//! [`GridGeometry`] trait so a grid can be instantiated over either the
//! uniform Cartesian mapping or the stretched variant with explicit per-axis
//! breakpoints.

mod cartesian;
mod stretched;

pub use cartesian::CartesianGeometry;
pub use stretched::StretchedGeometry;

use crate::error::GridError;
use crate::topology::cell::CellId;
use crate::topology::mapping::CellMapping;

/// Physical-coordinate mapping for one grid.
pub trait GridGeometry: Send + Sync + 'static {
    /// Checks the geometry against the grid shape it is attached to.
    fn validate(&self, mapping: &CellMapping) -> Result<(), GridError>;

    /// The physical coordinate of the domain's minimum corner.
    fn domain_origin(&self) -> [f64; 3];

    /// Extents of the first level-0 cell per axis.
    fn base_cell_length(&self) -> [f64; 3];

    /// Center point of `cell`.
    fn center(&self, mapping: &CellMapping, cell: CellId) -> [f64; 3];

    /// Per-axis extents of `cell`.
    fn cell_length(&self, mapping: &CellMapping, cell: CellId) -> [f64; 3];

    /// The cell at the given refinement level containing `point`, or `None`
    /// if the point lies outside the domain or the level is too deep.
    fn cell_at(&self, mapping: &CellMapping, point: [f64; 3], level: u32) -> Option<CellId>;
}
