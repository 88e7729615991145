//! Load-balanced ownership assignment through an external oracle.
//!
//! The grid supplies whatever the oracle needs — cell count, geometric
//! centers, per-cell weights, and the neighbor adjacency as a CSR graph —
//! and consumes the returned assignment verbatim. It never second-guesses or
//! repairs an assignment; a malformed one (wrong length, rank out of range)
//! is rejected as an error before any state changes.
//!
//! Every rank runs the oracle over identical replicated input, so the
//! oracle must be deterministic for the grid to stay globally consistent.

mod rcb;
mod rnd;

#[cfg(feature = "metis-support")]
mod metis_oracle;

pub use rcb::RcbPartitioner;
pub use rnd::RandomPartitioner;

#[cfg(feature = "metis-support")]
pub use metis_oracle::MetisPartitioner;

use crate::error::GridError;
use crate::topology::cell::CellId;

/// Neighbor adjacency in compressed sparse row form.
///
/// `xadj` has one entry per vertex plus a terminator; vertex `i`'s neighbor
/// indices are `adjncy[xadj[i]..xadj[i+1]]`, indices into the same cell
/// ordering the rest of [`PartitionInput`] uses.
#[derive(Clone, Debug, Default)]
pub struct CellGraph {
    pub xadj: Vec<usize>,
    pub adjncy: Vec<usize>,
}

impl CellGraph {
    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.xadj.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Neighbor indices of vertex `i`.
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.adjncy[self.xadj[i]..self.xadj[i + 1]]
    }
}

/// Callback data handed to the partitioning oracle.
pub struct PartitionInput<'a> {
    /// All existing cells, ascending by id.
    pub cells: &'a [CellId],
    /// Load-balancing weight per cell, parallel to `cells`.
    pub weights: &'a [f64],
    /// Geometric cell center per cell, parallel to `cells`.
    pub centers: &'a [[f64; 3]],
    /// Neighbor adjacency over indices into `cells`.
    pub adjacency: &'a CellGraph,
}

/// The external partitioning oracle deciding cell-to-rank ownership.
pub trait Partitioner: Send + Sync {
    /// Returns one owner rank (`< n_parts`) per input cell.
    fn partition(
        &self,
        input: &PartitionInput<'_>,
        n_parts: usize,
    ) -> Result<Vec<usize>, GridError>;
}

/// Checks the shape of an oracle's answer before it is applied.
pub(crate) fn validate_assignment(
    assignment: &[usize],
    cell_count: usize,
    n_parts: usize,
) -> Result<(), GridError> {
    if assignment.len() != cell_count {
        return Err(GridError::Partitioner(format!(
            "oracle returned {} owners for {} cells",
            assignment.len(),
            cell_count
        )));
    }
    if let Some(&bad) = assignment.iter().find(|&&r| r >= n_parts) {
        return Err(GridError::Partitioner(format!(
            "oracle assigned rank {bad}, but only {n_parts} ranks exist"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csr_neighbors() {
        let graph = CellGraph {
            xadj: vec![0, 2, 3, 3],
            adjncy: vec![1, 2, 0],
        };
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.neighbors(0), &[1, 2]);
        assert_eq!(graph.neighbors(1), &[0]);
        assert_eq!(graph.neighbors(2), &[] as &[usize]);
    }

    #[test]
    fn assignment_shape_is_validated() {
        assert!(validate_assignment(&[0, 1, 0], 3, 2).is_ok());
        assert!(validate_assignment(&[0, 1], 3, 2).is_err());
        assert!(validate_assignment(&[0, 2, 0], 3, 2).is_err());
    }
}
