//! Graph partitioning through METIS (feature `metis-support`).

use metis::{Graph, Idx};

use crate::error::GridError;
use crate::partition::{PartitionInput, Partitioner};

/// K-way graph partitioning over the neighbor adjacency.
///
/// Weights are scaled to integers; METIS balances their sums per part.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetisPartitioner;

impl Partitioner for MetisPartitioner {
    fn partition(
        &self,
        input: &PartitionInput<'_>,
        n_parts: usize,
    ) -> Result<Vec<usize>, GridError> {
        if n_parts == 0 {
            return Err(GridError::Partitioner("zero ranks requested".into()));
        }
        let n = input.cells.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        if n_parts == 1 {
            return Ok(vec![0; n]);
        }

        let mut xadj: Vec<Idx> = input.adjacency.xadj.iter().map(|&v| v as Idx).collect();
        let mut adjncy: Vec<Idx> = input.adjacency.adjncy.iter().map(|&v| v as Idx).collect();
        // scale fractional weights into the integer domain METIS expects
        let mut vwgt: Vec<Idx> = input
            .weights
            .iter()
            .map(|&w| (w * 1000.0).round().max(1.0) as Idx)
            .collect();
        let mut part = vec![0 as Idx; n];

        Graph::new(1, n_parts as Idx, &mut xadj, &mut adjncy)
            .map_err(|e| GridError::Partitioner(format!("METIS graph setup failed: {e}")))?
            .set_vwgt(&mut vwgt)
            .part_kway(&mut part)
            .map_err(|e| GridError::Partitioner(format!("METIS partitioning failed: {e}")))?;

        Ok(part.into_iter().map(|p| p as usize).collect())
    }
}
