//! Recursive coordinate bisection: the default geometric oracle.
//!
//! The cell set is split along the axis with the widest center spread so
//! that the weight on each side matches the number of ranks assigned to it,
//! then both sides recurse. Ties are broken by cell id, making the
//! assignment a pure function of the input.

use itertools::Itertools;

use crate::error::GridError;
use crate::partition::{PartitionInput, Partitioner};

/// Deterministic recursive coordinate bisection.
#[derive(Clone, Copy, Debug, Default)]
pub struct RcbPartitioner;

impl Partitioner for RcbPartitioner {
    fn partition(
        &self,
        input: &PartitionInput<'_>,
        n_parts: usize,
    ) -> Result<Vec<usize>, GridError> {
        if n_parts == 0 {
            return Err(GridError::Partitioner("zero ranks requested".into()));
        }
        let n = input.cells.len();
        let mut assignment = vec![0usize; n];
        let mut order: Vec<usize> = (0..n).collect();
        bisect(input, &mut order, 0, n_parts, &mut assignment);
        Ok(assignment)
    }
}

fn bisect(
    input: &PartitionInput<'_>,
    indices: &mut [usize],
    part_lo: usize,
    part_hi: usize,
    assignment: &mut [usize],
) {
    if part_hi - part_lo <= 1 || indices.len() <= 1 {
        for &i in indices.iter() {
            assignment[i] = part_lo;
        }
        return;
    }

    let axis = widest_axis(input, indices);
    indices.sort_unstable_by(|&a, &b| {
        input.centers[a][axis]
            .total_cmp(&input.centers[b][axis])
            .then_with(|| input.cells[a].cmp(&input.cells[b]))
    });

    let left_parts = (part_hi - part_lo) / 2;
    let frac = left_parts as f64 / (part_hi - part_lo) as f64;
    let total: f64 = indices.iter().map(|&i| input.weights[i]).sum();
    let target = frac * total;

    let mut acc = 0.0;
    let mut split = indices.len() - 1;
    for (pos, &i) in indices.iter().enumerate() {
        acc += input.weights[i];
        if acc >= target {
            split = pos + 1;
            break;
        }
    }
    // both halves must stay populated while parts remain on each side
    let split = split.clamp(1, indices.len() - 1);

    let (left, right) = indices.split_at_mut(split);
    bisect(input, left, part_lo, part_lo + left_parts, assignment);
    bisect(input, right, part_lo + left_parts, part_hi, assignment);
}

fn widest_axis(input: &PartitionInput<'_>, indices: &[usize]) -> usize {
    let mut best = (0usize, f64::NEG_INFINITY);
    for axis in 0..3 {
        let spread = match indices.iter().map(|&i| input.centers[i][axis]).minmax() {
            itertools::MinMaxResult::NoElements => 0.0,
            itertools::MinMaxResult::OneElement(_) => 0.0,
            itertools::MinMaxResult::MinMax(lo, hi) => hi - lo,
        };
        if spread > best.1 {
            best = (axis, spread);
        }
    }
    best.0
}
