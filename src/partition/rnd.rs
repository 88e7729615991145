//! Random ownership assignment, reproducible by seed.
//!
//! Useful for shaking out neighbor-list and exchange bugs that a spatially
//! smooth assignment would hide. All ranks must configure the same seed.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::GridError;
use crate::partition::{PartitionInput, Partitioner};

/// Seeded random oracle.
#[derive(Clone, Copy, Debug)]
pub struct RandomPartitioner {
    seed: u64,
}

impl RandomPartitioner {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Default for RandomPartitioner {
    fn default() -> Self {
        Self { seed: 0x5EED }
    }
}

impl Partitioner for RandomPartitioner {
    fn partition(
        &self,
        input: &PartitionInput<'_>,
        n_parts: usize,
    ) -> Result<Vec<usize>, GridError> {
        if n_parts == 0 {
            return Err(GridError::Partitioner("zero ranks requested".into()));
        }
        let mut rng = SmallRng::seed_from_u64(self.seed);
        Ok(input
            .cells
            .iter()
            .map(|_| rng.gen_range(0..n_parts))
            .collect())
    }
}
