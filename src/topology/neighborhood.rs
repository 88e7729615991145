//! Neighborhood stencils: which nearby positions count as neighbors.
//!
//! The stencil is fixed when the grid is built and shared by all ranks.
//! Offsets are expressed in cells at the refinement level of the cell whose
//! neighbors are being resolved.

use crate::error::GridError;

/// The offset pattern defining a cell's neighbors.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Neighborhood {
    offsets: Vec<[i64; 3]>,
}

impl Neighborhood {
    /// The full cube stencil of the given radius, origin excluded.
    ///
    /// Radius 1 yields the 26-cell Moore neighborhood. Offsets are ordered
    /// x-fastest, then y, then z, which fixes the discovery order of
    /// neighbor lists.
    ///
    /// # Errors
    /// `InvalidNeighborhood` if `size` is zero.
    pub fn cube(size: u32) -> Result<Self, GridError> {
        if size == 0 {
            return Err(GridError::InvalidNeighborhood(
                "neighborhood size must be at least 1".into(),
            ));
        }
        let r = size as i64;
        let mut offsets = Vec::with_capacity(((2 * size + 1).pow(3) - 1) as usize);
        for dz in -r..=r {
            for dy in -r..=r {
                for dx in -r..=r {
                    if (dx, dy, dz) != (0, 0, 0) {
                        offsets.push([dx, dy, dz]);
                    }
                }
            }
        }
        Ok(Self { offsets })
    }

    /// A user-defined stencil from explicit offsets.
    ///
    /// # Errors
    /// `InvalidNeighborhood` if the list is empty, contains the origin, or
    /// contains duplicates.
    pub fn from_offsets(offsets: Vec<[i64; 3]>) -> Result<Self, GridError> {
        if offsets.is_empty() {
            return Err(GridError::InvalidNeighborhood(
                "offset list must not be empty".into(),
            ));
        }
        if offsets.contains(&[0, 0, 0]) {
            return Err(GridError::InvalidNeighborhood(
                "offset list must not contain the origin".into(),
            ));
        }
        let mut seen = hashbrown::HashSet::with_capacity(offsets.len());
        for off in &offsets {
            if !seen.insert(*off) {
                return Err(GridError::InvalidNeighborhood(format!(
                    "duplicate offset {off:?}"
                )));
            }
        }
        Ok(Self { offsets })
    }

    /// The stencil offsets in discovery order.
    #[inline]
    pub fn offsets(&self) -> &[[i64; 3]] {
        &self.offsets
    }
}
