//! `CellMapping`: the bijection between cell ids and (level, index) triples.
//!
//! Level-0 cells tile the domain and occupy ids `1 ..= nx*ny*nz` in
//! x-fastest order. Each further refinement level appends its full block of
//! ids immediately after the previous one, eight children per refined cell
//! (the index space doubles along every axis per level). The mapping is a
//! total bijection over `[1, max_id]`; everything above `max_id` is invalid.

use crate::error::GridError;
use crate::topology::cell::CellId;

/// Encodes and decodes cell identifiers for one grid shape.
///
/// A `CellMapping` is cheap to copy and immutable; grids hand out references
/// to it for geometry and neighbor computations.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CellMapping {
    length: [u64; 3],
    max_refinement_level: u32,
    /// `level_offsets[l]` is the first id of level `l`;
    /// the last entry is one past the greatest valid id.
    level_offsets: Vec<u64>,
}

impl CellMapping {
    /// Builds a mapping for a grid of `length` level-0 cells per axis and
    /// the given maximum refinement level.
    ///
    /// # Errors
    /// `InvalidGridLength` if any axis is zero, `InvalidRefinementLevel` if
    /// the id space for the requested depth does not fit in `u64`.
    pub fn new(length: [u64; 3], max_refinement_level: u32) -> Result<Self, GridError> {
        if length.iter().any(|&l| l == 0) {
            return Err(GridError::InvalidGridLength(length));
        }
        let cap = Self::max_refinement_level_for(length)
            .ok_or(GridError::InvalidGridLength(length))?;
        if max_refinement_level > cap {
            return Err(GridError::InvalidRefinementLevel {
                requested: max_refinement_level,
                maximum: cap,
            });
        }

        let count0 = length[0] as u128 * length[1] as u128 * length[2] as u128;
        let mut level_offsets = Vec::with_capacity(max_refinement_level as usize + 2);
        let mut next: u128 = 1;
        level_offsets.push(1u64);
        for level in 0..=max_refinement_level {
            next += count0 << (3 * level);
            level_offsets.push(next as u64);
        }

        Ok(Self {
            length,
            max_refinement_level,
            level_offsets,
        })
    }

    /// The deepest refinement level whose ids still fit in `u64` for this
    /// grid length, or `None` if even level 0 does not fit.
    pub fn max_refinement_level_for(length: [u64; 3]) -> Option<u32> {
        let count0 = length[0] as u128 * length[1] as u128 * length[2] as u128;
        // the one-past-the-end level offset must itself fit in u64
        if count0 == 0 || count0 >= u64::MAX as u128 {
            return None;
        }
        let mut total: u128 = count0;
        let mut level = 0u32;
        loop {
            let next_block = count0 << (3 * (level + 1));
            if total + next_block >= u64::MAX as u128 {
                return Some(level);
            }
            total += next_block;
            level += 1;
        }
    }

    /// Level-0 grid length per axis.
    #[inline]
    pub fn length(&self) -> [u64; 3] {
        self.length
    }

    /// The deepest refinement level this mapping addresses.
    #[inline]
    pub fn max_refinement_level(&self) -> u32 {
        self.max_refinement_level
    }

    /// Index-space dimensions at `level`: the level-0 length doubled per level.
    #[inline]
    pub fn level_length(&self, level: u32) -> [u64; 3] {
        [
            self.length[0] << level,
            self.length[1] << level,
            self.length[2] << level,
        ]
    }

    /// Number of cell ids at `level`.
    #[inline]
    pub fn cell_count(&self, level: u32) -> u64 {
        let [w, h, d] = self.level_length(level);
        w * h * d
    }

    /// Greatest valid cell id.
    #[inline]
    pub fn max_id(&self) -> u64 {
        *self.level_offsets.last().unwrap() - 1
    }

    /// Whether `id` lies within the valid id range of this mapping.
    #[inline]
    pub fn contains(&self, id: CellId) -> bool {
        id.get() <= self.max_id()
    }

    /// Encodes a (level, index) position as a cell id.
    ///
    /// Returns `None` if `level` exceeds the maximum or the index is outside
    /// the level's index space.
    pub fn encode(&self, level: u32, index: [u64; 3]) -> Option<CellId> {
        if level > self.max_refinement_level {
            return None;
        }
        let [w, h, d] = self.level_length(level);
        let [ix, iy, iz] = index;
        if ix >= w || iy >= h || iz >= d {
            return None;
        }
        let raw = self.level_offsets[level as usize] + ix + w * (iy + h * iz);
        // raw >= 1 and within the precomputed level block by construction
        Some(CellId::from_raw(raw))
    }

    /// Decodes a cell id into its (level, index) position.
    ///
    /// # Panics
    /// Panics if `id` is outside the valid range; an out-of-range id reaching
    /// this point means the grid's structural state is corrupt, which is not
    /// recoverable.
    #[track_caller]
    pub fn decode(&self, id: CellId) -> (u32, [u64; 3]) {
        let raw = id.get();
        assert!(
            raw <= self.max_id(),
            "cell id {raw} is outside the valid range 1..={} of this grid",
            self.max_id()
        );
        // levels are few; the linear scan beats a binary search in practice
        let mut level = 0u32;
        while self.level_offsets[level as usize + 1] <= raw {
            level += 1;
        }
        let rel = raw - self.level_offsets[level as usize];
        let [w, h, _] = self.level_length(level);
        (level, [rel % w, (rel / w) % h, rel / (w * h)])
    }

    /// Refinement level of `id`.
    ///
    /// # Panics
    /// Panics if `id` is out of range, like [`decode`](Self::decode).
    #[inline]
    #[track_caller]
    pub fn level_of(&self, id: CellId) -> u32 {
        self.decode(id).0
    }

    /// The parent cell one level coarser, or `None` for level-0 cells.
    pub fn parent_of(&self, id: CellId) -> Option<CellId> {
        let (level, [ix, iy, iz]) = self.decode(id);
        if level == 0 {
            return None;
        }
        self.encode(level - 1, [ix / 2, iy / 2, iz / 2])
    }

    /// The eight children one level finer, in x-fastest order; empty if `id`
    /// is already at the maximum refinement level.
    pub fn children_of(&self, id: CellId) -> Vec<CellId> {
        let (level, [ix, iy, iz]) = self.decode(id);
        if level == self.max_refinement_level {
            return Vec::new();
        }
        let mut children = Vec::with_capacity(8);
        for dz in 0..2u64 {
            for dy in 0..2u64 {
                for dx in 0..2u64 {
                    let child = self
                        .encode(level + 1, [2 * ix + dx, 2 * iy + dy, 2 * iz + dz])
                        .expect("child index within doubled level bounds");
                    children.push(child);
                }
            }
        }
        children
    }

    /// The ancestor of `id` at the given coarser `level`.
    ///
    /// Returns `id` itself if `level` equals its level, `None` if `level` is
    /// finer than `id`'s level.
    pub fn ancestor_at(&self, id: CellId, level: u32) -> Option<CellId> {
        let (own_level, [ix, iy, iz]) = self.decode(id);
        if level > own_level {
            return None;
        }
        let shift = own_level - level;
        self.encode(level, [ix >> shift, iy >> shift, iz >> shift])
    }

    /// All level-0 cell ids in ascending order.
    pub fn level0_cells(&self) -> impl Iterator<Item = CellId> + '_ {
        (self.level_offsets[0]..self.level_offsets[1]).map(CellId::from_raw)
    }
}
