//! Level-bridging neighbor discovery.
//!
//! Neighbor relationships are symmetric in area coverage, not in cardinality:
//! a coarse cell may have several fine neighbors across one face, while each
//! of those fine cells sees the single coarse cell. The resolution of one
//! stencil offset is therefore a tagged [`Neighbor`] variant rather than a
//! bare id, and a many-to-one coverage is never collapsed.
//!
//! Positions outside the domain contribute nothing; neighbor sequences never
//! carry sentinel entries.

use crate::topology::cell::CellId;
use crate::topology::mapping::CellMapping;
use crate::topology::neighborhood::Neighborhood;

/// The set of cells that currently exist in the grid.
///
/// Implemented by the grid's owner map; tests use plain hash sets.
pub trait CellSet {
    fn contains_cell(&self, id: CellId) -> bool;
}

impl<V, S: std::hash::BuildHasher> CellSet for hashbrown::HashMap<CellId, V, S> {
    #[inline]
    fn contains_cell(&self, id: CellId) -> bool {
        self.contains_key(&id)
    }
}

impl<S: std::hash::BuildHasher> CellSet for std::collections::HashSet<CellId, S> {
    #[inline]
    fn contains_cell(&self, id: CellId) -> bool {
        self.contains(&id)
    }
}

/// One resolved stencil offset of a cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Neighbor {
    /// The neighboring position is occupied by a cell at the same level.
    SameLevel(CellId),
    /// The neighboring position lies inside a coarser existing cell.
    CoarserAncestor(CellId),
    /// The neighboring position has been refined away; all existing leaf
    /// cells covering it, in id order of discovery.
    FinerCoverage(Vec<CellId>),
}

impl Neighbor {
    /// Iterates the cell ids this entry stands for.
    pub fn ids(&self) -> impl Iterator<Item = CellId> + '_ {
        match self {
            Neighbor::SameLevel(id) | Neighbor::CoarserAncestor(id) => {
                std::slice::from_ref(id).iter().copied()
            }
            Neighbor::FinerCoverage(ids) => ids.iter().copied(),
        }
    }
}

/// Resolves the neighbors of `cell` against the set of existing cells.
///
/// For each stencil offset the candidate position at `cell`'s own level is
/// computed; if a cell exists there it is reported as [`Neighbor::SameLevel`].
/// If the position is covered by a coarser cell, the existing ancestor is
/// reported once ([`Neighbor::CoarserAncestor`]; an ancestor reachable through
/// several offsets is deduplicated, keeping the first discovery position).
/// If the position has been refined away, every existing leaf under it is
/// reported together as [`Neighbor::FinerCoverage`]. Offsets pointing outside
/// the domain are skipped.
///
/// # Panics
/// Panics if `cell` is outside the mapping's valid id range.
pub fn neighbors_of<S: CellSet>(
    mapping: &CellMapping,
    cells: &S,
    hood: &Neighborhood,
    cell: CellId,
) -> Vec<Neighbor> {
    let (level, [ix, iy, iz]) = mapping.decode(cell);
    let [w, h, d] = mapping.level_length(level);

    let mut out = Vec::with_capacity(hood.offsets().len());
    let mut seen_coarse: hashbrown::HashSet<CellId> = hashbrown::HashSet::new();

    for &[dx, dy, dz] in hood.offsets() {
        let tx = ix as i64 + dx;
        let ty = iy as i64 + dy;
        let tz = iz as i64 + dz;
        if tx < 0 || ty < 0 || tz < 0 || tx as u64 >= w || ty as u64 >= h || tz as u64 >= d {
            continue; // domain boundary
        }
        let candidate = mapping
            .encode(level, [tx as u64, ty as u64, tz as u64])
            .expect("in-bounds index encodes");

        if cells.contains_cell(candidate) {
            out.push(Neighbor::SameLevel(candidate));
            continue;
        }

        // coarser? walk up until an existing ancestor is found
        if let Some(ancestor) = existing_ancestor(mapping, cells, candidate) {
            if seen_coarse.insert(ancestor) {
                out.push(Neighbor::CoarserAncestor(ancestor));
            }
            continue;
        }

        // finer? collect the existing leaves covering the candidate area
        let mut leaves = Vec::new();
        collect_leaves(mapping, cells, candidate, &mut leaves);
        if !leaves.is_empty() {
            out.push(Neighbor::FinerCoverage(leaves));
        }
        // a position with neither ancestor nor descendants means the cell
        // set does not cover the domain; leave it to the caller's invariant
        // checks rather than fabricating an entry
    }
    out
}

fn existing_ancestor<S: CellSet>(
    mapping: &CellMapping,
    cells: &S,
    id: CellId,
) -> Option<CellId> {
    let mut current = id;
    while let Some(parent) = mapping.parent_of(current) {
        if cells.contains_cell(parent) {
            return Some(parent);
        }
        current = parent;
    }
    None
}

fn collect_leaves<S: CellSet>(
    mapping: &CellMapping,
    cells: &S,
    id: CellId,
    out: &mut Vec<CellId>,
) {
    for child in mapping.children_of(id) {
        if cells.contains_cell(child) {
            out.push(child);
        } else {
            collect_leaves(mapping, cells, child, out);
        }
    }
}
