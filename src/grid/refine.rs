//! Collective refinement and unrefinement.
//!
//! Marks accumulate locally between collective steps; `stop_refining`
//! gathers them, closes the refine set under the one-level neighbor-gap
//! rule, resolves refine/unrefine conflicts (refine wins), and applies the
//! surviving changes identically on every rank.

use std::collections::BTreeSet;

use log::debug;

use crate::comm::wire::{decode_mark_block, encode_mark_block};
use crate::comm::Communicator;
use crate::data::codec::PayloadCodec;
use crate::error::GridError;
use crate::geometry::GridGeometry;
use crate::grid::Grid;
use crate::topology::cell::CellId;
use crate::topology::neighbors::neighbors_of;

impl<V, G, C, D> Grid<V, G, C, D>
where
    V: Default,
    G: GridGeometry,
    C: Communicator,
    D: PayloadCodec<V>,
{
    /// Marks a local cell for subdivision at the next
    /// [`stop_refining`](Self::stop_refining).
    ///
    /// Returns `false` if the cell is already at the maximum refinement
    /// level, `true` otherwise (marking is idempotent). Refining a cell may
    /// force coarser neighbors to refine with it, on whichever rank owns
    /// them.
    ///
    /// # Panics
    /// Panics if `cell` is not owned by this rank.
    pub fn refine_completely(&mut self, cell: CellId) -> bool {
        assert!(
            self.is_local(cell),
            "refine_completely: cell {cell} is not owned by rank {}",
            self.rank()
        );
        if self.mapping.level_of(cell) == self.mapping.max_refinement_level() {
            return false;
        }
        self.pending_refines.insert(cell);
        true
    }

    /// Marks a local cell's family for merging back into its parent at the
    /// next [`stop_refining`](Self::stop_refining).
    ///
    /// Returns `false` for level-0 cells, which have no parent. The merge
    /// happens only if every sibling still exists as a leaf and no
    /// conflicting refinement wins over it.
    ///
    /// # Panics
    /// Panics if `cell` is not owned by this rank.
    pub fn unrefine_completely(&mut self, cell: CellId) -> bool {
        assert!(
            self.is_local(cell),
            "unrefine_completely: cell {cell} is not owned by rank {}",
            self.rank()
        );
        match self.mapping.parent_of(cell) {
            Some(parent) => {
                self.pending_unrefines.insert(parent);
                true
            }
            None => false,
        }
    }

    /// Applies all marks accumulated across the group since the previous
    /// call.
    ///
    /// Collective: every rank must call this in the same logical step.
    /// Refined parents are destroyed and replaced by their eight children
    /// on the parent's owner; merged families are destroyed and replaced by
    /// their re-created parent on the lowest-id child's owner. New cells
    /// carry default payloads for the caller to populate. Returns the newly
    /// created local cells, ascending.
    ///
    /// Neighbor lists and exchange schedules are rebuilt, but the load may
    /// now be skewed; follow up with [`balance_load`](Self::balance_load).
    ///
    /// # Panics
    /// Panics if a remote neighbor copy update is in flight.
    ///
    /// # Errors
    /// Transport shape violations while gathering marks.
    pub fn stop_refining(&mut self) -> Result<Vec<CellId>, GridError> {
        self.assert_idle("stop_refining");
        let me = self.comm().rank();

        // 1. gather every rank's marks
        let my_refines: Vec<CellId> = self.pending_refines.iter().copied().collect();
        let my_unrefines: Vec<CellId> = self.pending_unrefines.iter().copied().collect();
        let block = encode_mark_block(&my_refines, &my_unrefines);
        let gathered = self.comm().all_gather(&block);

        let mut refine_set: BTreeSet<CellId> = BTreeSet::new();
        let mut merge_parents: BTreeSet<CellId> = BTreeSet::new();
        for (peer, bytes) in gathered.iter().enumerate() {
            let (refines, unrefines) = decode_mark_block(peer, bytes)?;
            refine_set.extend(refines);
            merge_parents.extend(unrefines);
        }
        self.pending_refines.clear();
        self.pending_unrefines.clear();

        // 2. close the refine set: a refined cell may not leave a neighbor
        // two levels coarser than its children
        loop {
            let mut induced: Vec<CellId> = Vec::new();
            for &cell in &refine_set {
                let level = self.mapping.level_of(cell);
                let neighbors =
                    neighbors_of(&self.mapping, &self.owners, &self.neighborhood, cell);
                for id in neighbors.iter().flat_map(|n| n.ids()) {
                    if self.mapping.level_of(id) < level && !refine_set.contains(&id) {
                        induced.push(id);
                    }
                }
            }
            if induced.is_empty() {
                break;
            }
            refine_set.extend(induced);
        }

        // 3. refine wins over unrefine
        let surviving: Vec<CellId> = merge_parents
            .into_iter()
            .filter(|&parent| self.merge_is_safe(parent, &refine_set))
            .collect();

        // 4. apply refinements
        let mut new_local: Vec<CellId> = Vec::new();
        for &cell in &refine_set {
            let owner = self
                .owners
                .remove(&cell)
                .expect("refine mark for a cell that does not exist");
            for child in self.mapping.children_of(cell) {
                self.owners.insert(child, owner);
                if owner == me {
                    self.cells.insert(child, V::default());
                    new_local.push(child);
                }
            }
            if owner == me {
                self.cells.remove(cell);
                self.weights.remove(&cell);
            }
        }

        // 5. apply surviving merges
        for &parent in &surviving {
            let children = self.mapping.children_of(parent);
            let owner = self.owners[&children[0]];
            for &child in &children {
                self.owners.remove(&child);
                if self.cells.remove(child).is_some() {
                    self.weights.remove(&child);
                }
            }
            self.owners.insert(parent, owner);
            if owner == me {
                self.cells.insert(parent, V::default());
                new_local.push(parent);
            }
        }

        debug!(
            "rank {me}: stop_refining split {} cells, merged {} families, {} new local",
            refine_set.len(),
            surviving.len(),
            new_local.len()
        );

        self.rebuild_caches();
        new_local.sort_unstable();
        Ok(new_local)
    }

    /// A merge may proceed only if all siblings exist as leaves, none is
    /// being refined, and no neighbor is or becomes finer than the
    /// siblings.
    fn merge_is_safe(&self, parent: CellId, refine_set: &BTreeSet<CellId>) -> bool {
        let children = self.mapping.children_of(parent);
        if children.is_empty() {
            return false;
        }
        for &child in &children {
            if !self.owners.contains_key(&child) || refine_set.contains(&child) {
                return false;
            }
            let child_level = self.mapping.level_of(child);
            let neighbors =
                neighbors_of(&self.mapping, &self.owners, &self.neighborhood, child);
            for id in neighbors.iter().flat_map(|n| n.ids()) {
                let level = self.mapping.level_of(id);
                if level > child_level {
                    return false;
                }
                if level == child_level && refine_set.contains(&id) {
                    return false;
                }
            }
        }
        true
    }
}
