//! Collective load balancing: oracle invocation and payload migration.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::comm::wire::{cast_records, read_records, WireWeight};
use crate::comm::{Communicator, Wait};
use crate::data::codec::PayloadCodec;
use crate::error::GridError;
use crate::geometry::GridGeometry;
use crate::grid::{Grid, MIGRATE_TAG};
use crate::partition::{validate_assignment, CellGraph, PartitionInput};
use crate::topology::cell::CellId;
use crate::topology::neighbors::neighbors_of;

impl<V, G, C, D> Grid<V, G, C, D>
where
    V: Default,
    G: GridGeometry,
    C: Communicator,
    D: PayloadCodec<V>,
{
    /// Redistributes cell ownership across all ranks.
    ///
    /// Collective: every rank must call this in the same logical step. The
    /// oracle runs on identical replicated input on every rank (non-default
    /// cell weights are shared first) and its assignment is applied
    /// verbatim: payloads of reassigned cells migrate to their new owners,
    /// arriving cells whose old owner is this rank keep their payload, and
    /// all derived caches are rebuilt. Weights are consumed and reset.
    ///
    /// After return, the owned cell sets of all ranks partition the grid
    /// exactly.
    ///
    /// # Panics
    /// Panics if a remote neighbor copy update is in flight.
    ///
    /// # Errors
    /// Oracle failures and transport shape violations. An error leaves this
    /// rank unchanged, but the group must then abandon the grid: other
    /// ranks may already have applied the step.
    pub fn balance_load(&mut self) -> Result<(), GridError> {
        self.assert_idle("balance_load");
        let me = self.comm().rank();
        let n_ranks = self.comm().size();

        // 1. replicate non-default weights
        let mut weight_records: Vec<WireWeight> = self
            .weights
            .iter()
            .map(|(&cell, &w)| WireWeight::new(cell, w))
            .collect();
        weight_records.sort_unstable_by_key(|r| r.id(me).map(|c| c.get()).unwrap_or(0));
        let gathered = self.comm().all_gather(cast_records(&weight_records));
        let mut weight_map: hashbrown::HashMap<CellId, f64> = hashbrown::HashMap::new();
        for (peer, bytes) in gathered.iter().enumerate() {
            for record in read_records::<WireWeight>(peer, bytes)? {
                weight_map.insert(record.id(peer)?, record.weight());
            }
        }

        // 2. assemble the oracle's callback data
        let mut cells: Vec<CellId> = self.owners.keys().copied().collect();
        cells.sort_unstable();
        let index: hashbrown::HashMap<CellId, usize> = cells
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i))
            .collect();
        let weights: Vec<f64> = cells
            .iter()
            .map(|c| weight_map.get(c).copied().unwrap_or(1.0))
            .collect();
        let centers: Vec<[f64; 3]> = cells
            .iter()
            .map(|&c| self.geometry.center(&self.mapping, c))
            .collect();

        // symmetrized neighbor adjacency, deterministic order
        let mut edges: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (i, &cell) in cells.iter().enumerate() {
            let neighbors =
                neighbors_of(&self.mapping, &self.owners, &self.neighborhood, cell);
            for id in neighbors.iter().flat_map(|n| n.ids()) {
                let j = index[&id];
                if i != j {
                    edges.insert((i.min(j), i.max(j)));
                }
            }
        }
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); cells.len()];
        for &(i, j) in &edges {
            adj[i].push(j);
            adj[j].push(i);
        }
        let mut xadj = Vec::with_capacity(cells.len() + 1);
        let mut adjncy = Vec::new();
        xadj.push(0);
        for list in &adj {
            adjncy.extend_from_slice(list);
            xadj.push(adjncy.len());
        }
        let graph = CellGraph { xadj, adjncy };

        // 3. consult the oracle
        let input = PartitionInput {
            cells: &cells,
            weights: &weights,
            centers: &centers,
            adjacency: &graph,
        };
        let assignment = self.balancer.partition(&input, n_ranks)?;
        validate_assignment(&assignment, cells.len(), n_ranks)?;

        // 4. migrate payloads of reassigned cells
        let mut outgoing: BTreeMap<usize, Vec<CellId>> = BTreeMap::new();
        let mut incoming: BTreeMap<usize, Vec<CellId>> = BTreeMap::new();
        for (i, &cell) in cells.iter().enumerate() {
            let old = self.owners[&cell];
            let new = assignment[i];
            if old == new {
                continue;
            }
            if old == me {
                outgoing.entry(new).or_default().push(cell);
            } else if new == me {
                incoming.entry(old).or_default().push(cell);
            }
        }

        let record = std::mem::size_of::<D::Wire>();
        let mut recvs = Vec::with_capacity(incoming.len());
        for (&peer, ids) in &incoming {
            recvs.push((peer, self.comm().irecv(peer, MIGRATE_TAG, ids.len() * record)));
        }
        let mut sends = Vec::with_capacity(outgoing.len());
        for (&peer, ids) in &outgoing {
            let wires: Vec<D::Wire> = ids
                .iter()
                .map(|&id| D::encode(self.cells.get(id).expect("migrating a cell not owned here")))
                .collect();
            sends.push(self.comm().isend(peer, MIGRATE_TAG, cast_records(&wires)));
        }

        let mut arrived: Vec<(CellId, V)> = Vec::new();
        for (peer, handle) in recvs {
            let data = handle.wait().ok_or_else(|| GridError::Transport {
                peer,
                detail: "migration receive completed without data".into(),
            })?;
            let wires = read_records::<D::Wire>(peer, &data)?;
            let ids = &incoming[&peer];
            if wires.len() != ids.len() {
                return Err(GridError::Transport {
                    peer,
                    detail: format!(
                        "expected {} migrated cells, got {}",
                        ids.len(),
                        wires.len()
                    ),
                });
            }
            for (&id, wire) in ids.iter().zip(wires.iter()) {
                arrived.push((id, D::decode(wire)));
            }
        }
        for send in sends {
            send.wait();
        }

        // 5. apply the new ownership
        let moved_out: usize = outgoing.values().map(|v| v.len()).sum();
        for ids in outgoing.values() {
            for &id in ids {
                self.cells.remove(id);
            }
        }
        let moved_in = arrived.len();
        for (id, value) in arrived {
            self.cells.insert(id, value);
        }
        for (i, &cell) in cells.iter().enumerate() {
            self.owners.insert(cell, assignment[i]);
        }
        self.weights.clear();

        debug!(
            "rank {me}: balance_load moved {moved_out} cells out, {moved_in} in, now owns {}",
            self.cells.len()
        );

        self.rebuild_caches();
        self.comm().barrier();
        Ok(())
    }
}
