//! The grid façade: construction, ownership, neighbor queries, and the
//! collective/point-to-point protocols that keep ranks consistent.

mod balance;
mod exchange;
mod refine;

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;

use log::debug;

use crate::comm::{CommTag, Communicator, NoComm};
use crate::data::arena::CellArena;
use crate::data::codec::{PayloadCodec, PodCodec};
use crate::error::GridError;
use crate::geometry::{CartesianGeometry, GridGeometry};
use crate::partition::{Partitioner, RcbPartitioner};
use crate::topology::cell::CellId;
use crate::topology::mapping::CellMapping;
use crate::topology::neighborhood::Neighborhood;
use crate::topology::neighbors::{neighbors_of, Neighbor};

pub(crate) const HALO_TAG: CommTag = CommTag::new(0x11);
pub(crate) const MIGRATE_TAG: CommTag = CommTag::new(0x22);

enum ExchangeState<C: Communicator> {
    Idle,
    InFlight {
        sends: Vec<C::SendHandle>,
        recvs: Vec<(usize, C::RecvHandle)>,
    },
}

/// A distributed, adaptively refinable Cartesian cell grid.
///
/// One `Grid` lives on each rank of the communicator group. Ownership of
/// cells, neighbor relationships, and the exchange schedules are derived
/// from state replicated identically on every rank, so the collective
/// operations ([`balance_load`](Self::balance_load),
/// [`stop_refining`](Self::stop_refining)) must be entered by all ranks in
/// the same order. Payloads of owned cells are mutated only locally; copies
/// of remote neighbors are refreshed by the
/// [`start`](Self::start_remote_neighbor_copy_updates)/
/// [`wait`](Self::wait_remote_neighbor_copy_updates) exchange pair and are
/// read-only in between.
pub struct Grid<V, G = CartesianGeometry, C = NoComm, D = PodCodec>
where
    C: Communicator,
{
    mapping: CellMapping,
    geometry: G,
    neighborhood: Neighborhood,
    comm: C,
    balancer: Box<dyn Partitioner>,

    /// Replicated cell-to-rank ownership; the key set is the set of
    /// existing cells.
    owners: hashbrown::HashMap<CellId, usize>,

    /// Payloads of cells owned by this rank.
    cells: CellArena<V>,
    /// Read-only replicas of remote cells neighboring local ones.
    remote_copies: CellArena<V>,
    /// Non-default load-balancing weights of local cells.
    weights: hashbrown::HashMap<CellId, f64>,

    // caches derived from `owners`; rebuilt on every topology change
    neighbor_lists: hashbrown::HashMap<CellId, Vec<Neighbor>>,
    flat_neighbors: hashbrown::HashMap<CellId, Vec<CellId>>,
    send_schedule: BTreeMap<usize, Vec<CellId>>,
    recv_schedule: BTreeMap<usize, Vec<CellId>>,
    inner: Vec<CellId>,
    outer: Vec<CellId>,

    pending_refines: BTreeSet<CellId>,
    pending_unrefines: BTreeSet<CellId>,

    exchange: ExchangeState<C>,
    codec: PhantomData<fn() -> D>,
}

/// Configures and creates a [`Grid`].
pub struct GridBuilder<G = CartesianGeometry> {
    length: [u64; 3],
    neighborhood_size: u32,
    neighborhood_offsets: Option<Vec<[i64; 3]>>,
    max_refinement_level: Option<u32>,
    geometry: G,
    balancer: Box<dyn Partitioner>,
}

impl GridBuilder<CartesianGeometry> {
    /// Starts a builder for a grid of `length` level-0 cells per axis, with
    /// unit Cartesian geometry, a size-1 stencil, no refinement, and the
    /// recursive-coordinate-bisection balancer.
    pub fn new(length: [u64; 3]) -> Self {
        Self {
            length,
            neighborhood_size: 1,
            neighborhood_offsets: None,
            max_refinement_level: Some(0),
            geometry: CartesianGeometry::unit(),
            balancer: Box::new(RcbPartitioner),
        }
    }
}

impl<G: GridGeometry> GridBuilder<G> {
    /// Sets the cube-stencil radius (default 1).
    pub fn neighborhood_size(mut self, size: u32) -> Self {
        self.neighborhood_size = size;
        self.neighborhood_offsets = None;
        self
    }

    /// Uses an explicit stencil instead of a cube.
    pub fn neighborhood_offsets(mut self, offsets: Vec<[i64; 3]>) -> Self {
        self.neighborhood_offsets = Some(offsets);
        self
    }

    /// Sets the maximum refinement level (default 0: refinement disabled).
    pub fn max_refinement_level(mut self, level: u32) -> Self {
        self.max_refinement_level = Some(level);
        self
    }

    /// Uses the deepest refinement level the id space supports.
    pub fn max_refinement_level_auto(mut self) -> Self {
        self.max_refinement_level = None;
        self
    }

    /// Replaces the geometry (the grid length stays in cells).
    pub fn geometry<G2: GridGeometry>(self, geometry: G2) -> GridBuilder<G2> {
        GridBuilder {
            length: self.length,
            neighborhood_size: self.neighborhood_size,
            neighborhood_offsets: self.neighborhood_offsets,
            max_refinement_level: self.max_refinement_level,
            geometry,
            balancer: self.balancer,
        }
    }

    /// Replaces the load-balancing oracle (default: RCB).
    pub fn load_balancer<P: Partitioner + 'static>(mut self, balancer: P) -> Self {
        self.balancer = Box::new(balancer);
        self
    }

    /// Builds the grid collectively over `comm`.
    ///
    /// Level-0 cells are dealt out in contiguous ascending-id stripes; call
    /// [`Grid::balance_load`] afterwards for an oracle-driven assignment.
    ///
    /// # Errors
    /// Configuration errors: invalid grid length, refinement depth,
    /// neighborhood, or a geometry that does not match the grid shape.
    pub fn build<V, C, D>(self, comm: C) -> Result<Grid<V, G, C, D>, GridError>
    where
        V: Default,
        C: Communicator,
        D: PayloadCodec<V>,
    {
        let max_level = match self.max_refinement_level {
            Some(level) => level,
            None => CellMapping::max_refinement_level_for(self.length)
                .ok_or(GridError::InvalidGridLength(self.length))?,
        };
        let mapping = CellMapping::new(self.length, max_level)?;
        self.geometry.validate(&mapping)?;
        let neighborhood = match self.neighborhood_offsets {
            Some(offsets) => Neighborhood::from_offsets(offsets)?,
            None => Neighborhood::cube(self.neighborhood_size)?,
        };

        let rank = comm.rank();
        let size = comm.size() as u128;
        let total = mapping.cell_count(0);
        let mut owners = hashbrown::HashMap::with_capacity(total as usize);
        let mut cells = CellArena::new();
        for (i, cell) in mapping.level0_cells().enumerate() {
            let owner = (i as u128 * size / total as u128) as usize;
            owners.insert(cell, owner);
            if owner == rank {
                cells.insert(cell, V::default());
            }
        }
        debug!(
            "rank {rank}: initialized {} of {total} cells (striped)",
            cells.len()
        );

        let mut grid = Grid {
            mapping,
            geometry: self.geometry,
            neighborhood,
            comm,
            balancer: self.balancer,
            owners,
            cells,
            remote_copies: CellArena::new(),
            weights: hashbrown::HashMap::new(),
            neighbor_lists: hashbrown::HashMap::new(),
            flat_neighbors: hashbrown::HashMap::new(),
            send_schedule: BTreeMap::new(),
            recv_schedule: BTreeMap::new(),
            inner: Vec::new(),
            outer: Vec::new(),
            pending_refines: BTreeSet::new(),
            pending_unrefines: BTreeSet::new(),
            exchange: ExchangeState::Idle,
            codec: PhantomData,
        };
        grid.rebuild_caches();
        Ok(grid)
    }
}

impl<V, G, C, D> Grid<V, G, C, D>
where
    V: Default,
    G: GridGeometry,
    C: Communicator,
    D: PayloadCodec<V>,
{
    /// This rank.
    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    /// Number of ranks in the group.
    pub fn size(&self) -> usize {
        self.comm.size()
    }

    /// The id codec of this grid.
    pub fn mapping(&self) -> &CellMapping {
        &self.mapping
    }

    /// The attached geometry.
    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    /// The neighborhood stencil.
    pub fn neighborhood(&self) -> &Neighborhood {
        &self.neighborhood
    }

    /// Replaces the geometry wholesale.
    ///
    /// # Errors
    /// `GeometryMismatch`/`NonMonotonicCoordinates` if the new geometry does
    /// not fit the grid shape; the old geometry stays in place on error.
    pub fn set_geometry(&mut self, geometry: G) -> Result<(), GridError> {
        geometry.validate(&self.mapping)?;
        self.geometry = geometry;
        Ok(())
    }

    /// Cells owned by this rank, ascending by id.
    pub fn get_cells(&self) -> Vec<CellId> {
        self.cells.sorted_ids()
    }

    /// Number of cells owned by this rank.
    pub fn local_cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Whether `cell` exists anywhere in the distributed grid.
    pub fn cell_exists(&self, cell: CellId) -> bool {
        self.owners.contains_key(&cell)
    }

    /// The rank owning `cell`, if it exists.
    pub fn owner_of(&self, cell: CellId) -> Option<usize> {
        self.owners.get(&cell).copied()
    }

    /// Whether `cell` is owned by this rank.
    pub fn is_local(&self, cell: CellId) -> bool {
        self.cells.contains(cell)
    }

    /// Neighbor ids of a local cell in discovery order, or `None` if the
    /// cell is not local. Domain-boundary offsets are omitted, never
    /// reported as sentinels.
    pub fn get_neighbors_of(&self, cell: CellId) -> Option<&[CellId]> {
        self.flat_neighbors.get(&cell).map(|v| v.as_slice())
    }

    /// Neighbor entries of a local cell with their level relationship
    /// preserved (one entry per resolved stencil offset).
    pub fn neighbors_detailed(&self, cell: CellId) -> Option<&[Neighbor]> {
        self.neighbor_lists.get(&cell).map(|v| v.as_slice())
    }

    /// Payload of a local cell or of a cached remote neighbor copy.
    ///
    /// Remote copies are undefined between
    /// [`start_remote_neighbor_copy_updates`](Self::start_remote_neighbor_copy_updates)
    /// and the matching wait, and hold the owner's values as of the last
    /// completed exchange otherwise.
    pub fn get(&self, cell: CellId) -> Option<&V> {
        self.cells.get(cell).or_else(|| self.remote_copies.get(cell))
    }

    /// Mutable payload access; local cells only.
    pub fn get_mut(&mut self, cell: CellId) -> Option<&mut V> {
        self.cells.get_mut(cell)
    }

    /// Local cells all of whose neighbors are local, ascending by id.
    ///
    /// Safe to compute on while an exchange is in flight.
    pub fn inner_cells(&self) -> &[CellId] {
        &self.inner
    }

    /// Local cells with at least one remote neighbor, ascending by id.
    ///
    /// Their neighbor data must not be read until the exchange completes.
    pub fn outer_cells(&self) -> &[CellId] {
        &self.outer
    }

    /// Sets the load-balancing weight of a local cell (default 1.0).
    /// Weights are consumed, and reset, by the next
    /// [`balance_load`](Self::balance_load).
    ///
    /// # Panics
    /// Panics if `cell` is not owned by this rank.
    pub fn set_cell_weight(&mut self, cell: CellId, weight: f64) {
        assert!(
            self.is_local(cell),
            "set_cell_weight: cell {cell} is not owned by rank {}",
            self.rank()
        );
        self.weights.insert(cell, weight);
    }

    /// The load-balancing weight of a local cell.
    pub fn cell_weight(&self, cell: CellId) -> Option<f64> {
        if !self.is_local(cell) {
            return None;
        }
        Some(self.weights.get(&cell).copied().unwrap_or(1.0))
    }

    /// Center point of any existing or addressable cell.
    pub fn cell_center(&self, cell: CellId) -> [f64; 3] {
        self.geometry.center(&self.mapping, cell)
    }

    /// Per-axis extents of any existing or addressable cell.
    pub fn cell_length(&self, cell: CellId) -> [f64; 3] {
        self.geometry.cell_length(&self.mapping, cell)
    }

    /// The cell at `level` containing `point`, or `None` outside the domain.
    pub fn cell_containing(&self, point: [f64; 3], level: u32) -> Option<CellId> {
        self.geometry.cell_at(&self.mapping, point, level)
    }

    /// The underlying transport, e.g. for caller-side collectives.
    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub(crate) fn assert_idle(&self, operation: &str) {
        assert!(
            matches!(self.exchange, ExchangeState::Idle),
            "{operation} while a remote neighbor copy update is in flight"
        );
    }

    /// Recomputes neighbor lists, the exchange schedules, the remote-copy
    /// arena, and the inner/outer split from the replicated owner map.
    pub(crate) fn rebuild_caches(&mut self) {
        self.neighbor_lists.clear();
        self.flat_neighbors.clear();
        self.send_schedule.clear();
        self.recv_schedule.clear();
        self.inner.clear();
        self.outer.clear();

        let me = self.comm.rank();
        let mut all: Vec<CellId> = self.owners.keys().copied().collect();
        all.sort_unstable();

        let mut send_sets: BTreeMap<usize, BTreeSet<CellId>> = BTreeMap::new();
        let mut recv_sets: BTreeMap<usize, BTreeSet<CellId>> = BTreeMap::new();

        for &cell in &all {
            let owner = self.owners[&cell];
            let neighbors = neighbors_of(&self.mapping, &self.owners, &self.neighborhood, cell);
            let flat: Vec<CellId> = neighbors.iter().flat_map(|n| n.ids()).collect();

            if owner == me {
                let mut has_remote = false;
                for &n in &flat {
                    let n_owner = self.owners[&n];
                    if n_owner != me {
                        has_remote = true;
                        recv_sets.entry(n_owner).or_default().insert(n);
                    }
                }
                if has_remote {
                    self.outer.push(cell);
                } else {
                    self.inner.push(cell);
                }
                self.neighbor_lists.insert(cell, neighbors);
                self.flat_neighbors.insert(cell, flat);
            } else {
                // a remote consumer: every local cell it reads must be sent
                for &n in &flat {
                    if self.owners[&n] == me {
                        send_sets.entry(owner).or_default().insert(n);
                    }
                }
            }
        }

        self.send_schedule = send_sets
            .into_iter()
            .map(|(rank, ids)| (rank, ids.into_iter().collect()))
            .collect();
        self.recv_schedule = recv_sets
            .into_iter()
            .map(|(rank, ids)| (rank, ids.into_iter().collect()))
            .collect();

        self.remote_copies.clear();
        for ids in self.recv_schedule.values() {
            for &id in ids {
                self.remote_copies.insert(id, V::default());
            }
        }
    }
}
