//! The asynchronous halo exchange: `start` / `wait` remote neighbor copy
//! updates.
//!
//! Both sides derive their schedules from the replicated owner map, so the
//! sender's packing order and the receiver's unpacking order agree without
//! any size negotiation: cells are transferred in ascending id order as
//! fixed-size codec records.

use log::trace;

use crate::comm::{Communicator, Wait};
use crate::comm::wire::{cast_records, read_records};
use crate::data::codec::PayloadCodec;
use crate::error::GridError;
use crate::geometry::GridGeometry;
use crate::grid::{ExchangeState, Grid, HALO_TAG};

impl<V, G, C, D> Grid<V, G, C, D>
where
    V: Default,
    G: GridGeometry,
    C: Communicator,
    D: PayloadCodec<V>,
{
    /// Begins refreshing the copies of remote neighbors.
    ///
    /// Posts one receive per producing rank and sends this rank's boundary
    /// payloads as they are at the moment of the call, then returns
    /// immediately. Until the matching
    /// [`wait_remote_neighbor_copy_updates`](Self::wait_remote_neighbor_copy_updates)
    /// returns, remote neighbor copies must not be read; cells in
    /// [`inner_cells`](Self::inner_cells) are safe to compute on meanwhile.
    ///
    /// # Panics
    /// Panics if an exchange is already in flight.
    pub fn start_remote_neighbor_copy_updates(&mut self) -> Result<(), GridError> {
        self.assert_idle("start_remote_neighbor_copy_updates");

        let record = std::mem::size_of::<D::Wire>();
        let mut recvs = Vec::with_capacity(self.recv_schedule.len());
        for (&peer, ids) in &self.recv_schedule {
            trace!(
                "rank {}: expecting {} cells from rank {peer}",
                self.comm().rank(),
                ids.len()
            );
            let handle = self.comm().irecv(peer, HALO_TAG, ids.len() * record);
            recvs.push((peer, handle));
        }

        let mut sends = Vec::with_capacity(self.send_schedule.len());
        for (&peer, ids) in &self.send_schedule {
            let wires: Vec<D::Wire> = ids
                .iter()
                .map(|&id| {
                    let payload = self
                        .cells
                        .get(id)
                        .expect("send schedule lists a cell this rank does not own");
                    D::encode(payload)
                })
                .collect();
            trace!(
                "rank {}: sending {} cells to rank {peer}",
                self.comm().rank(),
                ids.len()
            );
            sends.push(self.comm().isend(peer, HALO_TAG, cast_records(&wires)));
        }

        self.exchange = ExchangeState::InFlight { sends, recvs };
        Ok(())
    }

    /// Blocks until the in-flight exchange completes.
    ///
    /// Afterwards every remote neighbor copy holds its owner's payload as of
    /// the matching `start` call, even if the owner has mutated the cell
    /// since.
    ///
    /// # Panics
    /// Panics if no exchange is in flight.
    pub fn wait_remote_neighbor_copy_updates(&mut self) -> Result<(), GridError> {
        let state = std::mem::replace(&mut self.exchange, ExchangeState::Idle);
        let ExchangeState::InFlight { sends, recvs } = state else {
            panic!("wait_remote_neighbor_copy_updates without a matching start");
        };

        for (peer, handle) in recvs {
            let data = handle.wait().ok_or_else(|| GridError::Transport {
                peer,
                detail: "receive completed without data".into(),
            })?;
            let ids = &self.recv_schedule[&peer];
            let wires = read_records::<D::Wire>(peer, &data)?;
            if wires.len() != ids.len() {
                return Err(GridError::Transport {
                    peer,
                    detail: format!("expected {} cell records, got {}", ids.len(), wires.len()),
                });
            }
            for (&id, wire) in ids.iter().zip(wires.iter()) {
                let copy = self
                    .remote_copies
                    .get_mut(id)
                    .expect("receive schedule lists a cell without a copy slot");
                *copy = D::decode(wire);
            }
        }

        for send in sends {
            send.wait();
        }
        Ok(())
    }

    /// Convenience wrapper: start and immediately wait.
    pub fn update_copies_of_remote_neighbors(&mut self) -> Result<(), GridError> {
        self.start_remote_neighbor_copy_updates()?;
        self.wait_remote_neighbor_copy_updates()
    }
}
