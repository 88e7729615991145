//! In-process transport: ranks are threads of one process.
//!
//! A communicator group shares a mailbox keyed by `(source, destination,
//! tag)`; each key holds a FIFO queue, so repeated exchanges on one tag
//! cannot overtake each other. Receives poll the mailbox and sends never
//! block, which keeps the grid's post-receives-then-send pattern free of
//! rendezvous deadlocks.
//!
//! The group state is scoped to the communicators created together by
//! [`ThreadComm::group`]; independent groups in one process cannot interfere.

use std::collections::VecDeque;
use std::sync::{Arc, Barrier};

use bytes::Bytes;
use dashmap::DashMap;

use crate::comm::{CommTag, Communicator, Wait};

type Key = (usize, usize, u16); // (src, dst, tag)

const GATHER_TAG: CommTag = CommTag::new(CommTag::RESERVED_BASE);

struct Shared {
    size: usize,
    mailbox: DashMap<Key, VecDeque<Bytes>>,
    barrier: Barrier,
}

impl Shared {
    fn push(&self, key: Key, payload: Bytes) {
        self.mailbox.entry(key).or_default().push_back(payload);
    }

    fn pop(&self, key: Key) -> Option<Bytes> {
        self.mailbox.get_mut(&key)?.pop_front()
    }
}

/// One rank of an in-process communicator group.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.shared.size)
            .finish()
    }
}

impl ThreadComm {
    /// Creates a connected group of `size` communicators, one per rank.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        assert!(size > 0, "communicator group must have at least one rank");
        let shared = Arc::new(Shared {
            size,
            mailbox: DashMap::new(),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    fn recv_blocking(&self, key: Key) -> Bytes {
        loop {
            if let Some(payload) = self.shared.pop(key) {
                return payload;
            }
            std::thread::yield_now();
        }
    }
}

/// Waitable receive posted on a [`ThreadComm`].
pub struct ThreadRecvHandle {
    comm: ThreadComm,
    key: Key,
    expected_len: usize,
}

impl Wait for ThreadRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let payload = self.comm.recv_blocking(self.key);
        debug_assert_eq!(
            payload.len(),
            self.expected_len,
            "message length from rank {} does not match the posted receive",
            self.key.0
        );
        Some(payload.to_vec())
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = ThreadRecvHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> () {
        assert!(peer < self.shared.size, "peer {peer} out of range");
        self.shared
            .push((self.rank, peer, tag.as_u16()), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: CommTag, len: usize) -> ThreadRecvHandle {
        assert!(peer < self.shared.size, "peer {peer} out of range");
        ThreadRecvHandle {
            comm: self.clone(),
            key: (peer, self.rank, tag.as_u16()),
            expected_len: len,
        }
    }

    fn barrier(&self) {
        self.shared.barrier.wait();
    }

    fn all_gather(&self, bytes: &[u8]) -> Vec<Vec<u8>> {
        for peer in 0..self.shared.size {
            if peer != self.rank {
                self.isend(peer, GATHER_TAG, bytes);
            }
        }
        let mut out = vec![Vec::new(); self.shared.size];
        out[self.rank] = bytes.to_vec();
        for peer in 0..self.shared.size {
            if peer != self.rank {
                out[peer] = self.recv_blocking((peer, self.rank, GATHER_TAG.as_u16())).to_vec();
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_two_ranks() {
        let comms = ThreadComm::group(2);
        let tag = CommTag::new(7);
        let c1 = comms[1].clone();
        let handle = std::thread::spawn(move || {
            let recv = c1.irecv(0, tag, 4);
            recv.wait().expect("payload from rank 0")
        });
        comms[0].isend(1, tag, &[1, 2, 3, 4]).wait();
        assert_eq!(handle.join().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn same_tag_messages_stay_ordered() {
        let comms = ThreadComm::group(2);
        let tag = CommTag::new(9);
        comms[0].isend(1, tag, &[1]);
        comms[0].isend(1, tag, &[2]);
        assert_eq!(comms[1].irecv(0, tag, 1).wait(), Some(vec![1]));
        assert_eq!(comms[1].irecv(0, tag, 1).wait(), Some(vec![2]));
    }

    #[test]
    fn all_gather_orders_by_rank() {
        let comms = ThreadComm::group(3);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let mine = vec![comm.rank() as u8; comm.rank() + 1];
                    comm.all_gather(&mine)
                })
            })
            .collect();
        for handle in handles {
            let gathered = handle.join().unwrap();
            assert_eq!(gathered, vec![vec![0u8], vec![1, 1], vec![2, 2, 2]]);
        }
    }

    #[test]
    fn barrier_releases_all_ranks() {
        let comms = ThreadComm::group(4);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| std::thread::spawn(move || comm.barrier()))
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
