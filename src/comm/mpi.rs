//! MPI transport backend (feature `mpi-support`).
//!
//! Non-blocking operations are posted against a static scope with owned,
//! leaked buffers that are reclaimed when the handle is waited on; every
//! handle must therefore be waited exactly once, which the grid's exchange
//! state machine guarantees.

use mpi::datatype::PartitionMut;
use mpi::request::{Request, StaticScope};
use mpi::topology::SystemCommunicator;
use mpi::traits::{Communicator as MpiCommunicator, CommunicatorCollectives, Destination, Source};
use mpi::Tag;

use crate::comm::{CommTag, Communicator, Wait};

/// Transport over `MPI_COMM_WORLD`.
///
/// Create at most one per process, before any other MPI activity.
pub struct MpiComm {
    _universe: mpi::environment::Universe,
    world: SystemCommunicator,
}

// The grid drives its communicator from a single thread; MPI itself is used
// at the default single-threaded level.
unsafe impl Send for MpiComm {}
unsafe impl Sync for MpiComm {}

impl MpiComm {
    /// Initializes MPI and binds to the world communicator.
    ///
    /// Returns `None` if MPI was already initialized in this process.
    pub fn initialize() -> Option<Self> {
        let universe = mpi::initialize()?;
        let world = universe.world();
        Some(Self {
            _universe: universe,
            world,
        })
    }
}

fn as_tag(tag: CommTag) -> Tag {
    tag.as_u16() as Tag
}

/// Waitable send with an owned in-flight buffer.
pub struct MpiSendHandle {
    req: Request<'static, [u8], StaticScope>,
    buf: *mut [u8],
}

// The raw buffer pointer is only touched after the request completes.
unsafe impl Send for MpiSendHandle {}

impl Wait for MpiSendHandle {
    fn wait(self) -> Option<Vec<u8>> {
        self.req.wait_without_status();
        unsafe { drop(Box::from_raw(self.buf)) };
        None
    }
}

/// Waitable receive with an owned in-flight buffer.
pub struct MpiRecvHandle {
    req: Request<'static, [u8], StaticScope>,
    buf: *mut [u8],
}

unsafe impl Send for MpiRecvHandle {}

impl Wait for MpiRecvHandle {
    fn wait(self) -> Option<Vec<u8>> {
        self.req.wait_without_status();
        let boxed = unsafe { Box::from_raw(self.buf) };
        Some(boxed.into_vec())
    }
}

impl Communicator for MpiComm {
    type SendHandle = MpiSendHandle;
    type RecvHandle = MpiRecvHandle;

    fn rank(&self) -> usize {
        MpiCommunicator::rank(&self.world) as usize
    }

    fn size(&self) -> usize {
        MpiCommunicator::size(&self.world) as usize
    }

    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> MpiSendHandle {
        let leaked: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
        let ptr = leaked as *mut [u8];
        let req = self
            .world
            .process_at_rank(peer as i32)
            .immediate_send_with_tag(StaticScope, &*leaked, as_tag(tag));
        MpiSendHandle { req, buf: ptr }
    }

    fn irecv(&self, peer: usize, tag: CommTag, len: usize) -> MpiRecvHandle {
        let leaked: &'static mut [u8] = Box::leak(vec![0u8; len].into_boxed_slice());
        let ptr = leaked as *mut [u8];
        let req = self
            .world
            .process_at_rank(peer as i32)
            .immediate_receive_into_with_tag(StaticScope, leaked, as_tag(tag));
        MpiRecvHandle { req, buf: ptr }
    }

    fn barrier(&self) {
        self.world.barrier();
    }

    fn all_gather(&self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let n = Communicator::size(self);
        let mut counts = vec![0i32; n];
        self.world
            .all_gather_into(&(bytes.len() as i32), &mut counts[..]);
        let displs: Vec<i32> = counts
            .iter()
            .scan(0i32, |acc, &c| {
                let d = *acc;
                *acc += c;
                Some(d)
            })
            .collect();
        let total: i32 = counts.iter().sum();
        let mut all = vec![0u8; total as usize];
        {
            let mut partition = PartitionMut::new(&mut all[..], &counts[..], &displs[..]);
            self.world.all_gather_varcount_into(bytes, &mut partition);
        }
        counts
            .iter()
            .zip(displs.iter())
            .map(|(&c, &d)| all[d as usize..(d + c) as usize].to_vec())
            .collect()
    }
}
