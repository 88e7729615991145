//! Thin façade over the message transport.
//!
//! Messages are contiguous byte slices. Point-to-point operations are
//! non-blocking and return waitable handles; the grid calls `.wait()` before
//! it trusts any buffer. Collectives (barrier, all-gather) block until every
//! rank of the group arrives — entering them in mismatched order across
//! ranks is a caller bug with undefined results.

pub mod thread;
pub mod wire;

#[cfg(feature = "mpi-support")]
pub mod mpi;

pub use thread::ThreadComm;

#[cfg(feature = "mpi-support")]
pub use mpi::MpiComm;

/// A message tag separating independent communication epochs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(u16);

impl CommTag {
    /// Tags at or above this value are reserved for transport internals.
    pub const RESERVED_BASE: u16 = 0xFF00;

    pub const fn new(raw: u16) -> Self {
        CommTag(raw)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

/// Non-blocking communication interface (minimal by design).
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait + Send;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait + Send;

    /// This participant's rank, in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of participants.
    fn size(&self) -> usize;

    /// Posts a non-blocking send of `buf` to `peer`.
    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> Self::SendHandle;

    /// Posts a non-blocking receive of exactly `len` bytes from `peer`.
    fn irecv(&self, peer: usize, tag: CommTag, len: usize) -> Self::RecvHandle;

    /// Blocks until every participant has entered the barrier.
    fn barrier(&self);

    /// Collects every participant's contribution, ordered by rank.
    ///
    /// Contributions may differ in length; this is the primitive used to
    /// compute per-rank file offsets for snapshot output.
    fn all_gather(&self, bytes: &[u8]) -> Vec<Vec<u8>>;
}

/// Anything that can be waited on.
pub trait Wait {
    /// Waits for completion and returns the received data, if any.
    ///
    /// Send handles return `None`; receive handles return the payload.
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Compile-time no-op transport for single-rank runs and serial unit tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn isend(&self, peer: usize, _tag: CommTag, _buf: &[u8]) -> () {
        debug_assert_eq!(peer, 0, "NoComm has no peers to send to");
    }

    fn irecv(&self, peer: usize, _tag: CommTag, _len: usize) -> () {
        debug_assert_eq!(peer, 0, "NoComm has no peers to receive from");
    }

    fn barrier(&self) {}

    fn all_gather(&self, bytes: &[u8]) -> Vec<Vec<u8>> {
        vec![bytes.to_vec()]
    }
}
