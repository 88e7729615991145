//! The payload wire codec: how cell data travels between ranks.
//!
//! The halo exchange, payload migration, and the snapshot writer all move
//! payloads as fixed-size plain-old-data records. The caller supplies the
//! codec; [`PodCodec`] covers payload types that already are `Pod`.

use bytemuck::Pod;

/// Encodes payload values into fixed-size wire records and back.
pub trait PayloadCodec<V>: Send + Sync + 'static {
    /// The on-wire representation; must be plain old data so buffers can be
    /// cast to bytes without copies on the send side.
    type Wire: Pod;

    fn encode(value: &V) -> Self::Wire;

    fn decode(wire: &Self::Wire) -> V;
}

/// Identity codec for payload types that are already `Pod`.
#[derive(Copy, Clone, Debug, Default)]
pub struct PodCodec;

impl<V: Pod + Send + Sync + 'static> PayloadCodec<V> for PodCodec {
    type Wire = V;

    #[inline]
    fn encode(value: &V) -> V {
        *value
    }

    #[inline]
    fn decode(wire: &V) -> V {
        *wire
    }
}
