//! Per-cell payload storage and the wire codec contract.

pub mod arena;
pub mod codec;

pub use arena::CellArena;
pub use codec::{PayloadCodec, PodCodec};
