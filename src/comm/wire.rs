//! Fixed, little-endian wire records for the collective protocols.
//!
//! All multi-byte integers in these structs are little-endian on the wire:
//! fields are stored pre-LE with `.to_le()` and decoded with `::from_le()`.
//! Receive buffers come back as plain byte vectors with no alignment
//! guarantee, so records are read with [`read_records`], which copies each
//! record out unaligned.

use bytemuck::{Pod, Zeroable};

use crate::error::GridError;
use crate::topology::cell::CellId;

pub fn cast_records<T: Pod>(records: &[T]) -> &[u8] {
    bytemuck::cast_slice(records)
}

/// Decodes a byte buffer into records of type `T`, tolerating any alignment.
pub fn read_records<T: Pod>(peer: usize, bytes: &[u8]) -> Result<Vec<T>, GridError> {
    let size = std::mem::size_of::<T>();
    if size == 0 || bytes.len() % size != 0 {
        return Err(GridError::Transport {
            peer,
            detail: format!(
                "message of {} bytes is not a whole number of {}-byte records",
                bytes.len(),
                size
            ),
        });
    }
    Ok(bytes
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

/// Count prefix for variable-length record blocks.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCount {
    n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }

    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// A cell id carried on the wire.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireCell {
    id_le: u64,
}

impl WireCell {
    pub fn of(id: CellId) -> Self {
        Self {
            id_le: id.get().to_le(),
        }
    }

    /// # Errors
    /// `Transport` if the wire value is the zero sentinel.
    pub fn get(&self, peer: usize) -> Result<CellId, GridError> {
        CellId::new(u64::from_le(self.id_le)).ok_or(GridError::Transport {
            peer,
            detail: "zero cell id on the wire".into(),
        })
    }
}

/// A per-cell load-balancing weight carried on the wire.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub struct WireWeight {
    id_le: u64,
    weight_bits_le: u64,
}

impl WireWeight {
    pub fn new(id: CellId, weight: f64) -> Self {
        Self {
            id_le: id.get().to_le(),
            weight_bits_le: weight.to_bits().to_le(),
        }
    }

    pub fn id(&self, peer: usize) -> Result<CellId, GridError> {
        CellId::new(u64::from_le(self.id_le)).ok_or(GridError::Transport {
            peer,
            detail: "zero cell id in weight record".into(),
        })
    }

    pub fn weight(&self) -> f64 {
        f64::from_bits(u64::from_le(self.weight_bits_le))
    }
}

// Compile-time layout guarantees.
const _: () = {
    assert!(std::mem::size_of::<WireCount>() == 4);
    assert!(std::mem::size_of::<WireCell>() == 8);
    assert!(std::mem::size_of::<WireWeight>() == 16);
};

/// Encodes a refinement-mark block: refine ids, then unrefine ids.
pub fn encode_mark_block(refines: &[CellId], unrefines: &[CellId]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + 8 * (refines.len() + unrefines.len()));
    for ids in [refines, unrefines] {
        out.extend_from_slice(cast_records(&[WireCount::new(ids.len())]));
        let cells: Vec<WireCell> = ids.iter().map(|&c| WireCell::of(c)).collect();
        out.extend_from_slice(cast_records(&cells));
    }
    out
}

/// Decodes a refinement-mark block produced by [`encode_mark_block`].
pub fn decode_mark_block(peer: usize, bytes: &[u8]) -> Result<(Vec<CellId>, Vec<CellId>), GridError> {
    let mut offset = 0usize;
    let mut blocks = Vec::with_capacity(2);
    for _ in 0..2 {
        let count_size = std::mem::size_of::<WireCount>();
        let header = bytes.get(offset..offset + count_size).ok_or_else(|| GridError::Transport {
            peer,
            detail: "truncated mark block header".into(),
        })?;
        let count: WireCount = bytemuck::pod_read_unaligned(header);
        offset += count_size;
        let body_size = count.get() * std::mem::size_of::<WireCell>();
        let body = bytes.get(offset..offset + body_size).ok_or_else(|| GridError::Transport {
            peer,
            detail: "truncated mark block body".into(),
        })?;
        offset += body_size;
        let ids = read_records::<WireCell>(peer, body)?
            .iter()
            .map(|w| w.get(peer))
            .collect::<Result<Vec<_>, _>>()?;
        blocks.push(ids);
    }
    if offset != bytes.len() {
        return Err(GridError::Transport {
            peer,
            detail: "trailing bytes after mark block".into(),
        });
    }
    let unrefines = blocks.pop().unwrap();
    let refines = blocks.pop().unwrap();
    Ok((refines, unrefines))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> CellId {
        CellId::from_raw(raw)
    }

    #[test]
    fn count_roundtrip() {
        let c = WireCount::new(1234);
        assert_eq!(c.get(), 1234);
    }

    #[test]
    fn cell_record_rejects_zero() {
        let zero = WireCell { id_le: 0 };
        assert!(zero.get(1).is_err());
        assert_eq!(WireCell::of(id(77)).get(0).unwrap(), id(77));
    }

    #[test]
    fn weight_roundtrip() {
        let w = WireWeight::new(id(5), 2.5);
        assert_eq!(w.id(0).unwrap(), id(5));
        assert_eq!(w.weight(), 2.5);
    }

    #[test]
    fn unaligned_reads_are_tolerated() {
        let records = [WireCell::of(id(1)), WireCell::of(id(2))];
        let mut bytes = vec![0u8; 1];
        bytes.extend_from_slice(cast_records(&records));
        let decoded = read_records::<WireCell>(0, &bytes[1..]).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].get(0).unwrap(), id(2));
    }

    #[test]
    fn record_shape_is_checked() {
        assert!(read_records::<WireCell>(0, &[0u8; 7]).is_err());
    }

    #[test]
    fn mark_block_roundtrip() {
        let refines = vec![id(3), id(9)];
        let unrefines = vec![id(4)];
        let bytes = encode_mark_block(&refines, &unrefines);
        let (r, u) = decode_mark_block(0, &bytes).unwrap();
        assert_eq!(r, refines);
        assert_eq!(u, unrefines);
    }

    #[test]
    fn empty_mark_block_roundtrip() {
        let bytes = encode_mark_block(&[], &[]);
        let (r, u) = decode_mark_block(0, &bytes).unwrap();
        assert!(r.is_empty());
        assert!(u.is_empty());
    }

    #[test]
    fn truncated_mark_block_is_rejected() {
        let bytes = encode_mark_block(&[id(1)], &[]);
        assert!(decode_mark_block(0, &bytes[..bytes.len() - 1]).is_err());
    }
}
