//! Binary grid snapshots, written in parallel.
//!
//! File layout (all integers and floats little-endian):
//!
//! ```text
//! [u64]    time step
//! [f64]×3  domain origin (x, y, z)
//! [f64]×3  base cell length (x, y, z)
//! [u64]×3  grid length in level-0 cells (x, y, z)
//! [i32]    maximum refinement level
//! repeated per cell:
//!   [u64]  cell id
//!   [u64]  application-defined scalar
//! ```
//!
//! Writing is collective: every rank serializes its own cells in ascending
//! id order, learns every rank's contribution size through an all-gather,
//! and writes at the byte offset given by the prefix sum over lower ranks.
//! Rank 0 contributes the header at offset 0.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;

use crate::comm::Communicator;
use crate::data::codec::PayloadCodec;
use crate::error::GridError;
use crate::geometry::GridGeometry;
use crate::grid::Grid;

const HEADER_LEN: usize = 8 + 6 * 8 + 3 * 8 + 4;
const RECORD_LEN: usize = 16;

/// A parsed snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub step: u64,
    pub origin: [f64; 3],
    pub base_length: [f64; 3],
    pub grid_length: [u64; 3],
    pub max_refinement_level: i32,
    /// `(cell id, scalar)` records in file order.
    pub cells: Vec<(u64, u64)>,
}

/// Writes the distributed grid state into one file.
///
/// Collective: every rank must call this with the same `step` and `path`.
/// `scalar` maps each local payload to the persisted per-cell value.
///
/// # Errors
/// I/O failures are reported without touching grid state.
pub fn write_snapshot<V, G, C, D, F>(
    grid: &Grid<V, G, C, D>,
    step: u64,
    path: &Path,
    scalar: F,
) -> Result<(), GridError>
where
    V: Default,
    G: GridGeometry,
    C: Communicator,
    D: PayloadCodec<V>,
    F: Fn(&V) -> u64,
{
    let comm = grid.comm();
    let rank = comm.rank();

    let mut buffer: Vec<u8> = Vec::new();
    if rank == 0 {
        buffer.reserve(HEADER_LEN);
        buffer.extend_from_slice(&step.to_le_bytes());
        let origin = grid.geometry().domain_origin();
        let base = grid.geometry().base_cell_length();
        for value in origin.iter().chain(base.iter()) {
            buffer.extend_from_slice(&value.to_le_bytes());
        }
        for value in grid.mapping().length() {
            buffer.extend_from_slice(&value.to_le_bytes());
        }
        buffer.extend_from_slice(&(grid.mapping().max_refinement_level() as i32).to_le_bytes());
    }
    for cell in grid.get_cells() {
        let payload = grid.get(cell).expect("owned cell has a payload");
        buffer.extend_from_slice(&cell.get().to_le_bytes());
        buffer.extend_from_slice(&scalar(payload).to_le_bytes());
    }

    // prefix-sum of contribution sizes decides this rank's byte span
    let sizes = comm.all_gather(&(buffer.len() as u64).to_le_bytes());
    let mut offset = 0u64;
    for bytes in sizes.iter().take(rank) {
        let mut size = [0u8; 8];
        size.copy_from_slice(&bytes[..8]);
        offset += u64::from_le_bytes(size);
    }

    if rank == 0 {
        File::create(path)?;
    }
    comm.barrier();

    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&buffer)?;
    file.flush()?;
    debug!(
        "rank {rank}: wrote {} snapshot bytes at offset {offset}",
        buffer.len()
    );
    comm.barrier();
    Ok(())
}

/// Reads a snapshot written by [`write_snapshot`].
///
/// # Errors
/// I/O failures, or `SnapshotFormat` if the file is truncated or not a
/// whole number of cell records.
pub fn read_snapshot(path: &Path) -> Result<Snapshot, GridError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.len() < HEADER_LEN {
        return Err(GridError::SnapshotFormat(format!(
            "file is {} bytes, smaller than the {HEADER_LEN}-byte header",
            bytes.len()
        )));
    }
    let body = &bytes[HEADER_LEN..];
    if body.len() % RECORD_LEN != 0 {
        return Err(GridError::SnapshotFormat(format!(
            "cell data of {} bytes is not a whole number of {RECORD_LEN}-byte records",
            body.len()
        )));
    }

    let mut cursor = 0usize;
    let mut take_u64 = |bytes: &[u8]| {
        let mut v = [0u8; 8];
        v.copy_from_slice(&bytes[cursor..cursor + 8]);
        cursor += 8;
        u64::from_le_bytes(v)
    };

    let step = take_u64(&bytes);
    let origin = std::array::from_fn(|_| f64::from_bits(take_u64(&bytes)));
    let base_length = std::array::from_fn(|_| f64::from_bits(take_u64(&bytes)));
    let grid_length = std::array::from_fn(|_| take_u64(&bytes));
    let mut level = [0u8; 4];
    level.copy_from_slice(&bytes[cursor..cursor + 4]);
    let max_refinement_level = i32::from_le_bytes(level);

    let cells = body
        .chunks_exact(RECORD_LEN)
        .map(|record| {
            let mut id = [0u8; 8];
            let mut value = [0u8; 8];
            id.copy_from_slice(&record[..8]);
            value.copy_from_slice(&record[8..]);
            (u64::from_le_bytes(id), u64::from_le_bytes(value))
        })
        .collect();

    Ok(Snapshot {
        step,
        origin,
        base_length,
        grid_length,
        max_refinement_level,
        cells,
    })
}
