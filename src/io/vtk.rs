//! Legacy VTK (`.vtk`) writer for per-rank visualization.
//!
//! Each rank writes its own cells as an ASCII `UNSTRUCTURED_GRID` of voxel
//! cells in ascending id order, so per-cell scalars appended by the caller
//! (`CELL_DATA` sections) line up with [`Grid::get_cells`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::comm::Communicator;
use crate::data::codec::PayloadCodec;
use crate::error::GridError;
use crate::geometry::GridGeometry;
use crate::grid::Grid;

const VTK_VOXEL: u8 = 11;

/// Writes this rank's cells into a legacy VTK file.
///
/// Not collective; every rank writes its own file.
///
/// # Errors
/// I/O failures; the grid state is unaffected.
pub fn write_vtk<V, G, C, D>(grid: &Grid<V, G, C, D>, path: &Path) -> Result<(), GridError>
where
    V: Default,
    G: GridGeometry,
    C: Communicator,
    D: PayloadCodec<V>,
{
    let cells = grid.get_cells();
    let mut out = BufWriter::new(File::create(path)?);

    writeln!(out, "# vtk DataFile Version 2.0")?;
    writeln!(out, "Cartesian cell grid")?;
    writeln!(out, "ASCII")?;
    writeln!(out, "DATASET UNSTRUCTURED_GRID")?;

    writeln!(out, "POINTS {} float", cells.len() * 8)?;
    for &cell in &cells {
        let center = grid.geometry().center(grid.mapping(), cell);
        let length = grid.geometry().cell_length(grid.mapping(), cell);
        let lo: Vec<f64> = (0..3).map(|a| center[a] - 0.5 * length[a]).collect();
        let hi: Vec<f64> = (0..3).map(|a| center[a] + 0.5 * length[a]).collect();
        // voxel corner order: x fastest, then y, then z
        for dz in 0..2 {
            for dy in 0..2 {
                for dx in 0..2 {
                    let x = if dx == 0 { lo[0] } else { hi[0] };
                    let y = if dy == 0 { lo[1] } else { hi[1] };
                    let z = if dz == 0 { lo[2] } else { hi[2] };
                    writeln!(out, "{x} {y} {z}")?;
                }
            }
        }
    }

    writeln!(out, "CELLS {} {}", cells.len(), cells.len() * 9)?;
    for i in 0..cells.len() {
        let base = i * 8;
        write!(out, "8")?;
        for corner in 0..8 {
            write!(out, " {}", base + corner)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "CELL_TYPES {}", cells.len())?;
    for _ in &cells {
        writeln!(out, "{VTK_VOXEL}")?;
    }

    out.flush()?;
    Ok(())
}
