//! Stretched Cartesian geometry: explicit per-axis coordinate breakpoints.
//!
//! Level-0 cell `i` along an axis spans `coordinates[i] ..= coordinates[i+1]`;
//! refined cells subdivide their level-0 interval uniformly. Breakpoints must
//! be strictly increasing, which is checked at construction, and the table
//! size must match the grid length, which is checked when the geometry is
//! attached.

use crate::error::GridError;
use crate::geometry::GridGeometry;
use crate::topology::cell::CellId;
use crate::topology::mapping::CellMapping;

/// Geometry defined by per-axis breakpoint tables.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StretchedGeometry {
    coordinates: [Vec<f64>; 3],
}

impl StretchedGeometry {
    /// Creates a stretched geometry from per-axis breakpoints.
    ///
    /// # Errors
    /// `NonMonotonicCoordinates` if any axis has fewer than two breakpoints
    /// or is not strictly increasing.
    pub fn new(coordinates: [Vec<f64>; 3]) -> Result<Self, GridError> {
        for (axis, coords) in coordinates.iter().enumerate() {
            if coords.len() < 2 {
                return Err(GridError::NonMonotonicCoordinates { axis });
            }
            for pair in coords.windows(2) {
                if !(pair[0].is_finite() && pair[1].is_finite() && pair[0] < pair[1]) {
                    return Err(GridError::NonMonotonicCoordinates { axis });
                }
            }
        }
        Ok(Self { coordinates })
    }

    /// The breakpoint table for `axis`.
    pub fn coordinates(&self, axis: usize) -> &[f64] {
        &self.coordinates[axis]
    }

    /// Start coordinate and width of a level-`level` cell with index `i`
    /// along `axis`.
    fn interval(&self, axis: usize, level: u32, i: u64) -> (f64, f64) {
        let coords = &self.coordinates[axis];
        let base = (i >> level) as usize;
        let width0 = coords[base + 1] - coords[base];
        let parts = 1u64 << level;
        let width = width0 / parts as f64;
        let sub = i - ((base as u64) << level);
        (coords[base] + sub as f64 * width, width)
    }
}

impl GridGeometry for StretchedGeometry {
    fn validate(&self, mapping: &CellMapping) -> Result<(), GridError> {
        for axis in 0..3 {
            let expected = mapping.length()[axis] as usize + 1;
            let actual = self.coordinates[axis].len();
            if actual != expected {
                return Err(GridError::GeometryMismatch {
                    axis,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    fn domain_origin(&self) -> [f64; 3] {
        std::array::from_fn(|a| self.coordinates[a][0])
    }

    fn base_cell_length(&self) -> [f64; 3] {
        std::array::from_fn(|a| self.coordinates[a][1] - self.coordinates[a][0])
    }

    fn center(&self, mapping: &CellMapping, cell: CellId) -> [f64; 3] {
        let (level, idx) = mapping.decode(cell);
        std::array::from_fn(|a| {
            let (start, width) = self.interval(a, level, idx[a]);
            start + 0.5 * width
        })
    }

    fn cell_length(&self, mapping: &CellMapping, cell: CellId) -> [f64; 3] {
        let (level, idx) = mapping.decode(cell);
        std::array::from_fn(|a| self.interval(a, level, idx[a]).1)
    }

    fn cell_at(&self, mapping: &CellMapping, point: [f64; 3], level: u32) -> Option<CellId> {
        if level > mapping.max_refinement_level() {
            return None;
        }
        let mut idx = [0u64; 3];
        for a in 0..3 {
            let coords = &self.coordinates[a];
            let p = point[a];
            if !p.is_finite() || p < coords[0] || p >= *coords.last().unwrap() {
                return None;
            }
            // index of the level-0 interval containing p
            let base = coords.partition_point(|&c| c <= p) - 1;
            let width0 = coords[base + 1] - coords[base];
            let parts = (1u64 << level) as f64;
            let sub = (((p - coords[base]) / width0) * parts).floor() as u64;
            idx[a] = ((base as u64) << level) + sub.min((1u64 << level) - 1);
        }
        mapping.encode(level, idx)
    }
}
