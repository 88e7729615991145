//! Uniform Cartesian geometry: origin plus per-axis base cell length.

use crate::error::GridError;
use crate::geometry::GridGeometry;
use crate::topology::cell::CellId;
use crate::topology::mapping::CellMapping;

/// Uniform geometry; cell extents halve with every refinement level.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CartesianGeometry {
    origin: [f64; 3],
    base_length: [f64; 3],
}

impl CartesianGeometry {
    /// Creates a geometry with the given domain origin and level-0 cell
    /// extents.
    ///
    /// # Errors
    /// `NonMonotonicCoordinates` if any base length is not a positive,
    /// finite number.
    pub fn new(origin: [f64; 3], base_length: [f64; 3]) -> Result<Self, GridError> {
        for (axis, &len) in base_length.iter().enumerate() {
            if !(len.is_finite() && len > 0.0) {
                return Err(GridError::NonMonotonicCoordinates { axis });
            }
        }
        Ok(Self {
            origin,
            base_length,
        })
    }

    /// Origin `(0,0,0)`, unit cells.
    pub fn unit() -> Self {
        Self {
            origin: [0.0; 3],
            base_length: [1.0; 3],
        }
    }

    fn level_length(&self, level: u32) -> [f64; 3] {
        let scale = f64::powi(2.0, -(level as i32));
        [
            self.base_length[0] * scale,
            self.base_length[1] * scale,
            self.base_length[2] * scale,
        ]
    }
}

impl Default for CartesianGeometry {
    fn default() -> Self {
        Self::unit()
    }
}

impl GridGeometry for CartesianGeometry {
    fn validate(&self, _mapping: &CellMapping) -> Result<(), GridError> {
        Ok(())
    }

    fn domain_origin(&self) -> [f64; 3] {
        self.origin
    }

    fn base_cell_length(&self) -> [f64; 3] {
        self.base_length
    }

    fn center(&self, mapping: &CellMapping, cell: CellId) -> [f64; 3] {
        let (level, idx) = mapping.decode(cell);
        let len = self.level_length(level);
        std::array::from_fn(|a| self.origin[a] + (idx[a] as f64 + 0.5) * len[a])
    }

    fn cell_length(&self, mapping: &CellMapping, cell: CellId) -> [f64; 3] {
        self.level_length(mapping.level_of(cell))
    }

    fn cell_at(&self, mapping: &CellMapping, point: [f64; 3], level: u32) -> Option<CellId> {
        if level > mapping.max_refinement_level() {
            return None;
        }
        let len = self.level_length(level);
        let dims = mapping.level_length(level);
        let mut idx = [0u64; 3];
        for a in 0..3 {
            let rel = (point[a] - self.origin[a]) / len[a];
            if rel < 0.0 || !rel.is_finite() {
                return None;
            }
            let i = rel.floor() as u64;
            if i >= dims[a] {
                return None;
            }
            idx[a] = i;
        }
        mapping.encode(level, idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_lengths() {
        assert!(CartesianGeometry::new([0.0; 3], [1.0, 0.0, 1.0]).is_err());
        assert!(CartesianGeometry::new([0.0; 3], [1.0, f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn centers_and_lengths_halve_per_level() {
        let m = CellMapping::new([2, 2, 1], 1).unwrap();
        let g = CartesianGeometry::new([0.0; 3], [1.0, 1.0, 1.0]).unwrap();
        let c0 = m.encode(0, [0, 0, 0]).unwrap();
        assert_eq!(g.center(&m, c0), [0.5, 0.5, 0.5]);
        assert_eq!(g.cell_length(&m, c0), [1.0, 1.0, 1.0]);
        let c1 = m.encode(1, [0, 0, 0]).unwrap();
        assert_eq!(g.center(&m, c1), [0.25, 0.25, 0.25]);
        assert_eq!(g.cell_length(&m, c1), [0.5, 0.5, 0.5]);
    }

    #[test]
    fn point_lookup_roundtrips_centers() {
        let m = CellMapping::new([4, 3, 2], 1).unwrap();
        let g = CartesianGeometry::new([-1.0, 2.0, 0.0], [0.5, 1.0, 2.0]).unwrap();
        for level in 0..=1 {
            let [w, h, d] = m.level_length(level);
            for iz in 0..d {
                for iy in 0..h {
                    for ix in 0..w {
                        let id = m.encode(level, [ix, iy, iz]).unwrap();
                        let center = g.center(&m, id);
                        assert_eq!(g.cell_at(&m, center, level), Some(id));
                    }
                }
            }
        }
    }

    #[test]
    fn outside_points_find_no_cell() {
        let m = CellMapping::new([2, 2, 2], 0).unwrap();
        let g = CartesianGeometry::unit();
        assert_eq!(g.cell_at(&m, [-0.1, 0.5, 0.5], 0), None);
        assert_eq!(g.cell_at(&m, [2.1, 0.5, 0.5], 0), None);
        assert_eq!(g.cell_at(&m, [0.5, 0.5, 0.5], 1), None);
    }
}
