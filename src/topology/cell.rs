//! `CellId`: a strong, zero-cost handle for grid cells.
//!
//! Every cell of the grid, at every refinement level, is identified by a
//! dense unsigned integer. `CellId` wraps a `NonZeroU64` so that 0 — the
//! legacy "no such neighbor" sentinel — is unrepresentable: APIs that could
//! come up empty return `Option<CellId>` or omit the entry instead.
//!
//! The numeric value itself is assigned by [`CellMapping`], which packs the
//! refinement level and the position within that level's index space into
//! one integer.
//!
//! [`CellMapping`]: crate::topology::mapping::CellMapping

use std::{fmt, num::NonZeroU64};

/// Identifier of one grid cell at one refinement level.
///
/// # Memory layout
/// `repr(transparent)` over `NonZeroU64`: same size and alignment as `u64`,
/// and `Option<CellId>` is also exactly 8 bytes.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct CellId(NonZeroU64);

impl CellId {
    /// Creates a `CellId` from a raw value, if it is non-zero.
    ///
    /// Whether the value actually addresses a cell of a particular grid is
    /// decided by that grid's [`CellMapping`](crate::topology::mapping::CellMapping).
    #[inline]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(n) => Some(CellId(n)),
            None => None,
        }
    }

    /// Creates a `CellId` from a raw value.
    ///
    /// # Panics
    /// Panics if `raw == 0`; zero is reserved as the invalid sentinel.
    #[inline]
    #[track_caller]
    pub fn from_raw(raw: u64) -> Self {
        CellId(NonZeroU64::new(raw).expect("CellId must be non-zero (0 is the reserved sentinel)"))
    }

    /// Returns the raw integer value.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CellId").field(&self.get()).finish()
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert!(CellId::new(0).is_none());
        assert!(std::panic::catch_unwind(|| CellId::from_raw(0)).is_err());
    }

    #[test]
    fn new_and_get() {
        let c = CellId::from_raw(42);
        assert_eq!(c.get(), 42);
        assert_eq!(CellId::new(42), Some(c));
    }

    #[test]
    fn debug_and_display() {
        let c = CellId::from_raw(7);
        assert_eq!(format!("{:?}", c), "CellId(7)");
        assert_eq!(format!("{}", c), "7");
    }

    #[test]
    fn ordering_and_hash() {
        use std::collections::HashSet;
        let a = CellId::from_raw(1);
        let b = CellId::from_raw(2);
        assert!(a < b);
        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn serde_roundtrip() {
        let c = CellId::from_raw(123);
        let s = serde_json::to_string(&c).unwrap();
        assert_eq!(s, "123");
        let back: CellId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, c);
        let bytes = bincode::serialize(&c).unwrap();
        let back: CellId = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, c);
    }
}
