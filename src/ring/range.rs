#![warn(missing_docs)]

//! Arcs and sets of ring identifiers.
//!
//! An [IdRange] is the half-open arc `[ccw, cw)` walked clockwise.
//! Two degenerate states need care: the empty arc (nothing matches)
//! and the full ring, which both collapse to `ccw == cw` if the arc
//! is stored as bare endpoints. The explicit empty flag keeps them
//! apart, so a node whose range grows to cover the whole ring keeps
//! matching every key instead of none.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::ring::id::Id;

/// Unordered set of ids, used for fetch scheduling and ack tracking.
pub type IdSet = BTreeSet<Id>;

/// A half-open arc `[ccw, cw)` on the identifier ring.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct IdRange {
    /// Counter-clockwise edge, inside the arc.
    pub ccw: Id,
    /// Clockwise edge, outside the arc.
    pub cw: Id,
    empty: bool,
}

impl IdRange {
    /// Arc from `ccw` (inclusive) to `cw` (exclusive). Equal edges
    /// give the full ring.
    pub fn new(ccw: Id, cw: Id) -> Self {
        Self {
            ccw,
            cw,
            empty: false,
        }
    }

    /// The arc matching nothing.
    pub fn empty() -> Self {
        Self {
            ccw: Id::zero(),
            cw: Id::zero(),
            empty: true,
        }
    }

    /// The arc covering the whole ring.
    pub fn full() -> Self {
        Self::new(Id::zero(), Id::zero())
    }

    /// Whether this arc matches nothing.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Whether this arc covers the whole ring.
    pub fn is_full(&self) -> bool {
        !self.empty && self.ccw == self.cw
    }

    /// Test `key` against the arc. Half-open: the ccw edge is in,
    /// the cw edge is out.
    pub fn contains(&self, key: Id) -> bool {
        if self.empty {
            return false;
        }
        if self.ccw == self.cw {
            return true;
        }
        // Both sides measured clockwise from the ccw edge.
        num_bigint::BigUint::from(key - self.ccw) < num_bigint::BigUint::from(self.cw - self.ccw)
    }
}

impl std::fmt::Display for IdRange {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.empty {
            write!(f, "(empty)")
        } else if self.ccw == self.cw {
            write!(f, "(full)")
        } else {
            write!(f, "[{}, {})", self.ccw, self.cw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_open_edges() {
        let range = IdRange::new(Id::from(10u32), Id::from(20u32));
        assert!(range.contains(Id::from(10u32)));
        assert!(range.contains(Id::from(19u32)));
        assert!(!range.contains(Id::from(20u32)));
        assert!(!range.contains(Id::from(9u32)));
        assert!(!range.contains(Id::from(21u32)));
    }

    #[test]
    fn test_wrap_around_zero() {
        let range = IdRange::new(-Id::from(10u32), Id::from(10u32));
        assert!(range.contains(-Id::from(1u32)));
        assert!(range.contains(Id::zero()));
        assert!(range.contains(Id::from(9u32)));
        assert!(!range.contains(Id::from(10u32)));
        assert!(!range.contains(-Id::from(11u32)));
    }

    #[test]
    fn test_full_and_empty() {
        let full = IdRange::full();
        assert!(full.is_full());
        assert!(!full.is_empty());
        assert!(full.contains(Id::zero()));
        assert!(full.contains(-Id::from(1u32)));

        let empty = IdRange::empty();
        assert!(empty.is_empty());
        assert!(!empty.is_full());
        assert!(!empty.contains(Id::zero()));
        assert!(!empty.contains(Id::from(42u32)));

        // Same endpoints, opposite meaning.
        assert_ne!(full, empty);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", IdRange::full()), "(full)");
        assert_eq!(format!("{}", IdRange::empty()), "(empty)");
    }
}
