#![warn(missing_docs)]

//! Circular identifiers for the replica ring.
//!
//! An [Id] names both nodes and objects. It lives on a finite ring
//! R(P) where P = 2^160, so addition and subtraction wrap and every
//! pair of points has two arc distances. Closeness between a key and
//! a node always uses the minimal arc, never the clockwise-only rule
//! of successor-based overlays: the root of a key may sit on either
//! side of it.

use std::cmp::PartialEq;
use std::ops::Add;
use std::ops::Neg;
use std::ops::Sub;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::de;
use serde::Deserialize;
use serde::Serialize;

use crate::consts::ID_LEN;
use crate::error::Error;
use crate::error::Result;

/// Id is a point on the finite ring R(P) where P = 2^160, wrapping
/// a big-endian 20 byte word.
#[derive(Copy, Clone, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct Id([u8; ID_LEN]);

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Id(0x{})", hex::encode(self.0))
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: serde::Serializer {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where D: serde::Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        Id::from_str(&s).map_err(de::Error::custom)
    }
}

impl Id {
    /// The additive identity of the ring.
    pub fn zero() -> Self {
        Self([0u8; ID_LEN])
    }

    /// Wrap raw big-endian bytes.
    pub fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw big-endian bytes of this id.
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Minimal arc distance between two points, in [0, 2^159].
    pub fn distance(&self, other: Id) -> BigUint {
        let cw = BigUint::from(other - *self);
        let ccw = BigUint::from(*self - other);
        cw.min(ccw)
    }

    /// The point halfway along the clockwise arc from `self` to `other`,
    /// an odd gap rounding clockwise. From the midpoint on, keys are at
    /// least as close to `other` as to `self`, the midpoint itself
    /// included (ties resolve clockwise); everything before it is
    /// strictly closer to `self`.
    pub fn midpoint(&self, other: Id) -> Id {
        *self + Id::from((BigUint::from(other - *self) + 1u32) >> 1)
    }

    /// Of `a` and `b`, the one numerically closer to `self`. A tie
    /// resolves to the node on the clockwise side of `self`.
    pub fn closer(&self, a: Id, b: Id) -> Id {
        let da = self.distance(a);
        let db = self.distance(b);
        if da < db {
            return a;
        }
        if db < da {
            return b;
        }
        // Equidistant. Pick whichever sits clockwise from self.
        if BigUint::from(a - *self) == da {
            a
        } else {
            b
        }
    }
}

/// Clockwise ordering around a reference point.
/// Sorting a node list with the local id as the reference turns it
/// into the ring walk the replica-set layout is defined on.
pub trait RingOrder {
    /// Sort in place, starting at `from` and walking clockwise.
    fn sort_clockwise(&mut self, from: Id);
}

impl RingOrder for Vec<Id> {
    fn sort_clockwise(&mut self, from: Id) {
        self.sort_by_key(|id| BigUint::from(*id - from));
    }
}

impl From<u32> for Id {
    fn from(id: u32) -> Id {
        Self::from(BigUint::from(id))
    }
}

impl From<Id> for BigUint {
    fn from(id: Id) -> BigUint {
        BigUint::from_bytes_be(&id.0)
    }
}

impl From<BigUint> for Id {
    fn from(a: BigUint) -> Self {
        let wrapped = a % (BigUint::from(2u16).pow(160));
        let tail = wrapped.to_bytes_be();
        let mut bytes = [0u8; ID_LEN];
        bytes[ID_LEN - tail.len()..].copy_from_slice(&tail);
        Self(bytes)
    }
}

impl FromStr for Id {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let raw = hex::decode(s.trim_start_matches("0x"))?;
        if raw.len() != ID_LEN {
            return Err(Error::BadIdLength(ID_LEN));
        }
        let mut bytes = [0u8; ID_LEN];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }
}

// impl finite Ring for Id
impl Neg for Id {
    type Output = Self;
    fn neg(self) -> Self {
        let ret = BigUint::from(2u16).pow(160) - BigUint::from(self);
        ret.into()
    }
}

impl Add for Id {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        ((BigUint::from(self) + BigUint::from(rhs)) % (BigUint::from(2u16).pow(160))).into()
    }
}

impl Sub for Id {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_finite_ring_neg() {
        let zero = Id::zero();
        let a = Id::from_str("0x11e807fcc88dd319270493fb2e822e388fe36ab0").unwrap();
        assert_eq!(-a + a, zero);
        assert_eq!(-(-a), a);
        assert_eq!(Id::from(0u32), Id::from(BigUint::from(2u16).pow(160)));
    }

    #[test]
    fn test_sort_clockwise() {
        let a = Id::from_str("0xaae807fcc88dd319270493fb2e822e388fe36ab0").unwrap();
        let b = Id::from_str("0xbb9999cf1046e68e36e1aa2e0e07105eddd1f08e").unwrap();
        let c = Id::from_str("0xccffee254729296a45a3885639ac7e10f9d54979").unwrap();
        let d = Id::from_str("0xdddfee254729296a45a3885639ac7e10f9d54979").unwrap();
        let mut v = vec![c, b, a, d];
        v.sort_clockwise(a);
        assert_eq!(v, vec![a, b, c, d]);
        v.sort_clockwise(b);
        assert_eq!(v, vec![b, c, d, a]);
        v.sort_clockwise(c);
        assert_eq!(v, vec![c, d, a, b]);
        v.sort_clockwise(d);
        assert_eq!(v, vec![d, a, b, c]);
    }

    #[test]
    fn test_minimal_arc_distance() {
        let near_zero = Id::from(16u32);
        let near_top = -Id::from(16u32);
        // The short way across zero is 32, not 2^160 - 32.
        assert_eq!(near_zero.distance(near_top), BigUint::from(32u32));
        assert_eq!(near_top.distance(near_zero), BigUint::from(32u32));
        assert_eq!(near_zero.distance(near_zero), BigUint::from(0u32));
    }

    #[test]
    fn test_closer_prefers_minimal_arc() {
        let key = Id::from(8u32);
        let behind = -Id::from(2u32);
        let ahead = Id::from(100u32);
        // behind is 10 away across zero, ahead is 92 away.
        assert_eq!(key.closer(behind, ahead), behind);
        assert_eq!(key.closer(ahead, behind), behind);
    }

    #[test]
    fn test_closer_tie_resolves_clockwise() {
        let key = Id::from(50u32);
        let ccw = Id::from(40u32);
        let cw = Id::from(60u32);
        assert_eq!(key.closer(ccw, cw), cw);
        assert_eq!(key.closer(cw, ccw), cw);
    }

    #[test]
    fn test_midpoint() {
        let a = Id::from(10u32);
        let b = Id::from(20u32);
        assert_eq!(a.midpoint(b), Id::from(15u32));
        // Odd gaps round clockwise: 15 is strictly closer to 10, so the
        // boundary must sit past it.
        assert_eq!(a.midpoint(Id::from(21u32)), Id::from(16u32));
        // A midpoint across zero stays on the short arc.
        let near_top = -Id::from(10u32);
        assert_eq!(near_top.midpoint(Id::from(10u32)), Id::zero());
    }

    #[test]
    fn test_midpoint_splits_by_closeness() {
        let a = Id::from(10u32);
        for gap in 1u32..=12 {
            let b = Id::from(10 + gap);
            let boundary = a.midpoint(b);
            // Every key before the boundary is closer to a, every key
            // from it on belongs to b.
            for offset in 1..gap {
                let key = Id::from(10 + offset);
                let owner = key.closer(a, b);
                if BigUint::from(key - a) < BigUint::from(boundary - a) {
                    assert_eq!(owner, a, "gap {} key {}", gap, key);
                } else {
                    assert_eq!(owner, b, "gap {} key {}", gap, key);
                }
            }
        }
    }

    #[test]
    fn test_dump_and_load() {
        // The length must be 40.
        assert!(Id::from_str("0x11e807fcc88dd319270493fb2e822e388fe36a").is_err());
        assert!(Id::from_str("0x11e807fcc88dd319270493fb2e822e388fe36ab000").is_err());

        // Allow omit 0x prefix
        assert_eq!(
            Id::from_str("11E807fcc88dD319270493fB2e822e388Fe36ab0").unwrap(),
            Id::from_str("0x11E807fcc88dD319270493fB2e822e388Fe36ab0").unwrap(),
        );

        // from_str then to_string
        let id = Id::from_str("0x11E807fcc88dD319270493fB2e822e388Fe36ab0").unwrap();
        assert_eq!(id.to_string(), "0x11e807fcc88dd319270493fb2e822e388fe36ab0");

        // Serialize
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"0x11e807fcc88dd319270493fb2e822e388fe36ab0\""
        );

        // Deserialize
        let loaded =
            serde_json::from_str::<Id>("\"0x11e807fcc88dd319270493fb2e822e388fe36ab0\"").unwrap();
        assert_eq!(loaded, id);

        // Debug and Display
        assert_eq!(
            format!("{}", id),
            "0x11e807fcc88dd319270493fb2e822e388fe36ab0"
        );
        assert_eq!(
            format!("{:?}", id),
            "Id(0x11e807fcc88dd319270493fb2e822e388fe36ab0)"
        );
    }
}
