#![warn(missing_docs)]

//! The node's view of the ring around itself.
//!
//! A [NeighborView] is the membership snapshot the routing substrate
//! last reported, sorted clockwise from the local id. Replica-set
//! resolution and range derivation are pure functions of this view;
//! they never talk to the network. A view can go stale the moment it
//! is read, which is fine: callers re-derive consistency through acks
//! and the periodic maintenance pass, never by locking the view.

use serde::Deserialize;
use serde::Serialize;

use crate::ring::id::Id;
use crate::ring::id::RingOrder;
use crate::ring::range::IdRange;

/// Ring membership as seen from one node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NeighborView {
    local: Id,
    /// Known live peers, self excluded, sorted clockwise from self.
    peers: Vec<Id>,
}

impl NeighborView {
    /// A view containing only the local node.
    pub fn new(local: Id) -> Self {
        Self {
            local,
            peers: vec![],
        }
    }

    /// Replace the peer list with a fresh snapshot. Drops the local
    /// id and duplicates, keeps clockwise order. Returns whether the
    /// view actually changed.
    pub fn update(&mut self, snapshot: Vec<Id>) -> bool {
        let mut peers: Vec<Id> = snapshot;
        peers.sort_clockwise(self.local);
        peers.dedup();
        peers.retain(|id| *id != self.local);
        if peers == self.peers {
            return false;
        }
        self.peers = peers;
        true
    }

    /// The local id this view is anchored on.
    pub fn local(&self) -> Id {
        self.local
    }

    /// Known live peers, self excluded, clockwise from self.
    pub fn peers(&self) -> &[Id] {
        &self.peers
    }

    /// Number of known live nodes, self included.
    pub fn ring_size(&self) -> usize {
        self.peers.len() + 1
    }

    /// The full ring walk starting at the local node.
    fn ring(&self) -> Vec<Id> {
        let mut ring = Vec::with_capacity(self.peers.len() + 1);
        ring.push(self.local);
        ring.extend_from_slice(&self.peers);
        ring
    }

    /// The node numerically closest to `key`, ties to the clockwise
    /// candidate.
    pub fn root_of(&self, key: Id) -> Id {
        let mut ring = self.ring();
        ring.sort_clockwise(key);
        let first = ring[0];
        let last = ring[ring.len() - 1];
        key.closer(first, last)
    }

    /// Resolve the ordered replica set for `key`: the root first,
    /// then members clockwise from it. Fewer than `width` nodes give
    /// the whole ring.
    pub fn replica_set(&self, key: Id, width: usize) -> Vec<Id> {
        let mut ring = self.ring();
        ring.sort_clockwise(self.root_of(key));
        ring.truncate(width.max(1));
        ring
    }

    /// Keys strictly closer to this node than to any neighbor: the
    /// arc between the midpoints with the adjacent nodes. Ties at a
    /// midpoint belong to the clockwise node.
    pub fn primary_range(&self) -> IdRange {
        if self.peers.is_empty() {
            return IdRange::full();
        }
        let pred = self.peers[self.peers.len() - 1];
        let succ = self.peers[0];
        IdRange::new(pred.midpoint(self.local), self.local.midpoint(succ))
    }

    /// Keys whose replica set this node belongs to with `factor`
    /// extra copies: the primary arc extended counter-clockwise over
    /// the `factor` preceding arcs.
    pub fn replicated_range(&self, factor: usize) -> IdRange {
        let ring = self.ring();
        let n = ring.len();
        if n == 1 || n < factor + 1 {
            return IdRange::full();
        }
        if factor == 0 {
            return self.primary_range();
        }
        // Walking i steps counter-clockwise lands on ring[n - i].
        // With n == factor + 1 both edges coincide and the range
        // degrades to the full ring.
        let far = ring[(n - (factor + 1) % n) % n];
        let near = ring[n - factor];
        let cw_edge = self.local.midpoint(ring[1]);
        IdRange::new(far.midpoint(near), cw_edge)
    }
}
