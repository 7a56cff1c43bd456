#![warn(missing_docs)]
//! Continuations for operations waiting on the network.
//!
//! The engine never blocks: a replicate call or a range transition
//! leaves one of these records behind and the event loop moves on.
//! The record is resumed by the matching ack, fetch completion, or
//! timeout event, and disappears when its verdict is reached.

use bytes::Bytes;

use crate::ring::Id;
use crate::ring::IdSet;

/// One in-flight replicate call, kept on the initiating node.
///
/// Holds the object body until the root's grant arrives, then counts
/// distinct acks from the granted set against one deadline.
#[derive(Clone, Debug)]
pub struct PendingReplication {
    /// The key being replicated.
    pub key: Id,
    object: Bytes,
    granted: Option<Vec<Id>>,
    acked: IdSet,
}

/// How an ack moved a [PendingReplication] forward.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AckOutcome {
    /// First ack from this member, more still missing.
    Counted,
    /// Every granted member has acked.
    Complete,
    /// Duplicate ack, already counted.
    Duplicate,
    /// Ack from a node outside the granted set.
    Stranger,
}

impl PendingReplication {
    /// Record a fresh replicate call that still awaits its grant.
    pub fn new(key: Id, object: Bytes) -> Self {
        Self {
            key,
            object,
            granted: None,
            acked: IdSet::new(),
        }
    }

    /// The body to push once the grant arrives.
    pub fn object(&self) -> Bytes {
        self.object.clone()
    }

    /// Whether the grant has arrived and pushes are out.
    pub fn is_pushing(&self) -> bool {
        self.granted.is_some()
    }

    /// The granted set, empty before the grant.
    pub fn granted(&self) -> &[Id] {
        self.granted.as_deref().unwrap_or(&[])
    }

    /// The grant arrived. Returns false on a duplicate grant.
    pub fn grant(&mut self, replica_set: Vec<Id>) -> bool {
        if self.granted.is_some() {
            return false;
        }
        self.granted = Some(replica_set);
        true
    }

    /// Count one ack against the granted set.
    pub fn record_ack(&mut self, from: Id) -> AckOutcome {
        let Some(granted) = &self.granted else {
            return AckOutcome::Stranger;
        };
        if !granted.contains(&from) {
            return AckOutcome::Stranger;
        }
        if !self.acked.insert(from) {
            return AckOutcome::Duplicate;
        }
        if self.acked.len() == granted.len() {
            AckOutcome::Complete
        } else {
            AckOutcome::Counted
        }
    }

    /// Number of distinct acks so far.
    pub fn ack_count(&self) -> usize {
        self.acked.len()
    }

    /// The verdict when the deadline fires: any stored copy counts
    /// as success, the refresh engine heals the rest.
    pub fn timeout_verdict(&self) -> bool {
        !self.acked.is_empty()
    }
}

/// One in-flight range transition: the keys whose bodies are still
/// being fetched after responsibility grew over them.
#[derive(Clone, Debug)]
pub struct PendingRangeChange {
    /// Operation id, unique per node.
    pub op_id: u64,
    missing: IdSet,
}

impl PendingRangeChange {
    /// Track `keys` under operation `op_id`.
    pub fn new(op_id: u64, keys: IdSet) -> Self {
        Self {
            op_id,
            missing: keys,
        }
    }

    /// A body arrived or the key stopped mattering. Returns whether
    /// this operation was tracking it.
    pub fn retire(&mut self, key: Id) -> bool {
        self.missing.remove(&key)
    }

    /// Whether this operation tracks `key`.
    pub fn tracks(&self, key: Id) -> bool {
        self.missing.contains(&key)
    }

    /// Whether every tracked key has been retired.
    pub fn is_done(&self) -> bool {
        self.missing.is_empty()
    }

    /// Keys still awaiting bodies.
    pub fn missing(&self) -> &IdSet {
        &self.missing
    }
}
