#![warn(missing_docs)]
//! This module defines the message structures of the replica protocol.
//! Request/response pairs correspond one to one, such as ReplicateRequest
//! and ReplicateGrant. RefreshNotice stands alone: it is the periodic
//! soft-state announcement and never expects an answer.

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;

use crate::ring::Id;

/// MessageType asking the root of `key` to resolve the replica set.
/// Routed by key, so any node can send it without knowing the root.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ReplicateRequest {
    /// The key to be replicated.
    pub key: Id,
}

/// MessageType answering a [ReplicateRequest] with the resolved
/// replica set, root first, members clockwise.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ReplicateGrant {
    /// The key being replicated.
    pub key: Id,
    /// The nodes that must hold a copy.
    pub replica_set: Vec<Id>,
}

/// MessageType carrying the object body to one replica-set member.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct InsertRequest {
    /// The key of the object.
    pub key: Id,
    /// The object body.
    pub object: Bytes,
}

/// MessageType confirming one stored copy back to the initiator.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct InsertAck {
    /// The key that was stored.
    pub key: Id,
}

/// MessageType asking the root of `key` to run one refresh round for
/// it. Routed by key, like [ReplicateRequest].
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HeartbeatRequest {
    /// The key to refresh.
    pub key: Id,
}

/// MessageType announcing that the sending root still keeps `key`
/// alive. Receivers reset their staleness clock for the key.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RefreshNotice {
    /// The key being kept alive.
    pub key: Id,
}

impl ReplicateRequest {
    /// Answer this request with the resolved replica set.
    pub fn grant(&self, replica_set: Vec<Id>) -> ReplicateGrant {
        ReplicateGrant {
            key: self.key,
            replica_set,
        }
    }
}

impl InsertRequest {
    /// Answer this insert with an ack for the same key.
    pub fn ack(&self) -> InsertAck {
        InsertAck { key: self.key }
    }
}

/// A collection MessageType use for unified management.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Message {
    /// Remote message asking the key's root for a replica set.
    ReplicateRequest(ReplicateRequest),
    /// Response of ReplicateRequest
    ReplicateGrant(ReplicateGrant),
    /// Remote message pushing an object body to one member.
    InsertRequest(InsertRequest),
    /// Response of InsertRequest
    InsertAck(InsertAck),
    /// Remote message forcing one refresh round on the key's root.
    HeartbeatRequest(HeartbeatRequest),
    /// Periodic keep-alive from a root to the replica set.
    RefreshNotice(RefreshNotice),
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::fmt::Debug for InsertRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertRequest")
            .field("key", &self.key)
            .field("size", &self.object.len())
            .finish()
    }
}
