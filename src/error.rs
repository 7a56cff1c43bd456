//! Error of replica_ring

use crate::ring::Id;

/// A wrap `Result` contains custom errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors collections in replica-ring.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("No node registered for ring, cannot route key {0}")]
    RingEmpty(Id),

    #[error("Node {0} is not registered, direct route failed")]
    NodeGone(Id),

    #[error("Inbox of node {0} is closed")]
    InboxClosed(Id),

    #[error("Replication for key {0} is already pending")]
    ReplicationPending(Id),

    #[error("Node event loop channel send failed")]
    ChannelSendFailed,

    #[error("Invalid hexadecimal id")]
    BadHexId(#[from] hex::FromHexError),

    #[error("Id must be {0} bytes")]
    BadIdLength(usize),

    #[error("JSON serialization error")]
    Serialize(#[source] serde_json::Error),

    #[error("Bincode serialization error")]
    BincodeSerialize(#[source] bincode::Error),

    #[error("Bincode deserialization error")]
    BincodeDeserialize(#[source] bincode::Error),
}
