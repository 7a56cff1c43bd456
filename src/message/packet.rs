#![warn(missing_docs)]

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;
use crate::ring::Id;

/// Everything transmitted between nodes is wrapped by `Packet`.
/// It names the sender and carries a tx_id for log correlation.
/// Delivery is at-most-once and unordered; receivers must treat
/// every packet as possibly duplicated or late.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The node this packet was sent from.
    pub from: Id,
    /// The transaction ID.
    /// A response should use same tx_id as its request.
    pub tx_id: uuid::Uuid,
    /// Bincode serialized message body.
    pub data: Vec<u8>,
}

impl Packet {
    /// Wrap a message with a fresh tx_id. Will serialize by
    /// [bincode::serialize].
    pub fn new<T>(from: Id, data: &T) -> Result<Self>
    where T: Serialize {
        Self::new_with_tx(from, uuid::Uuid::new_v4(), data)
    }

    /// Wrap a message under an existing tx_id, used for responses.
    pub fn new_with_tx<T>(from: Id, tx_id: uuid::Uuid, data: &T) -> Result<Self>
    where T: Serialize {
        let data = bincode::serialize(data).map_err(Error::BincodeSerialize)?;
        Ok(Self { from, tx_id, data })
    }

    /// Deserializes the data field into a `T` instance.
    pub fn body<T>(&self) -> Result<T>
    where T: DeserializeOwned {
        bincode::deserialize(&self.data).map_err(Error::BincodeDeserialize)
    }

    /// Encode the whole packet for the wire.
    pub fn to_bincode(&self) -> Result<Bytes> {
        bincode::serialize(self)
            .map(Bytes::from)
            .map_err(Error::BincodeSerialize)
    }

    /// Decode a packet off the wire.
    pub fn from_bincode(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(Error::BincodeDeserialize)
    }
}
