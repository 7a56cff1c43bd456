//! Module of object storage for replica bodies.
//!
//! The replica engine decides which keys this node must hold; the
//! bodies themselves live behind [ObjectStorage]. The engine writes
//! on insert and fetch completion and deletes on responsibility loss,
//! nothing else. Everything else in the store belongs to the client.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::ring::Id;
use crate::ring::IdRange;
pub use crate::storage::memory::MemStorage;

/// Shared handle to the local object store.
pub type SharedObjectStorage = Arc<dyn ObjectStorage + Send + Sync>;

/// Object storage interface, keyed by ring id.
#[async_trait]
pub trait ObjectStorage {
    /// Get an object body by `key`.
    async fn get(&self, key: Id) -> Result<Option<Bytes>>;

    /// Put an object body under `key`, overwriting any old body.
    async fn put(&self, key: Id, object: &Bytes) -> Result<()>;

    /// Keys held within `range`, clockwise from its ccw edge.
    async fn scan(&self, range: &IdRange) -> Result<Vec<Id>>;

    /// Delete an object by `key`.
    async fn delete(&self, key: Id) -> Result<()>;

    /// Delete all objects.
    async fn clear(&self) -> Result<()>;

    /// Number of objects held.
    async fn count(&self) -> Result<u32>;
}
