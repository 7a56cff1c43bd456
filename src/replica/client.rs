#![warn(missing_docs)]
//! Upcall surface towards the application hosting a replica node.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::ring::Id;
use crate::ring::IdSet;

/// Error type of client upcalls. Boxed so applications can surface
/// whatever error they like without threading a generic through.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// A [ReplicaClient] trait object shared between the node and its loop.
pub type SharedReplicaClient = Arc<dyn ReplicaClient + Send + Sync>;

/// Any object that implements this trait can be plugged into a node to
/// observe what the replica manager decides. Every method defaults to a
/// no-op, implementors override only what they care about.
///
/// Upcalls are advisory. They may repeat when packets are redelivered,
/// so implementations should be idempotent.
#[async_trait]
pub trait ReplicaClient {
    /// A replicate call settled. `ok` is false only when the deadline
    /// passed with no ack at all.
    async fn replicate_success(&self, _key: Id, _ok: bool) -> Result<(), CallbackError> {
        Ok(())
    }

    /// The node now holds `key` and serves it until told otherwise.
    async fn responsible(&self, _key: Id, _object: &Bytes) -> Result<(), CallbackError> {
        Ok(())
    }

    /// The key left the node's replicated range and the local copy is gone.
    async fn not_responsible(&self, _key: Id) -> Result<(), CallbackError> {
        Ok(())
    }

    /// The root confirmed `key` is still alive.
    async fn refresh(&self, _key: Id) -> Result<(), CallbackError> {
        Ok(())
    }

    /// The node is responsible for `keys` but has no bodies for them.
    /// The application should obtain the objects out of band and hand
    /// each one back through `RmHandle::complete_fetch`.
    async fn fetch(&self, _keys: &IdSet) -> Result<(), CallbackError> {
        Ok(())
    }

    /// Every key owed from the last range change has arrived. Fired once.
    async fn rm_is_ready(&self) -> Result<(), CallbackError> {
        Ok(())
    }
}

/// Client that ignores every upcall. The builder falls back to this
/// when the application does not install one.
#[derive(Debug, Default)]
pub struct DefaultClient;

#[async_trait]
impl ReplicaClient for DefaultClient {}
