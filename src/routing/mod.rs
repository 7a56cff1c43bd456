#![warn(missing_docs)]
//! Routing substrate seam.
//!
//! The replica engine does not care how packets move, only that they
//! can be sent toward a key's numerically closest node or straight to
//! a named node. [Router] is that seam; [MeshRouter] is the in-memory
//! implementation used by tests and simulations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::Packet;
use crate::ring::Id;

/// In-memory mesh implementation.
pub mod mesh;

pub use mesh::MeshRouter;

/// Moves packets between nodes, and knows the current membership well
/// enough to resolve "closest to key".
#[async_trait]
pub trait Router {
    /// Deliver to the live node numerically closest to `key`.
    async fn route(&self, key: Id, packet: Packet) -> Result<()>;

    /// Deliver straight to node `to`. Sending to the local node is
    /// allowed and goes through the same inbox as remote traffic.
    async fn route_direct(&self, to: Id, packet: Packet) -> Result<()>;
}

/// A [Router] trait object shared between nodes.
pub type SharedRouter = Arc<dyn Router + Send + Sync>;
