//! Replica ring: soft-state replica management over a key ring.
//! --------------
//! - [Id](crate::ring::Id) is a 160-bit ring identifier. Every node and every
//!   object key lives at one point of the ring.
//! - [ReplicaManager](crate::replica::ReplicaManager) is the per-node state
//!   machine deciding which keys the node must hold and how fresh each copy is.
//! - [Node](crate::node::Node) wraps a manager with the single-writer event
//!   loop that moves packets, timers and client upcalls.
//! - [MeshRouter](crate::routing::MeshRouter) is the in-memory routing
//!   substrate used by tests and simulations.
//!
//! # Placement
//!
//! An object's *root* is the live node numerically closest to its key, where
//! distance is measured along the shorter arc of the ring and exact ties go to
//! the clockwise candidate. Around the root, the *replica set* is the root plus
//! its `k` clockwise successors, so every object has `k + 1` copies. Placement
//! is never negotiated: each node derives its *primary range* (keys it roots)
//! and *replicated range* (keys it must hold) from the membership snapshots the
//! routing substrate pushes, and acts on its own view.
//!
//! # Keeping copies alive
//!
//! There is no consensus and no retransmission. A replicate call pushes the
//! body to the granted set and counts acks until a deadline; afterwards the
//! periodic maintenance pass takes over. Each round the root of a key fans out
//! refresh notices to the whole replica set, itself included. Holders that stop
//! hearing refreshes count quiet rounds and eventually drop the copy, or adopt
//! it as their own if the key moved into their primary range. Holders told
//! about a key they miss count the notices and eventually ask their client to
//! fetch the body out of band. Lost messages therefore cost freshness, not
//! correctness.
//!
//! # Wiring
//!
//! A node is assembled with [NodeBuilder](crate::node::NodeBuilder), driven
//! through a cloneable [RmHandle](crate::node::RmHandle), and reports back
//! through the [ReplicaClient](crate::replica::ReplicaClient) callback trait.
//! A [Maintainer](crate::maintenance::Maintainer) ticks the maintenance pass
//! on an interval.

pub mod consts;
pub mod error;
pub mod inspect;
pub mod maintenance;
pub mod message;
pub mod node;
pub mod replica;
pub mod ring;
pub mod routing;
pub mod storage;
#[cfg(test)]
mod tests;

pub use async_trait::async_trait;

pub use crate::error::Error;
pub use crate::error::Result;
