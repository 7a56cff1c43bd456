#![warn(missing_docs)]
//! Replica bookkeeping for a node.
//!
//! [ReplicaManager] is the pure state machine: it owns the per-key
//! records and the pending operations, consumes messages and commands,
//! and returns [RmAction]s for the surrounding node loop to carry out.
//! It never performs IO besides its object store.

/// Upcall trait towards the hosting application.
pub mod client;
/// The replica state machine.
pub mod manager;
/// Per-key soft state.
pub mod object;
/// Pending replicate calls and range changes.
pub mod pending;

pub use client::CallbackError;
pub use client::DefaultClient;
pub use client::ReplicaClient;
pub use client::SharedReplicaClient;
pub use manager::ReplicaConfig;
pub use manager::ReplicaManager;
pub use manager::RmAction;
pub use object::ObjectState;
pub use pending::AckOutcome;
pub use pending::PendingRangeChange;
pub use pending::PendingReplication;
