#![warn(missing_docs)]
//! All nodes of a simulated ring share one [MeshRouter]. It keeps a
//! registry of inbox senders and resolves key routing by numeric
//! closeness over whoever is currently registered. Joins and leaves
//! push a fresh sorted membership snapshot to every member.
//!
//! Delivery is reliable and unordered between nodes, which is a
//! stronger substrate than the protocol assumes. Loss is simulated in
//! tests by dropping nodes, not packets.

use async_channel::Sender;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Error;
use crate::error::Result;
use crate::message::Packet;
use crate::node::NodeEvent;
use crate::ring::Id;
use crate::ring::RingOrder;
use crate::routing::Router;

/// In-memory routing substrate.
#[derive(Default)]
pub struct MeshRouter {
    inboxes: DashMap<Id, Sender<NodeEvent>>,
}

impl MeshRouter {
    /// An empty mesh.
    pub fn new() -> Self {
        Self {
            inboxes: DashMap::new(),
        }
    }

    /// Register a node's inbox and notify every member, the joiner
    /// included, of the new membership.
    pub async fn join(&self, id: Id, inbox: Sender<NodeEvent>) {
        self.inboxes.insert(id, inbox);
        tracing::info!("[mesh] {} joined, {} members", id, self.inboxes.len());
        self.broadcast_membership().await;
    }

    /// Drop a node. Packets queued in its inbox are lost with it.
    pub async fn leave(&self, id: Id) {
        if self.inboxes.remove(&id).is_none() {
            tracing::warn!("[mesh] leave by unknown member {}", id);
            return;
        }
        tracing::info!("[mesh] {} left, {} members", id, self.inboxes.len());
        self.broadcast_membership().await;
    }

    /// Current membership, sorted by id.
    pub fn members(&self) -> Vec<Id> {
        let mut members: Vec<Id> = self.inboxes.iter().map(|entry| *entry.key()).collect();
        members.sort();
        members
    }

    /// The registered node numerically closest to `key`.
    pub fn closest(&self, key: Id) -> Result<Id> {
        let mut members: Vec<Id> = self.inboxes.iter().map(|entry| *entry.key()).collect();
        if members.is_empty() {
            return Err(Error::RingEmpty(key));
        }
        members.sort_clockwise(key);
        // The closest member is either the first one at or after the
        // key, or the last one before it.
        Ok(key.closer(members[0], members[members.len() - 1]))
    }

    async fn broadcast_membership(&self) {
        let members = self.members();
        // Snapshot senders before awaiting so no registry lock is held
        // across a send.
        let targets: Vec<(Id, Sender<NodeEvent>)> = self
            .inboxes
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        for (id, inbox) in targets {
            if inbox
                .send(NodeEvent::Neighbors(members.clone()))
                .await
                .is_err()
            {
                tracing::warn!("[mesh] inbox of {} is gone", id);
            }
        }
    }
}

#[async_trait]
impl Router for MeshRouter {
    async fn route(&self, key: Id, packet: Packet) -> Result<()> {
        let to = self.closest(key)?;
        tracing::debug!("[mesh] routing {} -> {} (keyed {})", packet.from, to, key);
        self.route_direct(to, packet).await
    }

    async fn route_direct(&self, to: Id, packet: Packet) -> Result<()> {
        let inbox = match self.inboxes.get(&to) {
            Some(entry) => entry.value().clone(),
            None => return Err(Error::NodeGone(to)),
        };
        inbox
            .send(NodeEvent::Packet(packet))
            .await
            .map_err(|_| Error::InboxClosed(to))
    }
}
