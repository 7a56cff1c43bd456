#![warn(missing_docs)]
//! Message handlers of the replica protocol.
//!
//! Each wire message gets its own [HandleMsg] impl on
//! [ReplicaManager]. Handlers mutate manager state and return
//! [RmAction]s; sending, timers and upcalls stay in the node loop.
//! Every handler must tolerate duplicated and late packets.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::types::Message;
use crate::message::Packet;
use crate::replica::ReplicaManager;
use crate::replica::RmAction;

/// Handlers for the replicate exchange.
pub mod replicate;
/// Handlers for heartbeats and refresh notices.
pub mod refresh;

/// Generic trait for handling one message type, actor style.
#[async_trait]
pub trait HandleMsg<T> {
    /// Message handler.
    async fn handle(&mut self, ctx: &Packet, msg: &T) -> Result<Vec<RmAction>>;
}

impl ReplicaManager {
    /// Decode an inbound packet and dispatch it to the matching handler.
    pub async fn handle_message(&mut self, ctx: &Packet) -> Result<Vec<RmAction>> {
        let message: Message = ctx.body()?;
        tracing::debug!("[{}] <- {} from {}", self.id(), message, ctx.from);

        match &message {
            Message::ReplicateRequest(ref msg) => self.handle(ctx, msg).await,
            Message::ReplicateGrant(ref msg) => self.handle(ctx, msg).await,
            Message::InsertRequest(ref msg) => self.handle(ctx, msg).await,
            Message::InsertAck(ref msg) => self.handle(ctx, msg).await,
            Message::HeartbeatRequest(ref msg) => self.handle(ctx, msg).await,
            Message::RefreshNotice(ref msg) => self.handle(ctx, msg).await,
        }
    }
}
