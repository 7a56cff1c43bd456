#![warn(missing_docs)]

use async_trait::async_trait;

use crate::error::Result;
use crate::message::types::HeartbeatRequest;
use crate::message::types::RefreshNotice;
use crate::message::HandleMsg;
use crate::message::Packet;
use crate::replica::ReplicaManager;
use crate::replica::RmAction;

#[async_trait]
impl HandleMsg<HeartbeatRequest> for ReplicaManager {
    /// If this node roots the key it fans out a refresh round, else it
    /// routes the request onward. View skew can keep a request bouncing
    /// for a round or two until snapshots settle.
    async fn handle(&mut self, _ctx: &Packet, msg: &HeartbeatRequest) -> Result<Vec<RmAction>> {
        Ok(self.heartbeat(msg.key))
    }
}

#[async_trait]
impl HandleMsg<RefreshNotice> for ReplicaManager {
    async fn handle(&mut self, ctx: &Packet, msg: &RefreshNotice) -> Result<Vec<RmAction>> {
        Ok(self.note_refresh(msg.key, ctx.from))
    }
}
