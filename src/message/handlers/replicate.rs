#![warn(missing_docs)]

use async_trait::async_trait;

use crate::error::Result;
use crate::message::types::InsertAck;
use crate::message::types::InsertRequest;
use crate::message::types::Message;
use crate::message::types::ReplicateGrant;
use crate::message::types::ReplicateRequest;
use crate::message::HandleMsg;
use crate::message::Packet;
use crate::replica::ReplicaManager;
use crate::replica::RmAction;

#[async_trait]
impl HandleMsg<ReplicateRequest> for ReplicaManager {
    /// Root side of a replicate call: resolve the replica set for the
    /// key and grant it back to the origin.
    async fn handle(&mut self, ctx: &Packet, msg: &ReplicateRequest) -> Result<Vec<RmAction>> {
        let replica_set = self.resolve_grant(msg.key);
        Ok(vec![RmAction::Reply(
            ctx.from,
            Message::ReplicateGrant(msg.grant(replica_set)),
        )])
    }
}

#[async_trait]
impl HandleMsg<ReplicateGrant> for ReplicaManager {
    /// Origin side: the grant names the holders, push the body to each.
    async fn handle(&mut self, _ctx: &Packet, msg: &ReplicateGrant) -> Result<Vec<RmAction>> {
        Ok(self.record_grant(msg.key, msg.replica_set.clone()))
    }
}

#[async_trait]
impl HandleMsg<InsertRequest> for ReplicaManager {
    /// Holder side: store the body, then ack the origin. Storing twice
    /// overwrites with the same body, so redelivery is harmless.
    async fn handle(&mut self, ctx: &Packet, msg: &InsertRequest) -> Result<Vec<RmAction>> {
        let mut actions = self.store_body(msg.key, msg.object.clone()).await?;
        actions.push(RmAction::Reply(ctx.from, Message::InsertAck(msg.ack())));
        Ok(actions)
    }
}

#[async_trait]
impl HandleMsg<InsertAck> for ReplicaManager {
    async fn handle(&mut self, ctx: &Packet, msg: &InsertAck) -> Result<Vec<RmAction>> {
        Ok(self.record_ack(msg.key, ctx.from))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::replica::ReplicaConfig;
    use crate::ring::Id;
    use crate::storage::MemStorage;

    fn prepare_manager(slot: u32, factor: usize) -> ReplicaManager {
        let config = ReplicaConfig {
            factor,
            ..Default::default()
        };
        ReplicaManager::new(Id::from(slot), config, Arc::new(MemStorage::new()))
    }

    async fn deliver(to: &mut ReplicaManager, from: Id, msg: &Message) -> Vec<RmAction> {
        let packet = Packet::new(from, msg).unwrap();
        to.handle_message(&packet).await.unwrap()
    }

    #[tokio::test]
    async fn test_replicate_exchange_over_packets() {
        let ring: Vec<Id> = [0u32, 100, 200].iter().map(|s| Id::from(*s)).collect();
        let mut origin = prepare_manager(0, 1);
        let mut root = prepare_manager(100, 1);
        let mut peer = prepare_manager(200, 1);
        for manager in [&mut origin, &mut root, &mut peer] {
            manager.update_neighbors(ring.clone()).await.unwrap();
        }

        let key = Id::from(90u32);
        let body = Bytes::from_static(b"replica body");

        // Origin asks the ring who should hold the key.
        let actions = origin.start_replicate(key, body.clone()).unwrap();
        let RmAction::Route(route_key, request) = actions[0].clone() else {
            panic!("expected a routed request, got {:?}", actions[0]);
        };
        assert_eq!(route_key, key);

        // The key's root grants its replica set: itself plus one successor.
        let actions = root.handle_message(&Packet::new(origin.id(), &request).unwrap())
            .await
            .unwrap();
        let RmAction::Reply(reply_to, grant) = actions[0].clone() else {
            panic!("expected a granted reply, got {:?}", actions[0]);
        };
        assert_eq!(reply_to, origin.id());
        assert_eq!(
            grant,
            Message::ReplicateGrant(ReplicateGrant {
                key,
                replica_set: vec![Id::from(100u32), Id::from(200u32)],
            })
        );

        // The grant turns into one push per holder.
        let pushes = deliver(&mut origin, root.id(), &grant).await;
        assert_eq!(pushes.len(), 2);
        let mut acks = vec![];
        for (push, holder) in pushes.iter().zip([&mut root, &mut peer]) {
            let RmAction::Direct(to, insert) = push.clone() else {
                panic!("expected a direct push, got {push:?}");
            };
            assert_eq!(to, holder.id());
            let actions = deliver(holder, origin.id(), &insert).await;
            assert_eq!(actions[0], RmAction::Responsible(key, body.clone()));
            let RmAction::Reply(_, ack) = actions[1].clone() else {
                panic!("expected an ack reply, got {:?}", actions[1]);
            };
            assert_eq!(holder.store().get(key).await.unwrap(), Some(body.clone()));
            acks.push((holder.id(), ack));
        }

        // The final ack settles the call.
        let (first_from, first_ack) = &acks[0];
        assert!(deliver(&mut origin, *first_from, first_ack).await.is_empty());
        let (last_from, last_ack) = &acks[1];
        let actions = deliver(&mut origin, *last_from, last_ack).await;
        assert_eq!(actions, vec![RmAction::ReplicateDone(key, true)]);
        assert!(origin.replications().is_empty());
    }

    #[tokio::test]
    async fn test_insert_redelivery_is_idempotent() {
        let ring: Vec<Id> = [0u32, 100].iter().map(|s| Id::from(*s)).collect();
        let mut holder = prepare_manager(100, 1);
        holder.update_neighbors(ring).await.unwrap();

        let key = Id::from(90u32);
        let insert = Message::InsertRequest(InsertRequest {
            key,
            object: Bytes::from_static(b"only copy"),
        });
        let packet = Packet::new(Id::from(0u32), &insert).unwrap();

        let first = holder.handle_message(&packet).await.unwrap();
        let second = holder.handle_message(&packet).await.unwrap();

        // Both deliveries ack, the store still holds one copy.
        for actions in [&first, &second] {
            assert!(actions.iter().any(|action| matches!(
                action,
                RmAction::Reply(_, Message::InsertAck(ack)) if ack.key == key
            )));
        }
        assert_eq!(holder.store().count().await.unwrap(), 1);
        assert_eq!(holder.objects().len(), 1);
        assert!(holder.objects()[&key].present);
    }
}
