#![warn(missing_docs)]
//! A running replica node.
//!
//! [Node] wraps a [ReplicaManager] with the loop that feeds it: an
//! inbox of [NodeEvent]s filled by the routing substrate and by
//! [RmHandle]s, and a pool of armed replicate deadlines. Each call to
//! [Node::listen_once] consumes one event, runs the manager transition
//! and carries out the returned actions. The manager is only ever
//! touched from this loop, so it needs no locks.

use std::sync::Arc;

use async_channel::Receiver;
use async_channel::Sender;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::FutureExt;
use futures::StreamExt;
use futures_timer::Delay;

use crate::error::Error;
use crate::error::Result;
use crate::message::Packet;
use crate::replica::CallbackError;
use crate::replica::DefaultClient;
use crate::replica::ReplicaConfig;
use crate::replica::ReplicaManager;
use crate::replica::RmAction;
use crate::replica::SharedReplicaClient;
use crate::ring::Id;
use crate::routing::SharedRouter;
use crate::storage::MemStorage;
use crate::storage::SharedObjectStorage;

/// What a node's inbox carries.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// An inbound packet.
    Packet(Packet),
    /// A fresh membership snapshot from the routing substrate.
    Neighbors(Vec<Id>),
    /// A local operation injected through an [RmHandle].
    Command(Command),
    /// A replicate deadline fired. Normally produced inside the loop
    /// by an armed timer; tests may inject one to force the deadline.
    ReplicateDeadline(Id),
}

/// Local operations accepted by a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Replicate an object under a key, ring-wide.
    Replicate(Id, Bytes),
    /// Force one refresh round for a key.
    Heartbeat(Id),
    /// Drop the local copy of a key.
    Remove(Id),
    /// Hand back a body the client was asked to fetch.
    CompleteFetch(Id, Bytes),
    /// Run one maintenance pass now.
    Tick,
}

/// Cloneable handle that injects [Command]s into a node's loop. This
/// is the application-facing API of a running node.
#[derive(Clone)]
pub struct RmHandle {
    id: Id,
    tx: Sender<NodeEvent>,
}

impl RmHandle {
    /// The id of the node this handle drives.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Replicate `object` under `key`. The outcome arrives later via
    /// the client's `replicate_success` upcall.
    pub async fn replicate(&self, key: Id, object: Bytes) -> Result<()> {
        self.send(Command::Replicate(key, object)).await
    }

    /// Force one refresh round for `key`.
    pub async fn heartbeat(&self, key: Id) -> Result<()> {
        self.send(Command::Heartbeat(key)).await
    }

    /// Drop the local copy of `key`.
    pub async fn remove(&self, key: Id) -> Result<()> {
        self.send(Command::Remove(key)).await
    }

    /// Hand back a body obtained after a `fetch` upcall.
    pub async fn complete_fetch(&self, key: Id, object: Bytes) -> Result<()> {
        self.send(Command::CompleteFetch(key, object)).await
    }

    /// Run one maintenance pass now.
    pub async fn tick(&self) -> Result<()> {
        self.send(Command::Tick).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(NodeEvent::Command(command))
            .await
            .map_err(|_| Error::ChannelSendFailed)
    }
}

/// Creates a NodeBuilder to configure a [Node].
pub struct NodeBuilder {
    id: Id,
    router: SharedRouter,
    config: ReplicaConfig,
    storage: Option<SharedObjectStorage>,
    client: Option<SharedReplicaClient>,
}

impl NodeBuilder {
    /// Creates new instance of [NodeBuilder].
    pub fn new(id: Id, router: SharedRouter) -> Self {
        Self {
            id,
            router,
            config: ReplicaConfig::default(),
            storage: None,
            client: None,
        }
    }

    /// Sets up how many copies are kept besides the root.
    pub fn factor(mut self, factor: usize) -> Self {
        self.config.factor = factor;
        self
    }

    /// Sets up the quiet ticks tolerated before a copy is orphaned.
    pub fn stale_limit(mut self, limit: u32) -> Self {
        self.config.stale_limit = limit;
        self
    }

    /// Sets up the refresh misses tolerated before a fetch escalates.
    pub fn missing_limit(mut self, limit: u32) -> Self {
        self.config.missing_limit = limit;
        self
    }

    /// Sets up the whole engine configuration at once.
    pub fn config(mut self, config: ReplicaConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind an object store. Defaults to a fresh [MemStorage].
    pub fn storage(mut self, storage: SharedObjectStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Bind an upcall client. Defaults to one that ignores everything.
    pub fn client(mut self, client: SharedReplicaClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the [Node].
    pub fn build(self) -> Node {
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemStorage::new()));
        let client = self.client.unwrap_or_else(|| Arc::new(DefaultClient));
        let manager = ReplicaManager::new(self.id, self.config, storage);
        let (inbox_tx, inbox) = async_channel::unbounded();

        Node {
            manager,
            inbox_tx,
            inbox,
            router: self.router,
            client,
            deadlines: FuturesUnordered::new(),
        }
    }
}

/// The event loop around one [ReplicaManager].
pub struct Node {
    manager: ReplicaManager,
    inbox_tx: Sender<NodeEvent>,
    inbox: Receiver<NodeEvent>,
    router: SharedRouter,
    client: SharedReplicaClient,
    deadlines: FuturesUnordered<BoxFuture<'static, Id>>,
}

impl Node {
    /// Get id of self.
    pub fn id(&self) -> Id {
        self.manager.id()
    }

    /// The wrapped state machine, for inspection.
    pub fn manager(&self) -> &ReplicaManager {
        &self.manager
    }

    /// A handle for injecting local operations into this node's loop.
    pub fn handle(&self) -> RmHandle {
        RmHandle {
            id: self.id(),
            tx: self.inbox_tx.clone(),
        }
    }

    /// The inbox sender, for registering this node with a router.
    pub fn inbox_sender(&self) -> Sender<NodeEvent> {
        self.inbox_tx.clone()
    }

    /// Whether the inbox is currently drained. Armed deadlines do not
    /// count; they fire on their own schedule.
    pub fn is_idle(&self) -> bool {
        self.inbox.is_empty()
    }

    /// Consume and process one event. Returns the processed event, or
    /// None once the inbox is closed. Transition errors are logged,
    /// not propagated; one poisonous packet must not stop the loop.
    pub async fn listen_once(&mut self) -> Option<NodeEvent> {
        let event = if self.deadlines.is_empty() {
            match self.inbox.recv().await {
                Ok(event) => event,
                Err(_) => return None,
            }
        } else {
            futures::select! {
                event = self.inbox.recv().fuse() => match event {
                    Ok(event) => event,
                    Err(_) => return None,
                },
                key = self.deadlines.select_next_some() => NodeEvent::ReplicateDeadline(key),
            }
        };
        self.process(event.clone()).await;
        Some(event)
    }

    /// Process events until the inbox closes.
    pub async fn listen(&mut self) {
        while self.listen_once().await.is_some() {}
        tracing::info!("[{}] inbox closed, node loop ends", self.id());
    }

    async fn process(&mut self, event: NodeEvent) {
        let mut reply_tx = None;
        let transition = match event {
            NodeEvent::Packet(packet) => {
                reply_tx = Some(packet.tx_id);
                self.manager.handle_message(&packet).await
            }
            NodeEvent::Neighbors(snapshot) => self.manager.update_neighbors(snapshot).await,
            NodeEvent::ReplicateDeadline(key) => Ok(self.manager.replicate_timeout(key)),
            NodeEvent::Command(Command::Replicate(key, object)) => {
                self.manager.start_replicate(key, object)
            }
            NodeEvent::Command(Command::Heartbeat(key)) => Ok(self.manager.heartbeat(key)),
            NodeEvent::Command(Command::Remove(key)) => self.manager.remove(key).await,
            NodeEvent::Command(Command::CompleteFetch(key, object)) => {
                self.manager.complete_fetch(key, object).await
            }
            NodeEvent::Command(Command::Tick) => self.manager.maintenance_tick().await,
        };

        match transition {
            Ok(actions) => self.execute(reply_tx, actions).await,
            Err(e) => tracing::error!("[{}] event handling failed: {}", self.id(), e),
        }
    }

    async fn execute(&mut self, reply_tx: Option<uuid::Uuid>, actions: Vec<RmAction>) {
        for action in actions {
            if let Err(e) = self.execute_one(reply_tx, action).await {
                tracing::warn!("[{}] action dropped: {}", self.id(), e);
            }
        }
    }

    /// Carry out one action. Send failures are soft: the protocol
    /// already assumes messages can be lost.
    async fn execute_one(&mut self, reply_tx: Option<uuid::Uuid>, action: RmAction) -> Result<()> {
        match action {
            RmAction::Route(key, message) => {
                let packet = Packet::new(self.id(), &message)?;
                self.router.route(key, packet).await
            }
            RmAction::Direct(to, message) => {
                let packet = Packet::new(self.id(), &message)?;
                self.router.route_direct(to, packet).await
            }
            RmAction::Reply(to, message) => {
                let packet = match reply_tx {
                    Some(tx_id) => Packet::new_with_tx(self.id(), tx_id, &message)?,
                    None => Packet::new(self.id(), &message)?,
                };
                self.router.route_direct(to, packet).await
            }
            RmAction::ArmTimeout(key) => {
                let timeout = self.manager.config().replicate_timeout;
                self.deadlines
                    .push(Delay::new(timeout).map(move |_| key).boxed());
                Ok(())
            }
            RmAction::ReplicateDone(key, ok) => {
                let result = self.client.replicate_success(key, ok).await;
                self.log_upcall("replicate_success", result);
                Ok(())
            }
            RmAction::Responsible(key, object) => {
                let result = self.client.responsible(key, &object).await;
                self.log_upcall("responsible", result);
                Ok(())
            }
            RmAction::NotResponsible(key) => {
                let result = self.client.not_responsible(key).await;
                self.log_upcall("not_responsible", result);
                Ok(())
            }
            RmAction::Refreshed(key) => {
                let result = self.client.refresh(key).await;
                self.log_upcall("refresh", result);
                Ok(())
            }
            RmAction::Fetch(keys) => {
                let result = self.client.fetch(&keys).await;
                self.log_upcall("fetch", result);
                Ok(())
            }
            RmAction::Ready => {
                let result = self.client.rm_is_ready().await;
                self.log_upcall("rm_is_ready", result);
                Ok(())
            }
        }
    }

    fn log_upcall(&self, what: &str, result: std::result::Result<(), CallbackError>) {
        if let Err(e) = result {
            tracing::warn!("[{}] client {} upcall failed: {}", self.id(), what, e);
        }
    }
}
