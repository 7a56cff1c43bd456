//! Whole-ring scenarios over the in-memory mesh.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use rand::RngCore;
use rand::SeedableRng;

use crate::consts::ID_LEN;
use crate::node::Node;
use crate::node::NodeBuilder;
use crate::node::RmHandle;
use crate::replica::CallbackError;
use crate::replica::ReplicaClient;
use crate::replica::ReplicaManager;
use crate::ring::Id;
use crate::ring::IdSet;
use crate::routing::MeshRouter;


#[allow(dead_code)]
pub fn setup_tracing() {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

/// One upcall as a test client saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum Upcall {
    ReplicateDone(Id, bool),
    Responsible(Id),
    NotResponsible(Id),
    Refreshed(Id),
    Fetch(IdSet),
    Ready,
}

pub struct TestClient {
    upcall_tx: tokio::sync::mpsc::UnboundedSender<Upcall>,
}

#[async_trait]
impl ReplicaClient for TestClient {
    async fn replicate_success(&self, key: Id, ok: bool) -> Result<(), CallbackError> {
        self.upcall_tx
            .send(Upcall::ReplicateDone(key, ok))
            .map_err(|e| e.into())
    }

    async fn responsible(&self, key: Id, _object: &Bytes) -> Result<(), CallbackError> {
        self.upcall_tx
            .send(Upcall::Responsible(key))
            .map_err(|e| e.into())
    }

    async fn not_responsible(&self, key: Id) -> Result<(), CallbackError> {
        self.upcall_tx
            .send(Upcall::NotResponsible(key))
            .map_err(|e| e.into())
    }

    async fn refresh(&self, key: Id) -> Result<(), CallbackError> {
        self.upcall_tx
            .send(Upcall::Refreshed(key))
            .map_err(|e| e.into())
    }

    async fn fetch(&self, keys: &IdSet) -> Result<(), CallbackError> {
        self.upcall_tx
            .send(Upcall::Fetch(keys.clone()))
            .map_err(|e| e.into())
    }

    async fn rm_is_ready(&self) -> Result<(), CallbackError> {
        self.upcall_tx.send(Upcall::Ready).map_err(|e| e.into())
    }
}

pub struct TestNode {
    pub node: Node,
    upcalls: tokio::sync::mpsc::UnboundedReceiver<Upcall>,
}

impl TestNode {
    pub fn id(&self) -> Id {
        self.node.id()
    }

    pub fn handle(&self) -> RmHandle {
        self.node.handle()
    }

    pub fn manager(&self) -> &ReplicaManager {
        self.node.manager()
    }

    /// Everything the client heard since the last drain.
    pub fn drain_upcalls(&mut self) -> Vec<Upcall> {
        let mut upcalls = vec![];
        while let Ok(upcall) = self.upcalls.try_recv() {
            upcalls.push(upcall);
        }
        upcalls
    }
}

pub async fn prepare_node(mesh: &Arc<MeshRouter>, id: Id, factor: usize) -> TestNode {
    let (upcall_tx, upcalls) = tokio::sync::mpsc::unbounded_channel();
    let node = NodeBuilder::new(id, mesh.clone())
        .factor(factor)
        .client(Arc::new(TestClient { upcall_tx }))
        .build();
    mesh.join(node.id(), node.inbox_sender()).await;
    TestNode { node, upcalls }
}

pub async fn prepare_ring(ids: &[Id], factor: usize) -> (Arc<MeshRouter>, Vec<TestNode>) {
    let mesh = Arc::new(MeshRouter::new());
    let mut nodes = Vec::with_capacity(ids.len());
    for id in ids {
        nodes.push(prepare_node(&mesh, *id, factor).await);
    }
    settle(&mut nodes).await;
    (mesh, nodes)
}

/// Drive every node until no inbox holds an event. Processing an event
/// may enqueue onto nodes already visited, so sweeps repeat until one
/// finds nothing. Armed replicate deadlines are left to their timers.
pub async fn settle(nodes: &mut [TestNode]) {
    loop {
        let mut progressed = false;
        for test_node in nodes.iter_mut() {
            while !test_node.node.is_idle() {
                test_node.node.listen_once().await;
                progressed = true;
            }
        }
        if !progressed {
            return;
        }
    }
}

/// Serve every outstanding fetch upcall from `bodies`, the way an
/// application would pull from a current holder. Other queued upcalls
/// are discarded. Returns how many bodies were handed back.
pub async fn serve_fetches(nodes: &mut [TestNode], bodies: &HashMap<Id, Bytes>) -> usize {
    let mut served = 0;
    for test_node in nodes.iter_mut() {
        let handle = test_node.handle();
        for upcall in test_node.drain_upcalls() {
            if let Upcall::Fetch(keys) = upcall {
                for key in keys {
                    handle.complete_fetch(key, bodies[&key].clone()).await.unwrap();
                    served += 1;
                }
            }
        }
    }
    settle(nodes).await;
    served
}

/// One maintenance round over the whole ring: every node ticks, the
/// traffic settles, and fetch upcalls are served from `bodies`.
pub async fn maintenance_round(nodes: &mut [TestNode], bodies: &HashMap<Id, Bytes>) -> usize {
    for test_node in nodes.iter() {
        test_node.handle().tick().await.unwrap();
    }
    settle(nodes).await;
    serve_fetches(nodes, bodies).await
}

pub fn managers(nodes: &[TestNode]) -> Vec<&ReplicaManager> {
    nodes.iter().map(|test_node| test_node.manager()).collect()
}

pub fn slots(slots: &[u32]) -> Vec<Id> {
    slots.iter().map(|slot| Id::from(*slot)).collect()
}

pub fn body_of(key: Id) -> Bytes {
    Bytes::from(format!("body of {}", key))
}

/// Deterministic pseudo-random ids for whole-ring scenarios.
pub fn gen_ids(count: usize, seed: u64) -> Vec<Id> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut ids = Vec::with_capacity(count);
    while ids.len() < count {
        let mut bytes = [0u8; ID_LEN];
        rng.fill_bytes(&mut bytes);
        let id = Id::from_bytes(bytes);
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}
