//! The replica engine.
#![warn(missing_docs)]
use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;

use crate::consts::DEFAULT_MAINTENANCE_INTERVAL_MS;
use crate::consts::DEFAULT_MISSING_LIMIT;
use crate::consts::DEFAULT_REPLICATE_TIMEOUT_MS;
use crate::consts::DEFAULT_REPLICATION_FACTOR;
use crate::consts::DEFAULT_STALE_LIMIT;
use crate::error::Error;
use crate::error::Result;
use crate::message::types::HeartbeatRequest;
use crate::message::types::InsertRequest;
use crate::message::types::Message;
use crate::message::types::RefreshNotice;
use crate::message::types::ReplicateRequest;
use crate::replica::object::ObjectState;
use crate::replica::pending::AckOutcome;
use crate::replica::pending::PendingRangeChange;
use crate::replica::pending::PendingReplication;
use crate::ring::Id;
use crate::ring::IdRange;
use crate::ring::IdSet;
use crate::ring::NeighborView;
use crate::storage::SharedObjectStorage;

/// Tuning knobs of the replica engine.
#[derive(Clone, Debug)]
pub struct ReplicaConfig {
    /// Extra copies kept besides the root. The replica set of every
    /// key has `factor + 1` members.
    pub factor: usize,
    /// Quiet maintenance ticks tolerated before a held replica is
    /// treated as orphaned. An orphaned copy heartbeats whoever roots
    /// the key now, and is dropped after twice the limit.
    pub stale_limit: u32,
    /// Refresh notices tolerated for an absent body before the fetch
    /// is escalated again.
    pub missing_limit: u32,
    /// Deadline for collecting InsertAcks after a replicate call.
    pub replicate_timeout: Duration,
    /// Period of the maintenance tick.
    pub maintenance_interval: Duration,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            factor: DEFAULT_REPLICATION_FACTOR,
            stale_limit: DEFAULT_STALE_LIMIT,
            missing_limit: DEFAULT_MISSING_LIMIT,
            replicate_timeout: Duration::from_millis(DEFAULT_REPLICATE_TIMEOUT_MS),
            maintenance_interval: Duration::from_millis(DEFAULT_MAINTENANCE_INTERVAL_MS),
        }
    }
}

/// `ReplicaManager` uses this to describe the outcome of a transition.
/// Sometimes everything is settled internally, sometimes the node
/// loop must continue the process: send a message, arm a timer, or
/// notify the client. The manager itself never performs I/O beyond
/// its own store.
#[derive(Clone, Debug, PartialEq)]
pub enum RmAction {
    /// Send a message toward the live node closest to the key.
    Route(Id, Message),
    /// Send a message straight to a known node.
    Direct(Id, Message),
    /// Answer the sender of the packet being handled, reusing its
    /// tx_id.
    Reply(Id, Message),
    /// Arm the replicate deadline for this key.
    ArmTimeout(Id),
    /// Tell the client how its replicate call ended.
    ReplicateDone(Id, bool),
    /// Tell the client this node now holds the key with this body.
    Responsible(Id, Bytes),
    /// Tell the client the key left this node's responsibility.
    NotResponsible(Id),
    /// Tell the client the key was confirmed alive by its root.
    Refreshed(Id),
    /// Ask the client to obtain bodies for these keys.
    Fetch(IdSet),
    /// Tell the client the startup range is fully synced.
    Ready,
}

/// Soft-state replica manager for one node.
///
/// Owns which keys this node must hold and how fresh each copy is.
/// Every public method is one atomic transition: it mutates local
/// state and returns the [RmAction]s the caller must carry out. The
/// caller is the single writer; nothing in here locks.
pub struct ReplicaManager {
    id: Id,
    config: ReplicaConfig,
    view: NeighborView,
    primary: IdRange,
    replicated: IdRange,
    objects: BTreeMap<Id, ObjectState>,
    replications: BTreeMap<Id, PendingReplication>,
    range_changes: BTreeMap<u64, PendingRangeChange>,
    next_op: u64,
    started: bool,
    startup_op: Option<u64>,
    ready_sent: bool,
    store: SharedObjectStorage,
}

impl ReplicaManager {
    /// New manager for node `id` over the given local store.
    pub fn new(id: Id, config: ReplicaConfig, store: SharedObjectStorage) -> Self {
        let view = NeighborView::new(id);
        let primary = view.primary_range();
        let replicated = view.replicated_range(config.factor);
        Self {
            id,
            config,
            view,
            primary,
            replicated,
            objects: BTreeMap::new(),
            replications: BTreeMap::new(),
            range_changes: BTreeMap::new(),
            next_op: 0,
            started: false,
            startup_op: None,
            ready_sent: false,
            store,
        }
    }

    /// The id of this node.
    pub fn id(&self) -> Id {
        self.id
    }

    /// The engine configuration.
    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    /// The membership snapshot currently in effect.
    pub fn view(&self) -> &NeighborView {
        &self.view
    }

    /// Keys this node believes it roots.
    pub fn primary_range(&self) -> IdRange {
        self.primary
    }

    /// Keys this node must hold a copy of.
    pub fn replicated_range(&self) -> IdRange {
        self.replicated
    }

    /// Per-key bookkeeping, for inspection.
    pub fn objects(&self) -> &BTreeMap<Id, ObjectState> {
        &self.objects
    }

    /// In-flight replicate calls, for inspection.
    pub fn replications(&self) -> &BTreeMap<Id, PendingReplication> {
        &self.replications
    }

    /// In-flight range transitions, for inspection.
    pub fn range_changes(&self) -> &BTreeMap<u64, PendingRangeChange> {
        &self.range_changes
    }

    /// Whether the startup range sync has completed.
    pub fn is_ready(&self) -> bool {
        self.ready_sent
    }

    /// The object store backing this node.
    pub fn store(&self) -> &SharedObjectStorage {
        &self.store
    }

    /// Feed a fresh membership snapshot from the routing substrate
    /// and process the resulting range deltas.
    pub async fn update_neighbors(&mut self, snapshot: Vec<Id>) -> Result<Vec<RmAction>> {
        let changed = self.view.update(snapshot);
        if changed {
            tracing::debug!(
                "[{}] neighbor view changed, ring size {}",
                self.id,
                self.view.ring_size()
            );
        }
        if !changed && self.started {
            return Ok(vec![]);
        }
        self.derive_ranges().await
    }

    /// Begin replicating `object` under `key`: route a request to the
    /// key's root and leave a continuation awaiting the grant.
    pub fn start_replicate(&mut self, key: Id, object: Bytes) -> Result<Vec<RmAction>> {
        if self.replications.contains_key(&key) {
            return Err(Error::ReplicationPending(key));
        }
        tracing::debug!("[{}] replicate {} started", self.id, key);
        self.replications
            .insert(key, PendingReplication::new(key, object));
        Ok(vec![
            RmAction::Route(key, Message::ReplicateRequest(ReplicateRequest { key })),
            RmAction::ArmTimeout(key),
        ])
    }

    /// The replicate deadline for `key` fired. A deadline that lost
    /// the race against completion is ignored.
    pub fn replicate_timeout(&mut self, key: Id) -> Vec<RmAction> {
        let Some(pending) = self.replications.remove(&key) else {
            tracing::debug!("[{}] stale replicate deadline for {}", self.id, key);
            return vec![];
        };
        let ok = pending.timeout_verdict();
        if ok {
            tracing::warn!(
                "[{}] replicate {} timed out with {}/{} acks, counting as stored",
                self.id,
                key,
                pending.ack_count(),
                pending.granted().len()
            );
        } else {
            tracing::warn!("[{}] replicate {} timed out with no acks", self.id, key);
        }
        vec![RmAction::ReplicateDone(key, ok)]
    }

    /// Force one refresh round for `key`. Roots fan out notices,
    /// everyone else routes the request toward the root.
    ///
    /// A heartbeat for a rooted key this node has never heard of is
    /// how a root that took over through churn learns the key exists
    /// at all: the record is seeded and a fetch escalates right away.
    pub fn heartbeat(&mut self, key: Id) -> Vec<RmAction> {
        if !self.primary.contains(key) {
            return vec![RmAction::Route(
                key,
                Message::HeartbeatRequest(HeartbeatRequest { key }),
            )];
        }
        if let Some(state) = self.objects.get_mut(&key) {
            if state.present {
                return self.refresh_fanout(key);
            }
            let misses = state.still_missing();
            if misses < self.config.missing_limit {
                return vec![];
            }
            state.fetch_requested();
            tracing::debug!(
                "[{}] heartbeat escalating fetch for {} after {} misses",
                self.id,
                key,
                misses
            );
            return self.escalate_fetch(key);
        }
        tracing::info!("[{}] learned rooted key {} from a heartbeat", self.id, key);
        self.objects.insert(key, ObjectState::reported());
        self.escalate_fetch(key)
    }

    /// Remove `key` locally. No wire traffic: if this node was the
    /// key's refresher, the remaining copies decay through staleness;
    /// otherwise the root keeps the set alive and this node will be
    /// re-healed like any missing replica.
    pub async fn remove(&mut self, key: Id) -> Result<Vec<RmAction>> {
        if self.objects.remove(&key).is_none() {
            tracing::debug!("[{}] remove for unknown key {}", self.id, key);
        }
        self.store.delete(key).await?;
        Ok(self.retire_from_changes(key))
    }

    /// The client obtained a body for a key it was asked to fetch.
    pub async fn complete_fetch(&mut self, key: Id, object: Bytes) -> Result<Vec<RmAction>> {
        if !self.replicated.contains(key) {
            tracing::warn!(
                "[{}] fetched body for {} arrived after the range moved away",
                self.id,
                key
            );
            return Ok(self.retire_from_changes(key));
        }
        if !self.is_fetching(key) {
            tracing::debug!("[{}] unsolicited body for {}", self.id, key);
        }
        self.store.put(key, &object).await?;
        self.objects
            .entry(key)
            .and_modify(|state| state.body_arrived())
            .or_insert_with(ObjectState::held);
        let mut actions = self.retire_from_changes(key);
        actions.push(RmAction::Responsible(key, object));
        Ok(actions)
    }

    /// One maintenance tick: age every held copy, apply the staleness
    /// thresholds, fan out refreshes for rooted keys, then re-derive
    /// the ranges.
    pub async fn maintenance_tick(&mut self) -> Result<Vec<RmAction>> {
        let mut actions = vec![];

        for state in self.objects.values_mut() {
            state.tick();
        }

        let quiet: Vec<(Id, u32)> = self
            .objects
            .iter()
            .filter(|(_, state)| state.present && state.stale_count > self.config.stale_limit)
            .map(|(key, state)| (*key, state.stale_count))
            .collect();
        let drop_limit = 2 * self.config.stale_limit;
        for (key, stale) in quiet {
            if self.primary.contains(key) {
                tracing::info!("[{}] adopting orphaned key {}", self.id, key);
                if let Some(state) = self.objects.get_mut(&key) {
                    state.adopted();
                }
            } else if stale > drop_limit {
                tracing::info!("[{}] dropping {} after quiet root", self.id, key);
                self.objects.remove(&key);
                self.store.delete(key).await?;
                actions.push(RmAction::NotResponsible(key));
            } else {
                // Churn may have handed the key to a root that never
                // saw it. A routed heartbeat lets it take over before
                // this copy is dropped.
                tracing::debug!(
                    "[{}] {} quiet for {} ticks, routing a heartbeat",
                    self.id,
                    key,
                    stale
                );
                actions.push(RmAction::Route(
                    key,
                    Message::HeartbeatRequest(HeartbeatRequest { key }),
                ));
            }
        }

        let rooted: Vec<Id> = self
            .objects
            .iter()
            .filter(|(key, state)| state.present && self.primary.contains(**key))
            .map(|(key, _)| *key)
            .collect();
        for key in rooted {
            actions.extend(self.refresh_fanout(key));
        }

        actions.extend(self.derive_ranges().await?);
        Ok(actions)
    }

    /// Resolve the replica set this node would grant for `key`.
    pub(crate) fn resolve_grant(&self, key: Id) -> Vec<Id> {
        if !self.primary.contains(key) {
            tracing::debug!(
                "[{}] granting for {} outside own primary range",
                self.id,
                key
            );
        }
        self.view.replica_set(key, self.config.factor + 1)
    }

    /// A grant arrived for an awaiting replicate call: push the body
    /// to every member of the granted set.
    pub(crate) fn record_grant(&mut self, key: Id, replica_set: Vec<Id>) -> Vec<RmAction> {
        let Some(pending) = self.replications.get_mut(&key) else {
            tracing::warn!("[{}] grant for {} arrived after settling", self.id, key);
            return vec![];
        };
        if replica_set.is_empty() {
            tracing::warn!("[{}] empty grant for {}", self.id, key);
            self.replications.remove(&key);
            return vec![RmAction::ReplicateDone(key, false)];
        }
        if !pending.grant(replica_set.clone()) {
            tracing::warn!("[{}] duplicate grant for {}", self.id, key);
            return vec![];
        }
        let object = pending.object();
        tracing::debug!(
            "[{}] pushing {} to {} members",
            self.id,
            key,
            replica_set.len()
        );
        replica_set
            .into_iter()
            .map(|to| {
                RmAction::Direct(
                    to,
                    Message::InsertRequest(InsertRequest {
                        key,
                        object: object.clone(),
                    }),
                )
            })
            .collect()
    }

    /// Store a pushed or fetched body and mark the key held. A body
    /// for a key already held overwrites it and is acked like the
    /// first one.
    pub(crate) async fn store_body(&mut self, key: Id, object: Bytes) -> Result<Vec<RmAction>> {
        if matches!(self.objects.get(&key), Some(state) if state.present) {
            tracing::warn!("[{}] duplicate body for already held {}", self.id, key);
        }
        self.store.put(key, &object).await?;
        self.objects
            .entry(key)
            .and_modify(|state| state.body_arrived())
            .or_insert_with(ObjectState::held);
        let mut actions = self.retire_from_changes(key);
        actions.push(RmAction::Responsible(key, object));
        Ok(actions)
    }

    /// Count one InsertAck against the matching replicate call.
    pub(crate) fn record_ack(&mut self, key: Id, from: Id) -> Vec<RmAction> {
        let Some(pending) = self.replications.get_mut(&key) else {
            tracing::debug!("[{}] ack for settled replication {} from {}", self.id, key, from);
            return vec![];
        };
        match pending.record_ack(from) {
            AckOutcome::Complete => {
                tracing::debug!("[{}] replicate {} fully acked", self.id, key);
                self.replications.remove(&key);
                vec![RmAction::ReplicateDone(key, true)]
            }
            AckOutcome::Counted => vec![],
            AckOutcome::Duplicate => {
                tracing::debug!("[{}] duplicate ack for {} from {}", self.id, key, from);
                vec![]
            }
            AckOutcome::Stranger => {
                tracing::warn!(
                    "[{}] ack for {} from {} outside the granted set",
                    self.id,
                    key,
                    from
                );
                vec![]
            }
        }
    }

    /// Process one RefreshNotice for `key` sent by `from`.
    pub(crate) fn note_refresh(&mut self, key: Id, from: Id) -> Vec<RmAction> {
        if let Some(state) = self.objects.get_mut(&key) {
            if state.present {
                state.refreshed();
                return vec![RmAction::Refreshed(key)];
            }
            let misses = state.still_missing();
            if misses < self.config.missing_limit {
                return vec![];
            }
            state.fetch_requested();
            tracing::debug!(
                "[{}] escalating fetch for {} after {} misses",
                self.id,
                key,
                misses
            );
            return self.escalate_fetch(key);
        }
        if self.replicated.contains(key) {
            tracing::debug!("[{}] learned {} from refresh by {}", self.id, key, from);
            let mut state = ObjectState::reported();
            state.still_missing();
            self.objects.insert(key, state);
            return vec![];
        }
        tracing::warn!(
            "[{}] refresh for {} from {} outside replicated range",
            self.id,
            key,
            from
        );
        vec![]
    }

    /// Notices for one rooted key to its whole replica set, the local
    /// node included.
    fn refresh_fanout(&self, key: Id) -> Vec<RmAction> {
        self.view
            .replica_set(key, self.config.factor + 1)
            .into_iter()
            .map(|to| RmAction::Direct(to, Message::RefreshNotice(RefreshNotice { key })))
            .collect()
    }

    /// Re-derive both ranges from the view and process the deltas
    /// against held state.
    async fn derive_ranges(&mut self) -> Result<Vec<RmAction>> {
        let new_primary = self.view.primary_range();
        let new_replicated = self.view.replicated_range(self.config.factor);
        if new_replicated != self.replicated {
            tracing::info!(
                "[{}] replicated range now {}, primary {}",
                self.id,
                new_replicated,
                new_primary
            );
        }

        let mut actions = vec![];

        let lost: Vec<Id> = self
            .objects
            .keys()
            .filter(|key| !new_replicated.contains(**key))
            .copied()
            .collect();
        for key in lost {
            self.objects.remove(&key);
            self.store.delete(key).await?;
            actions.extend(self.retire_from_changes(key));
            actions.push(RmAction::NotResponsible(key));
        }

        let gained: IdSet = self
            .objects
            .iter()
            .filter(|(key, state)| {
                !state.present
                    && new_replicated.contains(**key)
                    && !self.replicated.contains(**key)
            })
            .map(|(key, _)| *key)
            .filter(|key| !self.is_fetching(*key))
            .collect();
        let opened = if gained.is_empty() {
            None
        } else {
            let op = self.open_change(gained.clone());
            actions.push(RmAction::Fetch(gained));
            Some(op)
        };

        self.primary = new_primary;
        self.replicated = new_replicated;

        if !self.started {
            self.started = true;
            self.startup_op = opened;
            actions.extend(self.ready_if_synced());
        }
        Ok(actions)
    }

    fn open_change(&mut self, keys: IdSet) -> u64 {
        let op = self.next_op;
        self.next_op += 1;
        self.range_changes
            .insert(op, PendingRangeChange::new(op, keys));
        op
    }

    /// Ask the client for one owed body. Re-fetching a key already
    /// under an open transition nudges the client again without
    /// opening a second one.
    fn escalate_fetch(&mut self, key: Id) -> Vec<RmAction> {
        if !self.is_fetching(key) {
            self.open_change(IdSet::from([key]));
        }
        vec![RmAction::Fetch(IdSet::from([key]))]
    }

    fn is_fetching(&self, key: Id) -> bool {
        self.range_changes.values().any(|change| change.tracks(key))
    }

    /// Drop `key` from every range transition tracking it, closing
    /// transitions that drained.
    fn retire_from_changes(&mut self, key: Id) -> Vec<RmAction> {
        let mut drained = vec![];
        for (op, change) in self.range_changes.iter_mut() {
            if change.retire(key) && change.is_done() {
                drained.push(*op);
            }
        }
        if drained.is_empty() {
            return vec![];
        }
        for op in drained {
            tracing::debug!("[{}] range transition {} synced", self.id, op);
            self.range_changes.remove(&op);
        }
        self.ready_if_synced()
    }

    /// Emit Ready once the startup transition has drained.
    fn ready_if_synced(&mut self) -> Vec<RmAction> {
        if self.ready_sent || !self.started {
            return vec![];
        }
        let synced = match self.startup_op {
            None => true,
            Some(op) => !self.range_changes.contains_key(&op),
        };
        if !synced {
            return vec![];
        }
        self.ready_sent = true;
        tracing::info!("[{}] startup range synced, replica manager ready", self.id);
        vec![RmAction::Ready]
    }
}
