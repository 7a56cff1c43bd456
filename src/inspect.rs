use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;
use crate::replica::ReplicaManager;
use crate::ring::Id;
use crate::ring::NeighborView;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInspect {
    pub id: String,
    pub ready: bool,
    pub primary_range: String,
    pub replicated_range: String,
    pub neighbors: Vec<String>,
    pub objects: Vec<ObjectInspect>,
    pub replications: Vec<ReplicationInspect>,
    pub fetches: Vec<FetchInspect>,
    pub stored: u32,
    /// Stored keys inside the replicated range, clockwise. A key in
    /// `objects` but not here, or the other way around, is drift
    /// between the bookkeeping and the store.
    pub stored_in_range: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInspect {
    pub key: String,
    pub present: bool,
    pub stale_count: u32,
    pub missing_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationInspect {
    pub key: String,
    pub pushing: bool,
    pub acked: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchInspect {
    pub op_id: u64,
    pub missing: Vec<String>,
}

impl NodeInspect {
    pub async fn inspect(manager: &ReplicaManager) -> Self {
        let objects = manager
            .objects()
            .iter()
            .map(|(key, state)| ObjectInspect {
                key: key.to_string(),
                present: state.present,
                stale_count: state.stale_count,
                missing_count: state.missing_count,
            })
            .collect();

        let replications = manager
            .replications()
            .iter()
            .map(|(key, pending)| ReplicationInspect {
                key: key.to_string(),
                pushing: pending.is_pushing(),
                acked: pending.ack_count(),
            })
            .collect();

        let fetches = manager
            .range_changes()
            .iter()
            .map(|(op_id, change)| FetchInspect {
                op_id: *op_id,
                missing: change.missing().iter().map(|key| key.to_string()).collect(),
            })
            .collect();

        let stored = manager.store().count().await.unwrap_or_default();
        let stored_in_range = manager
            .store()
            .scan(&manager.replicated_range())
            .await
            .unwrap_or_default()
            .iter()
            .map(|key| key.to_string())
            .collect();

        Self {
            id: manager.id().to_string(),
            ready: manager.is_ready(),
            primary_range: manager.primary_range().to_string(),
            replicated_range: manager.replicated_range().to_string(),
            neighbors: manager
                .view()
                .peers()
                .iter()
                .map(|id| id.to_string())
                .collect(),
            objects,
            replications,
            fetches,
            stored,
            stored_in_range,
        }
    }

    pub fn dump(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::Serialize)
    }
}

/// Check that every key is present on exactly its replica set across
/// the given managers. Returns one line per violation; converged rings
/// return an empty list.
pub fn check_placement(managers: &[&ReplicaManager], keys: &[Id]) -> Vec<String> {
    let mut violations = vec![];
    if managers.is_empty() {
        return violations;
    }

    let membership: Vec<Id> = managers.iter().map(|manager| manager.id()).collect();
    let width = managers[0].config().factor + 1;
    let mut truth = NeighborView::new(membership[0]);
    truth.update(membership);

    for key in keys {
        let holders = truth.replica_set(*key, width);
        for manager in managers {
            let held = manager
                .objects()
                .get(key)
                .map(|state| state.present)
                .unwrap_or(false);
            let owed = holders.contains(&manager.id());
            if owed && !held {
                violations.push(format!("{} missing on {}", key, manager.id()));
            }
            if !owed && held {
                violations.push(format!("{} lingers on {}", key, manager.id()));
            }
        }
    }
    violations
}
