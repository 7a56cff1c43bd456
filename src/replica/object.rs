#![warn(missing_docs)]
//! Per-key bookkeeping for one node.

use serde::Deserialize;
use serde::Serialize;

/// What one node knows about one key in its replicated range.
///
/// The record is created on the first InsertRequest or the first
/// RefreshNotice for the key, whichever arrives first, and dropped
/// when the key leaves the node's range. `stale_count` ages while the
/// key's root stays quiet; `missing_count` ages while the node knows
/// of the key but holds no body.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    /// Whether the body is in the local store.
    pub present: bool,
    /// Maintenance ticks since the last refresh for this key.
    pub stale_count: u32,
    /// Refresh notices seen while the body was absent.
    pub missing_count: u32,
}

impl ObjectState {
    /// State for a key whose body just arrived.
    pub fn held() -> Self {
        Self {
            present: true,
            stale_count: 0,
            missing_count: 0,
        }
    }

    /// State for a key known only by refresh, body still absent.
    pub fn reported() -> Self {
        Self {
            present: false,
            stale_count: 0,
            missing_count: 0,
        }
    }

    /// One maintenance tick passed. Only held bodies age; an absent
    /// body is tracked by `missing_count` instead.
    pub fn tick(&mut self) {
        if self.present {
            self.stale_count += 1;
        }
    }

    /// A refresh arrived for a held body.
    pub fn refreshed(&mut self) {
        self.stale_count = 0;
    }

    /// The body arrived, by insert or by fetch completion.
    pub fn body_arrived(&mut self) {
        self.present = true;
        self.stale_count = 0;
        self.missing_count = 0;
    }

    /// A refresh arrived but the body is still absent. Returns the
    /// new miss tally so the caller can escalate at the limit.
    pub fn still_missing(&mut self) -> u32 {
        self.missing_count += 1;
        self.missing_count
    }

    /// Restart the miss tally after an escalated fetch went out.
    pub fn fetch_requested(&mut self) {
        self.missing_count = 0;
    }

    /// This node took over as the key's refresher.
    pub fn adopted(&mut self) {
        self.stale_count = 0;
    }
}
