#![warn(missing_docs)]
//! Maintenance run daemon to keep replicas fresh.
//!
//! Every interval it injects one tick command into the node's loop,
//! which ages held copies, applies the staleness thresholds, fans out
//! refresh rounds for rooted keys and re-derives the ranges.

use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;
use futures::pin_mut;
use futures::select;
use futures_timer::Delay;

use crate::error::Result;
use crate::node::RmHandle;

/// The maintenance runner.
#[derive(Clone)]
pub struct Maintainer {
    handle: RmHandle,
}

impl Maintainer {
    /// Create a new maintenance runner for the node behind `handle`.
    pub fn new(handle: RmHandle) -> Self {
        Self { handle }
    }

    /// Run one maintenance pass.
    pub async fn tick(&self) -> Result<()> {
        self.handle.tick().await
    }

    /// Tick in a loop. Returns once the node's inbox is gone.
    pub async fn wait(self: Arc<Self>, interval: Duration) {
        loop {
            let timeout = Delay::new(interval).fuse();
            pin_mut!(timeout);
            select! {
                _ = timeout => {
                    if self.tick().await.is_err() {
                        tracing::info!("maintenance target is gone, runner stops");
                        return;
                    }
                }
            }
        }
    }
}
