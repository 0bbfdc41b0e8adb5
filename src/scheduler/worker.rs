//! Worker and delay thread spawners
//!
//! Each thread is a named OS thread whose loop body lives on
//! [`TaskQueue`]; the types here only carry the per-thread construction
//! parameters across the spawn boundary.

use std::sync::Arc;
use std::thread::{Builder, JoinHandle};

use crate::error::{Error, Result};

use super::queue::TaskQueue;

/// A worker thread slot. Workers with `ignore_blocking` set refuse tasks
/// that carry the blocking hint, keeping latency for short work.
pub(crate) struct WorkerThread {
    id: u32,
    ignore_blocking: bool,
}

impl WorkerThread {
    pub(crate) fn new(id: u32, ignore_blocking: bool) -> Self {
        Self {
            id,
            ignore_blocking,
        }
    }

    pub(crate) fn spawn(self, queue: Arc<TaskQueue>) -> Result<JoinHandle<()>> {
        Builder::new()
            .name(format!("task-worker-{}", self.id))
            .spawn(move || queue.run_worker(self.id, self.ignore_blocking))
            .map_err(|err| Error::Spawn {
                reason: err.to_string(),
            })
    }
}

/// A delay scheduler thread slot.
pub(crate) struct DelayThread {
    id: u32,
}

impl DelayThread {
    pub(crate) fn new(id: u32) -> Self {
        Self { id }
    }

    pub(crate) fn spawn(self, queue: Arc<TaskQueue>) -> Result<JoinHandle<()>> {
        Builder::new()
            .name(format!("task-delay-{}", self.id))
            .spawn(move || queue.run_delay(self.id))
            .map_err(|err| Error::Spawn {
                reason: err.to_string(),
            })
    }
}
