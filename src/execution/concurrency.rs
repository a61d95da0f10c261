//! Concurrency-group registry - at most one active run per group key

use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

struct ActiveRun {
    run_id: Uuid,
    token: CancellationToken,
}

/// Tracks the active run of every concurrency group
#[derive(Default)]
pub struct ConcurrencyRegistry {
    active: Mutex<HashMap<String, ActiveRun>>,
}

impl ConcurrencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `run_id` as the active run of `group`
    ///
    /// When another run holds the group and `cancel_in_progress` is set, its
    /// token is cancelled and its id returned. The call never waits for the
    /// superseded run to stop.
    pub fn acquire(
        &self,
        group: &str,
        run_id: Uuid,
        cancel_in_progress: bool,
        token: CancellationToken,
    ) -> Option<Uuid> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let previous = active.insert(group.to_string(), ActiveRun { run_id, token });

        match previous {
            Some(previous) if previous.run_id != run_id && cancel_in_progress => {
                info!(
                    "Run {} supersedes run {} in group '{}'",
                    run_id, previous.run_id, group
                );
                previous.token.cancel();
                Some(previous.run_id)
            }
            Some(previous) => {
                debug!(
                    "Run {} joins group '{}' alongside run {}",
                    run_id, group, previous.run_id
                );
                None
            }
            None => None,
        }
    }

    /// Remove `run_id` from `group` if it is still the active run
    pub fn release(&self, group: &str, run_id: Uuid) -> bool {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        match active.get(group) {
            Some(current) if current.run_id == run_id => {
                active.remove(group);
                true
            }
            _ => false,
        }
    }

    /// The active run of a group
    pub fn active_run(&self, group: &str) -> Option<Uuid> {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.get(group).map(|run| run.run_id)
    }

    /// Number of groups with an active run
    pub fn len(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
