//! Task-container registry.
//!
//! Process-local map from broker task reference to the id of the container
//! that task launched. The broker can revoke a task but knows nothing about
//! its container; the stop task uses this map to reach it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use simrun_core::types::TaskRef;

#[derive(Debug, Default)]
pub struct Registry {
    entries: Mutex<HashMap<TaskRef, String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the container of `task_ref`, replacing any stale entry.
    pub fn register(&self, task_ref: &str, container_id: &str) {
        let previous = self
            .lock()
            .insert(task_ref.to_string(), container_id.to_string());
        if let Some(previous) = previous {
            tracing::warn!(task_ref, previous = %previous, container_id, "Replaced stale registry entry");
        }
    }

    pub fn lookup(&self, task_ref: &str) -> Option<String> {
        self.lock().get(task_ref).cloned()
    }

    /// Remove the entry for `task_ref`, returning its container id.
    pub fn unregister(&self, task_ref: &str) -> Option<String> {
        self.lock().remove(task_ref)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the map half-written.
    fn lock(&self) -> MutexGuard<'_, HashMap<TaskRef, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
