//! Task broker seams.
//!
//! [`TaskBroker`] is the producer-facing contract used by the API layer
//! (submit, query, revoke). [`TaskQueue`] is the consumer-facing contract
//! used by worker processes (claim, publish progress, finish). A single
//! backend normally implements both.

use std::time::Duration;

use async_trait::async_trait;

use crate::task::{TaskKind, TaskOutcome, TaskProgress, TaskRequest, TaskState};
use crate::types::TaskRef;

/// Interval between state queries while waiting for a task to finish.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker could not be reached or rejected the operation.
    #[error("task broker unavailable: {0}")]
    Unavailable(String),

    /// No task with this reference exists.
    #[error("unknown task: {0}")]
    UnknownTask(TaskRef),

    /// A stored payload could not be encoded or decoded.
    #[error("malformed task payload: {0}")]
    Payload(String),
}

/// Producer side of the broker.
#[async_trait]
pub trait TaskBroker: Send + Sync {
    /// Enqueue one task and return its reference.
    async fn submit(&self, request: TaskRequest) -> Result<TaskRef, BrokerError>;

    /// Current state of a task.
    async fn query_state(&self, task_ref: &str) -> Result<TaskState, BrokerError>;

    /// Mark a task revoked. A queued task will never run; a running task's
    /// later outcome is discarded. Revoking a finished task is a no-op.
    async fn revoke(&self, task_ref: &str) -> Result<(), BrokerError>;

    /// Wait up to `timeout` for a task to reach a terminal state.
    ///
    /// Returns `Ok(None)` if the deadline passes first.
    async fn wait_for_outcome(
        &self,
        task_ref: &str,
        timeout: Duration,
    ) -> Result<Option<TaskState>, BrokerError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state = self.query_state(task_ref).await?;
            if state.is_terminal() {
                return Ok(Some(state));
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

/// Channel from a running task back to the broker.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish_progress(
        &self,
        task_ref: &str,
        progress: &TaskProgress,
    ) -> Result<(), BrokerError>;

    /// Whether the task has been revoked while it was running.
    async fn is_revoked(&self, task_ref: &str) -> Result<bool, BrokerError>;
}

/// A task claimed by a worker.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub task_ref: TaskRef,
    pub request: TaskRequest,
}

/// Consumer side of the broker.
#[async_trait]
pub trait TaskQueue: ProgressSink {
    /// Atomically claim the oldest queued task of `kind`, if any.
    async fn claim_next(
        &self,
        kind: TaskKind,
        worker_name: &str,
    ) -> Result<Option<ClaimedTask>, BrokerError>;

    /// Record a task's final outcome. `FAILED` outcomes are stored as
    /// `failure`, everything else as `success`. Ignored if the task is no
    /// longer in progress.
    async fn finish(&self, task_ref: &str, outcome: &TaskOutcome) -> Result<(), BrokerError>;
}
