//! Broker task rows and their decoding into [`TaskState`].

use serde_json::Value;
use simrun_core::task::{TaskOutcome, TaskProgress, TaskState};
use simrun_core::types::Timestamp;
use sqlx::FromRow;

/// Stored values of `tasks.state`.
pub mod state {
    pub const QUEUED: &str = "queued";
    pub const IN_PROGRESS: &str = "in_progress";
    pub const SUCCESS: &str = "success";
    pub const FAILURE: &str = "failure";
    pub const REVOKED: &str = "revoked";
}

/// A row from the `tasks` table.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRecord {
    pub task_ref: String,
    pub name: String,
    pub args: Value,
    pub state: String,
    /// Latest progress payload.
    pub meta: Option<Value>,
    /// Final outcome payload.
    pub result: Option<Value>,
    pub claimed_by: Option<String>,
    pub submitted_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
}

impl TaskRecord {
    /// Decode the stored state and payloads.
    ///
    /// Malformed payloads never surface as errors: missing progress decodes
    /// to an empty progress record, a success without a readable outcome is
    /// still a success, and anything unrecognised is treated as a failure.
    pub fn task_state(&self) -> TaskState {
        match self.state.as_str() {
            state::QUEUED => TaskState::Queued,
            state::IN_PROGRESS => TaskState::InProgress(
                decode::<TaskProgress>(self.meta.as_ref()).unwrap_or_default(),
            ),
            state::SUCCESS => TaskState::Success(
                decode(self.result.as_ref()).unwrap_or_else(|| TaskOutcome::success(None)),
            ),
            state::FAILURE => TaskState::Failure(
                decode(self.result.as_ref())
                    .unwrap_or_else(|| TaskOutcome::failed("task failed without an outcome")),
            ),
            state::REVOKED => TaskState::Revoked,
            other => TaskState::Failure(TaskOutcome::failed(format!(
                "task has unrecognised state '{other}'"
            ))),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Option<&Value>) -> Option<T> {
    value.and_then(|v| serde_json::from_value(v.clone()).ok())
}
