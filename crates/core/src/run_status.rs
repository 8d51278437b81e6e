//! Run lifecycle state machine.
//!
//! Discriminants match the seed order of the `run_statuses` lookup table.
//!
//! ```text
//! PENDING -> STARTING -> RUNNING -> SUCCESS | FAILED
//!               |           |
//!               +-----+-----+
//!                     v
//!                CANCELLING -> CANCELLED
//! ```
//!
//! `STARTING` and `RUNNING` may also jump straight to a terminal status when
//! the broker reports one before any progress was observed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::task::TaskState;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Status of one execution attempt.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending = 1,
    Starting = 2,
    Running = 3,
    Cancelling = 4,
    Success = 5,
    Failed = 6,
    Cancelled = 7,
}

impl RunStatus {
    /// Every status, in lookup-table order.
    pub const ALL: [RunStatus; 7] = [
        RunStatus::Pending,
        RunStatus::Starting,
        RunStatus::Running,
        RunStatus::Cancelling,
        RunStatus::Success,
        RunStatus::Failed,
        RunStatus::Cancelled,
    ];

    /// Return the database status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Cancelling => "cancelling",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// `SUCCESS`, `FAILED` and `CANCELLED` have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// Only a run that is starting or running can be cancelled.
    pub fn is_cancellable(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    /// Whether `self -> next` is an edge of the state machine.
    ///
    /// Self-loops are not transitions and return `false`.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        use RunStatus::*;
        match self {
            Pending => next == Starting,
            Starting => matches!(next, Running | Cancelling | Success | Failed | Cancelled),
            Running => matches!(next, Cancelling | Success | Failed | Cancelled),
            Cancelling => next == Cancelled,
            Success | Failed | Cancelled => false,
        }
    }
}

impl From<RunStatus> for StatusId {
    fn from(value: RunStatus) -> Self {
        value as StatusId
    }
}

/// A status ID with no matching `run_statuses` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown run status id: {0}")]
pub struct UnknownStatusId(pub StatusId);

impl TryFrom<StatusId> for RunStatus {
    type Error = UnknownStatusId;

    fn try_from(id: StatusId) -> Result<Self, Self::Error> {
        RunStatus::ALL
            .into_iter()
            .find(|status| status.id() == id)
            .ok_or(UnknownStatusId(id))
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a broker-reported task state onto the next run status.
///
/// Returns `None` when the report does not move the run forward:
/// terminal runs are frozen, a GUI run stays put while its task is queued,
/// stale progress never rolls a run backwards, and a run that is being
/// cancelled only ever resolves to `CANCELLED`.
pub fn status_from_task_state(
    current: RunStatus,
    use_gui: bool,
    state: &TaskState,
) -> Option<RunStatus> {
    if current.is_terminal() {
        return None;
    }

    let target = match state {
        TaskState::Queued if use_gui => return None,
        TaskState::Queued => RunStatus::Starting,
        TaskState::InProgress(progress) => progress.status.unwrap_or(RunStatus::Running),
        TaskState::Success(_) => RunStatus::Success,
        TaskState::Failure(_) => RunStatus::Failed,
        TaskState::Revoked => RunStatus::Cancelled,
    };

    let target = if current == RunStatus::Cancelling && target.is_terminal() {
        RunStatus::Cancelled
    } else {
        target
    };

    current.can_transition_to(target).then_some(target)
}
