//! Typed payloads exchanged with the task broker.
//!
//! The broker itself only stores free-form JSON. Everything that crosses it
//! is one of the types below, and the broker adapter decodes a stored task
//! into a [`TaskState`] exactly once so nothing downstream ever inspects an
//! untyped payload.

use serde::{Deserialize, Serialize};

use crate::run_status::RunStatus;
use crate::types::{DbId, TaskRef};

/// Broker task name for a simulation execution.
pub const RUN_TASK: &str = "simulation.run";

/// Broker task name for the stop (teardown) task.
pub const STOP_TASK: &str = "simulation.stop";

/// Which worker lane a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Run,
    Stop,
}

impl TaskKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Run => RUN_TASK,
            Self::Stop => STOP_TASK,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            RUN_TASK => Some(Self::Run),
            STOP_TASK => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Self-describing arguments for one simulation execution.
///
/// The executor never reads the run record; everything it needs is here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTaskArgs {
    pub user_id: DbId,
    pub project_id: DbId,
    pub run_id: DbId,
    /// Absolute project working directory (mounted into the container).
    pub project_dir: String,
    /// Absolute run-scoped output directory.
    pub run_dir: String,
    /// Simulation configuration name inside `omnetpp.ini`.
    pub config_name: String,
    pub gui_mode: bool,
    /// Remote-display access token; present only in GUI mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

/// Arguments for the stop task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopTaskArgs {
    /// Broker reference of the simulation task to tear down.
    pub task_ref: TaskRef,
}

/// A task submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRequest {
    Run(RunTaskArgs),
    Stop(StopTaskArgs),
}

impl TaskRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Run(_) => TaskKind::Run,
            Self::Stop(_) => TaskKind::Stop,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Serialize the arguments for storage next to the task name.
    pub fn args_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Run(args) => serde_json::to_value(args),
            Self::Stop(args) => serde_json::to_value(args),
        }
    }

    /// Rebuild a request from a stored task name and argument payload.
    pub fn from_parts(name: &str, args: serde_json::Value) -> Result<Self, TaskDecodeError> {
        match TaskKind::from_name(name) {
            Some(TaskKind::Run) => Ok(Self::Run(serde_json::from_value(args)?)),
            Some(TaskKind::Stop) => Ok(Self::Stop(serde_json::from_value(args)?)),
            None => Err(TaskDecodeError::UnknownTask(name.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskDecodeError {
    #[error("unknown task name: {0}")]
    UnknownTask(String),

    #[error("malformed task arguments: {0}")]
    Args(#[from] serde_json::Error),
}

/// Progress metadata published while a task runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_url: Option<String>,
}

impl TaskProgress {
    pub fn starting(access_token: Option<String>) -> Self {
        Self {
            status: Some(RunStatus::Starting),
            access_token,
            display_url: None,
        }
    }

    pub fn running(access_token: Option<String>, display_url: Option<String>) -> Self {
        Self {
            status: Some(RunStatus::Running),
            access_token,
            display_url,
        }
    }
}

/// Final result of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskOutcome {
    pub fn success(exit_code: Option<i64>) -> Self {
        Self {
            status: RunStatus::Success,
            exit_code,
            display_url: None,
            error: None,
            message: None,
        }
    }

    /// A failure caused by an error rather than by the simulation itself.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            exit_code: None,
            display_url: None,
            error: Some(error.into()),
            message: None,
        }
    }

    /// A simulation that ran to completion with a nonzero exit code.
    pub fn exit_failure(exit_code: i64) -> Self {
        Self {
            status: RunStatus::Failed,
            exit_code: Some(exit_code),
            display_url: None,
            error: Some(format!("simulation exited with code {exit_code}")),
            message: None,
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Cancelled,
            exit_code: None,
            display_url: None,
            error: None,
            message: Some(message.into()),
        }
    }

    pub fn with_display_url(mut self, display_url: Option<String>) -> Self {
        self.display_url = display_url;
        self
    }
}

/// Broker-reported task state, decoded once at the broker boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    InProgress(TaskProgress),
    Success(TaskOutcome),
    Failure(TaskOutcome),
    Revoked,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success(_) | Self::Failure(_) | Self::Revoked)
    }

    /// Terminal outcome, if the task finished with one.
    pub fn outcome(&self) -> Option<&TaskOutcome> {
        match self {
            Self::Success(outcome) | Self::Failure(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Most recent remote-display URL reported for the task.
    pub fn display_url(&self) -> Option<&str> {
        match self {
            Self::InProgress(progress) => progress.display_url.as_deref(),
            Self::Success(outcome) => outcome.display_url.as_deref(),
            _ => None,
        }
    }
}
