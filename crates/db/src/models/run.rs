use serde::{Deserialize, Serialize};
use simrun_core::run_status::RunStatus;
use simrun_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `runs` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Run {
    pub id: DbId,
    pub project_id: DbId,
    #[sqlx(try_from = "i16", rename = "status_id")]
    pub status: RunStatus,
    /// Broker reference; set exactly once, when the run is dispatched.
    pub task_ref: Option<String>,
    pub use_gui: bool,
    pub notes: Option<String>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a new pending run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRun {
    pub project_id: DbId,
    #[serde(default)]
    pub use_gui: bool,
    pub notes: Option<String>,
}
