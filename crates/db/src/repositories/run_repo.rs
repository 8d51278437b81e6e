//! Repository for the `runs` table.
//!
//! Every status write is a compare-and-set on the current `status_id`, so a
//! concurrent writer that already moved the run makes the update a no-op
//! (`None`) instead of clobbering it.

use simrun_core::run_status::RunStatus;
use simrun_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::run::{CreateRun, Run};

/// Column list for `runs` queries.
const COLUMNS: &str = "\
    id, project_id, status_id, task_ref, use_gui, notes, \
    start_time, end_time, created_at, updated_at";

pub struct RunRepo;

impl RunRepo {
    /// Insert a new run in `PENDING`.
    pub async fn create(pool: &PgPool, input: &CreateRun) -> Result<Run, sqlx::Error> {
        let query = format!(
            "INSERT INTO runs (project_id, status_id, use_gui, notes) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Run>(&query)
            .bind(input.project_id)
            .bind(RunStatus::Pending.id())
            .bind(input.use_gui)
            .bind(&input.notes)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Run>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM runs WHERE id = $1");
        sqlx::query_as::<_, Run>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Record the broker reference of a freshly dispatched run and move it
    /// `PENDING -> STARTING`.
    ///
    /// Returns `None` if the run already has a reference or is no longer
    /// pending.
    pub async fn mark_dispatched(
        pool: &PgPool,
        id: DbId,
        task_ref: &str,
        start_time: Timestamp,
    ) -> Result<Option<Run>, sqlx::Error> {
        let query = format!(
            "UPDATE runs \
             SET task_ref = $2, status_id = $3, start_time = $4, end_time = NULL, \
                 updated_at = NOW() \
             WHERE id = $1 AND task_ref IS NULL AND status_id = $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Run>(&query)
            .bind(id)
            .bind(task_ref)
            .bind(RunStatus::Starting.id())
            .bind(start_time)
            .bind(RunStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Move a run `from -> to` if it is still in `from`.
    ///
    /// `end_time` is only written when the row has none yet.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: RunStatus,
        to: RunStatus,
        end_time: Option<Timestamp>,
    ) -> Result<Option<Run>, sqlx::Error> {
        let query = format!(
            "UPDATE runs \
             SET status_id = $3, end_time = COALESCE(end_time, $4), updated_at = NOW() \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Run>(&query)
            .bind(id)
            .bind(from.id())
            .bind(to.id())
            .bind(end_time)
            .fetch_optional(pool)
            .await
    }
}
