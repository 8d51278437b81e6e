//! Repository for the `tasks` broker queue.
//!
//! State changes are guarded on the current `state` so a revoked task can
//! never be resurrected by a late progress report or outcome.

use serde_json::Value;
use sqlx::PgPool;

use crate::models::task::{state, TaskRecord};

/// Column list for `tasks` queries.
const COLUMNS: &str = "\
    task_ref, name, args, state, meta, result, claimed_by, \
    submitted_at, started_at, finished_at";

pub struct TaskRepo;

impl TaskRepo {
    pub async fn insert(
        pool: &PgPool,
        task_ref: &str,
        name: &str,
        args: &Value,
    ) -> Result<TaskRecord, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks (task_ref, name, args, state) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskRecord>(&query)
            .bind(task_ref)
            .bind(name)
            .bind(args)
            .bind(state::QUEUED)
            .fetch_one(pool)
            .await
    }

    pub async fn find(pool: &PgPool, task_ref: &str) -> Result<Option<TaskRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE task_ref = $1");
        sqlx::query_as::<_, TaskRecord>(&query)
            .bind(task_ref)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the oldest queued task named `name`.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// claim the same row.
    pub async fn claim_next(
        pool: &PgPool,
        name: &str,
        worker_name: &str,
    ) -> Result<Option<TaskRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks \
             SET state = $3, started_at = NOW(), claimed_by = $2 \
             WHERE task_ref = ( \
                 SELECT task_ref FROM tasks \
                 WHERE name = $1 AND state = $4 \
                 ORDER BY submitted_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskRecord>(&query)
            .bind(name)
            .bind(worker_name)
            .bind(state::IN_PROGRESS)
            .bind(state::QUEUED)
            .fetch_optional(pool)
            .await
    }

    /// Replace the progress payload of an in-progress task.
    ///
    /// Returns `false` if the task is not in progress.
    pub async fn set_meta(pool: &PgPool, task_ref: &str, meta: &Value) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE tasks SET meta = $2 WHERE task_ref = $1 AND state = $3")
            .bind(task_ref)
            .bind(meta)
            .bind(state::IN_PROGRESS)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Store the final state and outcome of an in-progress task.
    ///
    /// Returns `false` if the task is not in progress (e.g. it was revoked).
    pub async fn finish(
        pool: &PgPool,
        task_ref: &str,
        final_state: &str,
        result: &Value,
    ) -> Result<bool, sqlx::Error> {
        let outcome = sqlx::query(
            "UPDATE tasks SET state = $2, result = $3, finished_at = NOW() \
             WHERE task_ref = $1 AND state = $4",
        )
        .bind(task_ref)
        .bind(final_state)
        .bind(result)
        .bind(state::IN_PROGRESS)
        .execute(pool)
        .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Revoke a task that has not finished yet.
    ///
    /// Returns `false` if the task was already terminal.
    pub async fn revoke(pool: &PgPool, task_ref: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks SET state = $2, finished_at = NOW() \
             WHERE task_ref = $1 AND state IN ($3, $4)",
        )
        .bind(task_ref)
        .bind(state::REVOKED)
        .bind(state::QUEUED)
        .bind(state::IN_PROGRESS)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
