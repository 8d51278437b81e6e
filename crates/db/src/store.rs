//! Run-record storage seam used by the engine.
//!
//! Production code uses [`PgRunStore`]; tests substitute an in-memory store.

use async_trait::async_trait;
use simrun_core::run_status::RunStatus;
use simrun_core::types::{DbId, Timestamp};

use crate::models::project::Project;
use crate::models::run::Run;
use crate::repositories::{ProjectRepo, RunRepo};
use crate::DbPool;

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Verify the backing store is reachable.
    async fn health_check(&self) -> Result<(), sqlx::Error>;

    async fn find_run(&self, run_id: DbId) -> Result<Option<Run>, sqlx::Error>;

    async fn find_project(&self, project_id: DbId) -> Result<Option<Project>, sqlx::Error>;

    /// See [`RunRepo::mark_dispatched`].
    async fn mark_dispatched(
        &self,
        run_id: DbId,
        task_ref: &str,
        start_time: Timestamp,
    ) -> Result<Option<Run>, sqlx::Error>;

    /// See [`RunRepo::transition`].
    async fn transition(
        &self,
        run_id: DbId,
        from: RunStatus,
        to: RunStatus,
        end_time: Option<Timestamp>,
    ) -> Result<Option<Run>, sqlx::Error>;
}

#[derive(Clone)]
pub struct PgRunStore {
    pool: DbPool,
}

impl PgRunStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn health_check(&self) -> Result<(), sqlx::Error> {
        crate::health_check(&self.pool).await
    }

    async fn find_run(&self, run_id: DbId) -> Result<Option<Run>, sqlx::Error> {
        RunRepo::find_by_id(&self.pool, run_id).await
    }

    async fn find_project(&self, project_id: DbId) -> Result<Option<Project>, sqlx::Error> {
        ProjectRepo::find_by_id(&self.pool, project_id).await
    }

    async fn mark_dispatched(
        &self,
        run_id: DbId,
        task_ref: &str,
        start_time: Timestamp,
    ) -> Result<Option<Run>, sqlx::Error> {
        RunRepo::mark_dispatched(&self.pool, run_id, task_ref, start_time).await
    }

    async fn transition(
        &self,
        run_id: DbId,
        from: RunStatus,
        to: RunStatus,
        end_time: Option<Timestamp>,
    ) -> Result<Option<Run>, sqlx::Error> {
        RunRepo::transition(&self.pool, run_id, from, to, end_time).await
    }
}
