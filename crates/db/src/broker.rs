//! Postgres-backed task broker.
//!
//! Implements both the producer ([`TaskBroker`]) and consumer
//! ([`TaskQueue`]) sides over the `tasks` table.

use async_trait::async_trait;
use simrun_core::broker::{BrokerError, ClaimedTask, ProgressSink, TaskBroker, TaskQueue};
use simrun_core::run_status::RunStatus;
use simrun_core::task::{TaskKind, TaskOutcome, TaskProgress, TaskRequest, TaskState};
use simrun_core::types::TaskRef;

use crate::models::task::state;
use crate::repositories::TaskRepo;
use crate::DbPool;

#[derive(Clone)]
pub struct PgTaskBroker {
    pool: DbPool,
}

impl PgTaskBroker {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn unavailable(err: sqlx::Error) -> BrokerError {
    BrokerError::Unavailable(err.to_string())
}

fn payload(err: serde_json::Error) -> BrokerError {
    BrokerError::Payload(err.to_string())
}

#[async_trait]
impl TaskBroker for PgTaskBroker {
    async fn submit(&self, request: TaskRequest) -> Result<TaskRef, BrokerError> {
        let task_ref = uuid::Uuid::new_v4().to_string();
        let args = request.args_json().map_err(payload)?;
        TaskRepo::insert(&self.pool, &task_ref, request.name(), &args)
            .await
            .map_err(unavailable)?;
        tracing::debug!(task_ref = %task_ref, task = request.name(), "Task submitted");
        Ok(task_ref)
    }

    async fn query_state(&self, task_ref: &str) -> Result<TaskState, BrokerError> {
        let record = TaskRepo::find(&self.pool, task_ref)
            .await
            .map_err(unavailable)?
            .ok_or_else(|| BrokerError::UnknownTask(task_ref.to_string()))?;
        Ok(record.task_state())
    }

    async fn revoke(&self, task_ref: &str) -> Result<(), BrokerError> {
        let revoked = TaskRepo::revoke(&self.pool, task_ref)
            .await
            .map_err(unavailable)?;
        if revoked {
            tracing::info!(task_ref, "Task revoked");
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressSink for PgTaskBroker {
    async fn publish_progress(
        &self,
        task_ref: &str,
        progress: &TaskProgress,
    ) -> Result<(), BrokerError> {
        let meta = serde_json::to_value(progress).map_err(payload)?;
        let stored = TaskRepo::set_meta(&self.pool, task_ref, &meta)
            .await
            .map_err(unavailable)?;
        if !stored {
            tracing::debug!(task_ref, "Progress dropped for task that is no longer in progress");
        }
        Ok(())
    }

    async fn is_revoked(&self, task_ref: &str) -> Result<bool, BrokerError> {
        let record = TaskRepo::find(&self.pool, task_ref)
            .await
            .map_err(unavailable)?
            .ok_or_else(|| BrokerError::UnknownTask(task_ref.to_string()))?;
        Ok(record.state == state::REVOKED)
    }
}

#[async_trait]
impl TaskQueue for PgTaskBroker {
    async fn claim_next(
        &self,
        kind: TaskKind,
        worker_name: &str,
    ) -> Result<Option<ClaimedTask>, BrokerError> {
        let Some(record) = TaskRepo::claim_next(&self.pool, kind.name(), worker_name)
            .await
            .map_err(unavailable)?
        else {
            return Ok(None);
        };

        match TaskRequest::from_parts(&record.name, record.args) {
            Ok(request) => Ok(Some(ClaimedTask {
                task_ref: record.task_ref,
                request,
            })),
            Err(e) => {
                tracing::error!(task_ref = %record.task_ref, error = %e, "Claimed task has undecodable arguments");
                let outcome = TaskOutcome::failed(e.to_string());
                self.finish(&record.task_ref, &outcome).await?;
                Ok(None)
            }
        }
    }

    async fn finish(&self, task_ref: &str, outcome: &TaskOutcome) -> Result<(), BrokerError> {
        let result = serde_json::to_value(outcome).map_err(payload)?;
        let final_state = if outcome.status == RunStatus::Failed {
            state::FAILURE
        } else {
            state::SUCCESS
        };
        let stored = TaskRepo::finish(&self.pool, task_ref, final_state, &result)
            .await
            .map_err(unavailable)?;
        if !stored {
            tracing::info!(task_ref, "Outcome discarded for task that is no longer in progress");
        }
        Ok(())
    }
}
