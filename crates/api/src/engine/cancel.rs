//! Cancellation coordinator.
//!
//! Persists `CANCELLING` before anything else so observers never see a stale
//! `RUNNING` during teardown, hands the teardown to a stop task on the
//! worker side, waits a bounded time for it, and then settles the run as
//! `CANCELLED` whatever the stop task reported.

use std::sync::Arc;

use chrono::Utc;
use simrun_core::broker::TaskBroker;
use simrun_core::run_status::RunStatus;
use simrun_core::task::{StopTaskArgs, TaskRequest};
use simrun_core::types::DbId;
use simrun_db::models::run::Run;
use simrun_db::RunStore;

use super::{load_run, EngineError, EngineSettings};

#[derive(Clone)]
pub struct CancellationCoordinator {
    store: Arc<dyn RunStore>,
    broker: Arc<dyn TaskBroker>,
    settings: Arc<EngineSettings>,
}

impl CancellationCoordinator {
    pub fn new(
        store: Arc<dyn RunStore>,
        broker: Arc<dyn TaskBroker>,
        settings: Arc<EngineSettings>,
    ) -> Self {
        Self {
            store,
            broker,
            settings,
        }
    }

    /// Cancel a run that is `STARTING` or `RUNNING`.
    ///
    /// Any other status, `PENDING` included, is an
    /// [`EngineError::InvalidState`] and leaves the run untouched.
    pub async fn cancel(&self, run_id: DbId) -> Result<Run, EngineError> {
        let run = load_run(self.store.as_ref(), run_id).await?;
        if !run.status.is_cancellable() {
            return Err(EngineError::InvalidState {
                run_id,
                status: run.status,
                action: "cancel",
            });
        }
        // Cancellable runs always carry a task reference.
        let Some(task_ref) = run.task_ref.clone() else {
            tracing::warn!(run_id, status = %run.status, "Cancellable run has no task reference");
            return Ok(run);
        };

        if self
            .store
            .transition(run.id, run.status, RunStatus::Cancelling, None)
            .await?
            .is_none()
        {
            let current = load_run(self.store.as_ref(), run_id).await?;
            return Err(EngineError::InvalidState {
                run_id,
                status: current.status,
                action: "cancel",
            });
        }
        tracing::info!(run_id, task_ref = %task_ref, "Run cancelling");

        self.stop_task(run_id, &task_ref).await;

        match self
            .store
            .transition(run.id, RunStatus::Cancelling, RunStatus::Cancelled, Some(Utc::now()))
            .await?
        {
            Some(cancelled) => {
                tracing::info!(run_id, task_ref = %task_ref, "Run cancelled");
                Ok(cancelled)
            }
            None => load_run(self.store.as_ref(), run_id).await,
        }
    }

    /// Submit the stop task and wait for it. Failures are logged, never
    /// returned: the run is settled as cancelled regardless.
    async fn stop_task(&self, run_id: DbId, task_ref: &str) {
        let request = TaskRequest::Stop(StopTaskArgs {
            task_ref: task_ref.to_string(),
        });
        let stop_ref = match self.broker.submit(request).await {
            Ok(stop_ref) => stop_ref,
            Err(e) => {
                tracing::error!(run_id, task_ref, error = %e, "Failed to submit stop task, revoking directly");
                if let Err(e) = self.broker.revoke(task_ref).await {
                    tracing::error!(run_id, task_ref, error = %e, "Failed to revoke simulation task");
                }
                return;
            }
        };

        match self
            .broker
            .wait_for_outcome(&stop_ref, self.settings.cancel_wait)
            .await
        {
            Ok(Some(state)) => {
                let message = state.outcome().and_then(|o| o.message.clone());
                tracing::info!(run_id, task_ref, stop_ref = %stop_ref, message = ?message, "Stop task finished");
            }
            Ok(None) => {
                tracing::warn!(
                    run_id,
                    task_ref,
                    stop_ref = %stop_ref,
                    wait_secs = self.settings.cancel_wait.as_secs(),
                    "Stop task did not finish in time",
                );
            }
            Err(e) => {
                tracing::warn!(run_id, task_ref, stop_ref = %stop_ref, error = %e, "Failed to wait for stop task");
            }
        }
    }
}
