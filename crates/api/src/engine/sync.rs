//! Status synchronizer: reconcile broker task state into the run record.

use std::sync::Arc;

use chrono::Utc;
use simrun_core::broker::TaskBroker;
use simrun_core::run_status::{status_from_task_state, RunStatus};
use simrun_core::task::TaskState;
use simrun_core::types::DbId;
use simrun_db::models::run::Run;
use simrun_db::RunStore;

use super::{list_result_files, load_project, load_run, EngineError, EngineSettings, RunView};

#[derive(Clone)]
pub struct StatusSynchronizer {
    store: Arc<dyn RunStore>,
    broker: Arc<dyn TaskBroker>,
    settings: Arc<EngineSettings>,
}

impl StatusSynchronizer {
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

    /// Bring a run up to date with its broker task and build its view.
    ///
    /// Undispatched and terminal runs are returned as stored, without a
    /// broker query, so this is cheap to poll.
    pub async fn sync(&self, run_id: DbId) -> Result<RunView, EngineError> {
        let run = load_run(self.store.as_ref(), run_id).await?;

        let Some(task_ref) = run.task_ref.clone() else {
            return self.view(run, None).await;
        };
        if run.status.is_terminal() {
            return self.view(run, None).await;
        }

        let state = self.broker.query_state(&task_ref).await?;
        let run = self.apply(run, &state).await?;

        let display_url = if run.use_gui && run.status == RunStatus::Running {
            state.display_url().map(str::to_string)
        } else {
            None
        };
        self.view(run, display_url).await
    }

    async fn apply(&self, run: Run, state: &TaskState) -> Result<Run, EngineError> {
        let Some(next) = status_from_task_state(run.status, run.use_gui, state) else {
            return Ok(run);
        };

        let end_time = next.is_terminal().then(Utc::now);
        match self
            .store
            .transition(run.id, run.status, next, end_time)
            .await?
        {
            Some(updated) => {
                tracing::info!(run_id = run.id, from = %run.status, to = %next, "Run status synchronized");
                Ok(updated)
            }
            // Someone else moved the run; report what is stored now.
            None => load_run(self.store.as_ref(), run.id).await,
        }
    }

    async fn view(&self, run: Run, display_url: Option<String>) -> Result<RunView, EngineError> {
        let project = load_project(self.store.as_ref(), run.project_id).await?;
        let paths = self.settings.run_paths(&project, run.id)?;
        let files = list_result_files(&paths.run_dir).await?;
        Ok(RunView {
            run,
            display_url,
            files,
        })
    }
}
