//! Job dispatcher: the one and only submission of a run.

use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use simrun_core::access_token::access_token;
use simrun_core::broker::TaskBroker;
use simrun_core::run_status::RunStatus;
use simrun_core::task::{RunTaskArgs, TaskRequest};
use simrun_core::types::DbId;
use simrun_db::models::run::Run;
use simrun_db::RunStore;

use super::{load_project, load_run, EngineError, EngineSettings};

#[derive(Clone)]
pub struct RunDispatcher {
    store: Arc<dyn RunStore>,
    broker: Arc<dyn TaskBroker>,
    settings: Arc<EngineSettings>,
}

impl RunDispatcher {
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

    /// Dispatch a pending run.
    ///
    /// A run that already has a task reference is returned unchanged. The
    /// working directory is reset before submission; if submission fails
    /// nothing is persisted.
    pub async fn execute(&self, run_id: DbId) -> Result<Run, EngineError> {
        let run = load_run(self.store.as_ref(), run_id).await?;
        if let Some(task_ref) = &run.task_ref {
            tracing::debug!(run_id, task_ref = %task_ref, "Run already dispatched");
            return Ok(run);
        }
        if run.status != RunStatus::Pending {
            return Err(EngineError::InvalidState {
                run_id,
                status: run.status,
                action: "execute",
            });
        }

        let project = load_project(self.store.as_ref(), run.project_id).await?;
        let paths = self.settings.run_paths(&project, run.id)?;

        reset_dir(&paths.run_dir).await?;
        remove_dir_if_exists(&paths.scratch_dir).await?;

        let token = run.use_gui.then(|| {
            access_token(
                &self.settings.access_token_secret,
                project.user_id,
                project.id,
                run.id,
            )
        });

        let args = RunTaskArgs {
            user_id: project.user_id,
            project_id: project.id,
            run_id: run.id,
            project_dir: paths.project_dir.display().to_string(),
            run_dir: paths.run_dir.display().to_string(),
            config_name: project.config_name.clone(),
            gui_mode: run.use_gui,
            access_token: token,
        };

        let task_ref = self.broker.submit(TaskRequest::Run(args)).await?;

        match self
            .store
            .mark_dispatched(run.id, &task_ref, Utc::now())
            .await?
        {
            Some(dispatched) => {
                tracing::info!(run_id, task_ref = %task_ref, gui = run.use_gui, "Run dispatched");
                Ok(dispatched)
            }
            None => {
                // Another request dispatched this run first.
                tracing::warn!(run_id, task_ref = %task_ref, "Lost dispatch race, revoking duplicate task");
                if let Err(e) = self.broker.revoke(&task_ref).await {
                    tracing::error!(run_id, task_ref = %task_ref, error = %e, "Failed to revoke duplicate task");
                }
                load_run(self.store.as_ref(), run_id).await
            }
        }
    }
}

/// Remove `dir` with everything in it, then recreate it empty.
async fn reset_dir(dir: &Path) -> io::Result<()> {
    remove_dir_if_exists(dir).await?;
    tokio::fs::create_dir_all(dir).await
}

async fn remove_dir_if_exists(dir: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
