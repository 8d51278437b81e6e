//! Run lifecycle engine.
//!
//! [`RunDispatcher`] submits a pending run to the broker,
//! [`StatusSynchronizer`] folds broker-reported task state back into the run
//! record, and [`CancellationCoordinator`] drives a run through
//! `CANCELLING` to `CANCELLED`. All three read and write runs only through
//! [`RunStore`], whose compare-and-set writes keep concurrent callers from
//! clobbering each other.

pub mod cancel;
pub mod dispatcher;
pub mod sync;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use simrun_core::broker::BrokerError;
use simrun_core::paths;
use simrun_core::run_status::RunStatus;
use simrun_core::types::DbId;
use simrun_db::models::project::Project;
use simrun_db::models::run::Run;
use simrun_db::RunStore;

pub use cancel::CancellationCoordinator;
pub use dispatcher::RunDispatcher;
pub use sync::StatusSynchronizer;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The run is not in a status that allows the requested action.
    #[error("cannot {action} run {run_id}: status is {status}")]
    InvalidState {
        run_id: DbId,
        status: RunStatus,
        action: &'static str,
    },

    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// Working-directory preparation or result listing failed.
    #[error("filesystem error: {0}")]
    Io(#[from] io::Error),

    #[error("task broker unavailable: {0}")]
    BrokerUnavailable(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<BrokerError> for EngineError {
    fn from(err: BrokerError) -> Self {
        EngineError::BrokerUnavailable(err.to_string())
    }
}

/// Paths and secrets the engine needs, derived from server configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub projects_base_dir: PathBuf,
    pub runs_dir_name: String,
    pub scratch_dir_name: String,
    pub access_token_secret: String,
    /// Upper bound on how long a cancel request waits for the stop task.
    pub cancel_wait: Duration,
}

/// Directories of one run, absolute.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub project_dir: PathBuf,
    pub run_dir: PathBuf,
    pub scratch_dir: PathBuf,
}

impl EngineSettings {
    pub fn run_paths(&self, project: &Project, run_id: DbId) -> io::Result<RunPaths> {
        let project_dir = absolute(&project.dir(&self.projects_base_dir))?;
        Ok(RunPaths {
            run_dir: paths::run_dir(&project_dir, &self.runs_dir_name, run_id),
            scratch_dir: paths::scratch_dir(&project_dir, &self.scratch_dir_name),
            project_dir,
        })
    }
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// One regular file in a run's output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultFile {
    pub name: String,
    pub size: u64,
}

/// A run as shown to callers: the record plus derived, non-persisted data.
#[derive(Debug, Clone, Serialize)]
pub struct RunView {
    #[serde(flatten)]
    pub run: Run,
    /// Remote-display URL; only for a GUI run that is `RUNNING`.
    pub display_url: Option<String>,
    pub files: Vec<ResultFile>,
}

pub(crate) async fn load_run(store: &dyn RunStore, run_id: DbId) -> Result<Run, EngineError> {
    store
        .find_run(run_id)
        .await?
        .ok_or(EngineError::NotFound {
            entity: "Run",
            id: run_id,
        })
}

pub(crate) async fn load_project(
    store: &dyn RunStore,
    project_id: DbId,
) -> Result<Project, EngineError> {
    store
        .find_project(project_id)
        .await?
        .ok_or(EngineError::NotFound {
            entity: "Project",
            id: project_id,
        })
}

/// Regular files in `run_dir`, sorted by name. The directory is created if
/// it does not exist yet.
pub async fn list_result_files(run_dir: &Path) -> io::Result<Vec<ResultFile>> {
    tokio::fs::create_dir_all(run_dir).await?;
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(run_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if metadata.is_file() {
            files.push(ResultFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
            });
        }
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_only_regular_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("runs").join("4");
        std::fs::create_dir_all(run_dir.join("sub")).unwrap();
        std::fs::write(run_dir.join("simulation.log"), "log").unwrap();
        std::fs::write(run_dir.join("a.sca"), "12345").unwrap();

        let files = list_result_files(&run_dir).await.unwrap();
        assert_eq!(
            files,
            vec![
                ResultFile {
                    name: "a.sca".into(),
                    size: 5
                },
                ResultFile {
                    name: "simulation.log".into(),
                    size: 3
                },
            ]
        );
    }

    #[tokio::test]
    async fn missing_run_dir_is_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("runs").join("9");
        assert!(list_result_files(&run_dir).await.unwrap().is_empty());
        assert!(run_dir.is_dir());
    }

    #[test]
    fn broker_errors_surface_as_unavailable() {
        let err: EngineError = BrokerError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, EngineError::BrokerUnavailable(msg) if msg.contains("refused")));
    }
}
