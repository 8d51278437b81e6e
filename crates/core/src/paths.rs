//! Directory layout for projects and runs.
//!
//! ```text
//! {projects_base}/{user_id}/{project_id}/                 project working dir
//! {projects_base}/{user_id}/{project_id}/results/         scratch results (engine output)
//! {projects_base}/{user_id}/{project_id}/runs/{run_id}/   run-scoped output dir
//! ```

use std::path::{Component, Path, PathBuf};

use crate::types::DbId;

/// Default name of the per-project directory the engine writes results into.
pub const DEFAULT_SCRATCH_DIR_NAME: &str = "results";

/// Default name of the directory holding run-scoped output inside a project.
pub const DEFAULT_RUNS_DIR_NAME: &str = "runs";

/// Name of the per-run execution log.
pub const SIMULATION_LOG_NAME: &str = "simulation.log";

/// Working directory of a project.
pub fn project_dir(projects_base: &Path, user_id: DbId, project_id: DbId) -> PathBuf {
    projects_base
        .join(user_id.to_string())
        .join(project_id.to_string())
}

/// Run-scoped output directory, derived from project and run ids.
pub fn run_dir(project_dir: &Path, runs_dir_name: &str, run_id: DbId) -> PathBuf {
    project_dir.join(runs_dir_name).join(run_id.to_string())
}

/// Shared scratch-results directory of a project.
pub fn scratch_dir(project_dir: &Path, scratch_dir_name: &str) -> PathBuf {
    project_dir.join(scratch_dir_name)
}

/// Normalize a path for use as a bind-mount source.
///
/// Backslashes become forward slashes, relative paths are anchored at `cwd`,
/// and `.`/`..` components are resolved lexically (no filesystem access).
/// Applying it twice gives the same result as applying it once.
pub fn normalize_mount_path(path: &str, cwd: &Path) -> String {
    let unified = path.replace('\\', "/");
    let candidate = Path::new(&unified);
    let anchored = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        cwd.join(candidate)
    };

    let mut parts: Vec<String> = Vec::new();
    for component in anchored.components() {
        match component {
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }

    format!("/{}", parts.join("/"))
}
