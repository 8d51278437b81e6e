use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use simrun_core::paths;
use simrun_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `projects` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    pub description: Option<String>,
    /// Configuration section of `omnetpp.ini` the simulation runs.
    pub config_name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Project {
    /// Working directory under `projects_base`.
    pub fn dir(&self, projects_base: &Path) -> PathBuf {
        paths::project_dir(projects_base, self.user_id, self.id)
    }
}

/// DTO for inserting a project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProject {
    pub user_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub config_name: Option<String>,
}
