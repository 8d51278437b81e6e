use std::path::PathBuf;
use std::time::Duration;

use simrun_core::paths::{DEFAULT_RUNS_DIR_NAME, DEFAULT_SCRATCH_DIR_NAME};

use crate::engine::EngineSettings;

/// Secret used when `ACCESS_TOKEN_SECRET` is unset. Local development only.
const DEV_ACCESS_TOKEN_SECRET: &str = "simrun-dev-secret-change-me";

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `60`).
    pub request_timeout_secs: u64,
    /// Root of all project working directories.
    pub projects_base_dir: PathBuf,
    /// Directory inside a project holding run-scoped output.
    pub runs_dir_name: String,
    /// Directory inside a project the engine writes results into.
    pub scratch_dir_name: String,
    /// Key for GUI access-token derivation.
    pub access_token_secret: String,
    /// How long a cancel request waits for the stop task, in seconds.
    pub cancel_wait_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `60`                       |
    /// | `PROJECTS_BASE_DIR`    | `user_projects`            |
    /// | `RUNS_DIR_NAME`        | `runs`                     |
    /// | `SCRATCH_DIR_NAME`     | `results`                  |
    /// | `ACCESS_TOKEN_SECRET`  | dev-only placeholder       |
    /// | `CANCEL_WAIT_SECS`     | `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let projects_base_dir = std::env::var("PROJECTS_BASE_DIR")
            .unwrap_or_else(|_| "user_projects".into())
            .into();

        let runs_dir_name =
            std::env::var("RUNS_DIR_NAME").unwrap_or_else(|_| DEFAULT_RUNS_DIR_NAME.into());

        let scratch_dir_name =
            std::env::var("SCRATCH_DIR_NAME").unwrap_or_else(|_| DEFAULT_SCRATCH_DIR_NAME.into());

        let access_token_secret = std::env::var("ACCESS_TOKEN_SECRET").unwrap_or_else(|_| {
            tracing::warn!("ACCESS_TOKEN_SECRET not set, using the development secret");
            DEV_ACCESS_TOKEN_SECRET.into()
        });

        let cancel_wait_secs: u64 = std::env::var("CANCEL_WAIT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("CANCEL_WAIT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            projects_base_dir,
            runs_dir_name,
            scratch_dir_name,
            access_token_secret,
            cancel_wait_secs,
        }
    }

    /// Settings consumed by the run lifecycle engine.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            projects_base_dir: self.projects_base_dir.clone(),
            runs_dir_name: self.runs_dir_name.clone(),
            scratch_dir_name: self.scratch_dir_name.clone(),
            access_token_secret: self.access_token_secret.clone(),
            cancel_wait: Duration::from_secs(self.cancel_wait_secs),
        }
    }
}
