//! Per-run `simulation.log` writer.
//!
//! This is the user-facing execution record of a run, separate from process
//! tracing. Each call to [`SimulationLog::line`] appends one RFC 3339
//! timestamped line; raw container output is appended verbatim.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use simrun_core::paths::SIMULATION_LOG_NAME;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

pub struct SimulationLog {
    path: PathBuf,
    file: File,
}

impl SimulationLog {
    /// Create (or truncate) `simulation.log` inside `run_dir`.
    pub async fn create(run_dir: &Path) -> io::Result<Self> {
        let path = run_dir.join(SIMULATION_LOG_NAME);
        let file = File::create(&path).await?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn line(&mut self, message: impl AsRef<str>) -> io::Result<()> {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let line = format!("[{stamp}] {}\n", message.as_ref());
        self.file.write_all(line.as_bytes()).await?;
        self.file.flush().await
    }

    /// Append container output as-is.
    pub async fn raw(&mut self, text: &str) -> io::Result<()> {
        self.file.write_all(text.as_bytes()).await?;
        self.file.flush().await
    }
}
