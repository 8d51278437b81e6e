//! Result extraction from the shared scratch directory.

use std::io;
use std::path::Path;

use crate::sim_log::SimulationLog;

/// Move every immediate entry of `scratch` into `run_dir`, then remove
/// `scratch`.
///
/// A missing scratch directory means the engine produced nothing and is not
/// an error. A single entry that cannot be moved is logged and skipped, and
/// the scratch directory is then kept so the entry is not lost. Failing to
/// remove scratch is logged only. Returns the names of the moved entries.
pub async fn move_scratch_results(
    scratch: &Path,
    run_dir: &Path,
    log: &mut SimulationLog,
) -> io::Result<Vec<String>> {
    if !tokio::fs::try_exists(scratch).await? {
        log.line(format!("No results directory at {}", scratch.display()))
            .await?;
        return Ok(Vec::new());
    }

    tokio::fs::create_dir_all(run_dir).await?;

    let mut moved = Vec::new();
    let mut failed = 0usize;
    let mut entries = tokio::fs::read_dir(scratch).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let target = run_dir.join(&name);
        match tokio::fs::rename(entry.path(), &target).await {
            Ok(()) => {
                log.line(format!("Moved result: {name}")).await?;
                moved.push(name);
            }
            Err(e) => {
                tracing::warn!(entry = %name, error = %e, "Failed to move result entry");
                log.line(format!("Failed to move result {name}: {e}")).await?;
                failed += 1;
            }
        }
    }

    if failed > 0 {
        log.line(format!(
            "Keeping {} with {failed} unmoved entries",
            scratch.display()
        ))
        .await?;
    } else if let Err(e) = tokio::fs::remove_dir_all(scratch).await {
        tracing::warn!(scratch = %scratch.display(), error = %e, "Failed to remove scratch directory");
        log.line(format!("Could not remove {}: {e}", scratch.display()))
            .await?;
    }
    Ok(moved)
}
