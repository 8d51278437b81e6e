//! Container executor: the body of a `simulation.run` task.
//!
//! One call to [`ContainerExecutor::run`] launches exactly one container,
//! supervises it to completion and turns whatever happened into a
//! [`TaskOutcome`]. Nothing escapes as an error: a failure at any step is
//! logged, the container is torn down, and a `FAILED` outcome is returned.
//!
//! Headless runs stream container output into `simulation.log` until EOF.
//! GUI runs have no natural end-of-stream, so the container is polled at a
//! fixed interval and force-stopped once it exceeds the maximum duration.
//! A container that disappears mid-run, as after a stop task, counts as an
//! exit with an unknown code.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use simrun_core::access_token;
use simrun_core::broker::ProgressSink;
use simrun_core::paths::{self, normalize_mount_path};
use simrun_core::task::{RunTaskArgs, TaskOutcome, TaskProgress};

use crate::config::WorkerConfig;
use crate::registry::Registry;
use crate::results::move_scratch_results;
use crate::runtime::{ContainerRuntime, ContainerSpec, RuntimeError};
use crate::sim_log::SimulationLog;

/// Search path for NED files inside the simulation image.
const NED_PATH: &str = ".:/opp_env_inst/veins-5.3/src/veins:/opp_env_inst/inet-4.5.4/src";

/// Shared libraries the engine loads.
const ENGINE_LIBRARIES: [&str; 2] = [
    "/opp_env_inst/inet-4.5.4/src/INET",
    "/opp_env_inst/veins-5.3/src/veins",
];

const INI_FILE: &str = "omnetpp.ini";

/// Exit code recorded when a GUI session is stopped for running too long.
const TIMEOUT_EXIT_CODE: i64 = 1;

/// Exit code recorded when the runtime reports an exited container without one.
const UNKNOWN_EXIT_CODE: i64 = -1;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("GUI mode requires an access token")]
    MissingAccessToken,

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Resources created so far by one execution, for cleanup on failure.
#[derive(Default)]
struct Attempt {
    log: Option<SimulationLog>,
    container_id: Option<String>,
}

/// Directories of one run after normalization.
struct RunDirs {
    project: String,
    run: PathBuf,
    scratch: PathBuf,
}

pub struct ContainerExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    registry: Arc<Registry>,
    config: Arc<WorkerConfig>,
}

impl ContainerExecutor {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        registry: Arc<Registry>,
        config: Arc<WorkerConfig>,
    ) -> Self {
        Self {
            runtime,
            registry,
            config,
        }
    }

    /// Execute one simulation task. Never fails; errors become a `FAILED`
    /// outcome carrying the error text.
    pub async fn run(
        &self,
        task_ref: &str,
        args: &RunTaskArgs,
        progress: &dyn ProgressSink,
    ) -> TaskOutcome {
        let mut attempt = Attempt::default();

        let outcome = match self.execute(task_ref, args, progress, &mut attempt).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(task_ref, run_id = args.run_id, error = %e, "Simulation task failed");
                if let Some(log) = attempt.log.as_mut() {
                    if let Err(log_err) = log.line(format!("Error: {e}")).await {
                        tracing::warn!(task_ref, error = %log_err, "Failed to write simulation log");
                    }
                }
                if let Some(container_id) = attempt.container_id.take() {
                    self.teardown(task_ref, &container_id).await;
                }
                TaskOutcome::failed(e.to_string())
            }
        };

        self.registry.unregister(task_ref);
        outcome
    }

    async fn execute(
        &self,
        task_ref: &str,
        args: &RunTaskArgs,
        progress: &dyn ProgressSink,
        attempt: &mut Attempt,
    ) -> Result<TaskOutcome, ExecutorError> {
        let token = match (args.gui_mode, args.access_token.as_deref()) {
            (true, None) => return Err(ExecutorError::MissingAccessToken),
            (true, Some(token)) => Some(token),
            (false, _) => None,
        };

        let dirs = self.resolve_dirs(args)?;
        tokio::fs::create_dir_all(&dirs.run).await?;
        let log = attempt.log.insert(SimulationLog::create(&dirs.run).await?);

        log.line(format!("Task: {task_ref}")).await?;
        log.line(format!(
            "User: {}, project: {}, run: {}",
            args.user_id, args.project_id, args.run_id
        ))
        .await?;
        log.line(format!("Configuration: {}", args.config_name)).await?;
        log.line(format!("GUI mode: {}", args.gui_mode)).await?;
        if let Some(token) = token {
            log.line(format!("Access token: {token}")).await?;
        }

        self.publish(progress, task_ref, TaskProgress::starting(token.map(str::to_string)))
            .await;

        let command = engine_command(&args.config_name, token);
        log.line(format!("Command: {}", command.join(" "))).await?;

        let spec = ContainerSpec {
            image: self.config.image.clone(),
            name: container_name(args, task_ref),
            command,
            mount_source: dirs.project.clone(),
            mount_target: self.config.container_workdir.clone(),
            publish_port: args.gui_mode.then_some(self.config.display_port),
            interactive: args.gui_mode,
        };

        if self.revoked(progress, task_ref).await {
            tracing::info!(task_ref, run_id = args.run_id, "Task revoked before launch, skipping");
            log.line("Task revoked before launch").await?;
            return Ok(TaskOutcome::cancelled("task revoked before launch"));
        }

        let container_id = self.runtime.launch(&spec).await?;
        // Must precede any wait so a concurrent stop task can find it.
        self.registry.register(task_ref, &container_id);
        attempt.container_id = Some(container_id.clone());

        tracing::info!(task_ref, run_id = args.run_id, container_id = %container_id, gui = args.gui_mode, "Simulation container launched");
        log.line(format!("Container started: {container_id} ({})", spec.name))
            .await?;

        // A stop task that revoked us between the first check and
        // registration found nothing to stop.
        if self.revoked(progress, task_ref).await {
            tracing::info!(task_ref, container_id = %container_id, "Task revoked during launch, tearing down");
            attempt.container_id = None;
            self.teardown(task_ref, &container_id).await;
            log.line("Task revoked during launch, container removed").await?;
            return Ok(TaskOutcome::cancelled(format!(
                "task revoked during launch; container {container_id} removed"
            )));
        }

        let outcome = match token {
            Some(token) => {
                self.supervise_gui(task_ref, &container_id, token, &dirs, log, progress)
                    .await?
            }
            None => {
                self.supervise_headless(task_ref, &container_id, &dirs, log, progress)
                    .await?
            }
        };

        attempt.container_id = None;
        match self.runtime.remove(&container_id).await {
            Ok(()) | Err(RuntimeError::NotFound(_)) => {}
            Err(e) => {
                tracing::warn!(task_ref, container_id = %container_id, error = %e, "Failed to remove finished container");
            }
        }

        tracing::info!(task_ref, run_id = args.run_id, status = %outcome.status, exit_code = ?outcome.exit_code, "Simulation finished");
        Ok(outcome)
    }

    fn resolve_dirs(&self, args: &RunTaskArgs) -> Result<RunDirs, ExecutorError> {
        let cwd = std::env::current_dir()?;
        let project = normalize_mount_path(&args.project_dir, &cwd);
        let run = PathBuf::from(normalize_mount_path(&args.run_dir, &cwd));
        let scratch = paths::scratch_dir(Path::new(&project), &self.config.scratch_dir_name);
        Ok(RunDirs {
            project,
            run,
            scratch,
        })
    }

    async fn supervise_headless(
        &self,
        task_ref: &str,
        container_id: &str,
        dirs: &RunDirs,
        log: &mut SimulationLog,
        progress: &dyn ProgressSink,
    ) -> Result<TaskOutcome, ExecutorError> {
        self.publish(progress, task_ref, TaskProgress::running(None, None))
            .await;

        {
            let mut output = self.runtime.stream_logs(container_id);
            while let Some(chunk) = output.next().await {
                match chunk {
                    Ok(text) => log.raw(&text).await?,
                    Err(e) => {
                        log.line(format!("Log stream interrupted: {e}")).await?;
                        break;
                    }
                }
            }
        }

        let exit_code = match self.runtime.wait(container_id).await {
            Err(RuntimeError::NotFound(_)) => {
                log.line("Container removed while running").await?;
                UNKNOWN_EXIT_CODE
            }
            result => result?,
        };
        log.line(format!("Container exited with code {exit_code}"))
            .await?;

        if exit_code != 0 {
            return Ok(TaskOutcome::exit_failure(exit_code));
        }

        move_scratch_results(&dirs.scratch, &dirs.run, log).await?;
        Ok(TaskOutcome::success(Some(exit_code)))
    }

    async fn supervise_gui(
        &self,
        task_ref: &str,
        container_id: &str,
        token: &str,
        dirs: &RunDirs,
        log: &mut SimulationLog,
        progress: &dyn ProgressSink,
    ) -> Result<TaskOutcome, ExecutorError> {
        let started = tokio::time::Instant::now();
        let mut ticker = tokio::time::interval(self.config.gui_poll_interval);
        let mut display_url: Option<String> = None;

        let exit_code = loop {
            ticker.tick().await;

            let snapshot = match self.runtime.inspect(container_id).await {
                Ok(snapshot) => snapshot,
                Err(RuntimeError::NotFound(_)) => {
                    tracing::info!(task_ref, container_id, "GUI container removed externally");
                    log.line("Container removed while running").await?;
                    break UNKNOWN_EXIT_CODE;
                }
                Err(e) => return Err(e.into()),
            };
            if let Some(port) = snapshot.host_port {
                let url = access_token::display_url(&self.config.display_host, port, token);
                if display_url.as_deref() != Some(url.as_str()) {
                    log.line(format!("Remote display available at {url}")).await?;
                }
                display_url = Some(url);
            }

            self.publish(
                progress,
                task_ref,
                TaskProgress::running(Some(token.to_string()), display_url.clone()),
            )
            .await;

            if snapshot.has_exited() {
                break snapshot.exit_code.unwrap_or(UNKNOWN_EXIT_CODE);
            }

            if started.elapsed() > self.config.max_duration {
                tracing::warn!(task_ref, container_id, "GUI session exceeded maximum duration, stopping");
                log.line(format!(
                    "Maximum duration of {}s exceeded, stopping container",
                    self.config.max_duration.as_secs()
                ))
                .await?;
                if let Err(e) = self.runtime.stop(container_id, self.config.stop_grace).await {
                    tracing::warn!(task_ref, container_id, error = %e, "Failed to stop timed-out container");
                }
                break TIMEOUT_EXIT_CODE;
            }
        };

        log.line(format!("Container exited with code {exit_code}"))
            .await?;
        match self.runtime.logs(container_id).await {
            Ok(text) => log.raw(&text).await?,
            Err(e) => log.line(format!("Could not capture container logs: {e}")).await?,
        }

        move_scratch_results(&dirs.scratch, &dirs.run, log).await?;

        let outcome = if exit_code == 0 {
            TaskOutcome::success(Some(exit_code))
        } else {
            TaskOutcome::exit_failure(exit_code)
        };
        Ok(outcome.with_display_url(display_url))
    }

    /// Revocation check against the broker. A failed lookup counts as not
    /// revoked.
    async fn revoked(&self, sink: &dyn ProgressSink, task_ref: &str) -> bool {
        match sink.is_revoked(task_ref).await {
            Ok(revoked) => revoked,
            Err(e) => {
                tracing::warn!(task_ref, error = %e, "Failed to check task revocation");
                false
            }
        }
    }

    /// Progress is advisory; a broker hiccup must not fail the simulation.
    async fn publish(&self, sink: &dyn ProgressSink, task_ref: &str, progress: TaskProgress) {
        if let Err(e) = sink.publish_progress(task_ref, &progress).await {
            tracing::warn!(task_ref, error = %e, "Failed to publish task progress");
        }
    }

    async fn teardown(&self, task_ref: &str, container_id: &str) {
        if let Err(e) = self.runtime.stop(container_id, self.config.stop_grace).await {
            tracing::warn!(task_ref, container_id, error = %e, "Failed to stop container during teardown");
        }
        match self.runtime.remove(container_id).await {
            Ok(()) | Err(RuntimeError::NotFound(_)) => {}
            Err(e) => {
                tracing::warn!(task_ref, container_id, error = %e, "Failed to remove container during teardown");
            }
        }
    }
}

/// Engine command line. `gui_token` selects the interactive front-end and
/// prepends the remote-display flags.
pub fn engine_command(config_name: &str, gui_token: Option<&str>) -> Vec<String> {
    let mut command = Vec::new();
    if let Some(token) = gui_token {
        command.extend(["--gui-mode".to_string(), "--vnc-uuid".to_string(), token.to_string()]);
    }

    let front_end = if gui_token.is_some() { "Qtenv" } else { "Cmdenv" };
    command.extend(
        [
            "--config-name",
            config_name,
            "-u",
            front_end,
            "-c",
            config_name,
            "-r",
            "0",
            "-n",
            NED_PATH,
        ]
        .map(str::to_string),
    );
    for library in ENGINE_LIBRARIES {
        command.push("-l".to_string());
        command.push(library.to_string());
    }
    command.push(INI_FILE.to_string());
    command
}

/// Deterministic container name, unique per task.
pub fn container_name(args: &RunTaskArgs, task_ref: &str) -> String {
    let short_ref: String = task_ref.chars().take(8).collect();
    format!(
        "veins-sim-u{}-p{}-r{}-{short_ref}",
        args.user_id, args.project_id, args.run_id
    )
}
