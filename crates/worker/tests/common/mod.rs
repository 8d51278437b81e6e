//! Shared fakes for worker integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use simrun_core::broker::{BrokerError, ClaimedTask, ProgressSink, TaskBroker, TaskQueue};
use simrun_core::run_status::RunStatus;
use simrun_core::task::{RunTaskArgs, TaskKind, TaskOutcome, TaskProgress, TaskRequest, TaskState};
use simrun_core::types::TaskRef;
use simrun_worker::config::WorkerConfig;
use simrun_worker::registry::Registry;
use simrun_worker::runtime::{
    ContainerRuntime, ContainerSnapshot, ContainerSpec, ContainerStatus, RuntimeError,
};

pub const CONTAINER_ID: &str = "c0ffee000001";
pub const TASK_REF: &str = "5f1c2d3e-aaaa-bbbb-cccc-000000000001";

// ---------------------------------------------------------------------------
// Config and arguments
// ---------------------------------------------------------------------------

pub fn test_config() -> WorkerConfig {
    WorkerConfig {
        image: "veins-worker-gui".into(),
        max_duration: Duration::from_secs(60),
        max_concurrent: 2,
        gui_poll_interval: Duration::from_millis(5),
        stop_grace: Duration::from_secs(1),
        container_workdir: "/simulation/project".into(),
        display_port: 8080,
        display_host: "localhost".into(),
        claim_interval: Duration::from_millis(5),
        scratch_dir_name: "results".into(),
        worker_name: "test-worker".into(),
    }
}

pub fn run_args(project_dir: &std::path::Path, gui_mode: bool) -> RunTaskArgs {
    RunTaskArgs {
        user_id: 1,
        project_id: 2,
        run_id: 3,
        project_dir: project_dir.display().to_string(),
        run_dir: project_dir.join("runs").join("3").display().to_string(),
        config_name: "Default".into(),
        gui_mode,
        access_token: gui_mode.then(|| "11111111-2222-3333-4444-555555555555".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Scripted container runtime
// ---------------------------------------------------------------------------

/// What the fake observed, for assertions.
#[derive(Debug, Default, Clone)]
pub struct RuntimeCalls {
    pub launched: Vec<ContainerSpec>,
    pub inspects: usize,
    pub stopped: Vec<String>,
    pub removed: Vec<String>,
    /// Whether the registry held an entry each time supervision touched the
    /// container.
    pub registered_while_supervising: Vec<bool>,
}

#[derive(Default)]
pub struct FakeRuntime {
    pub exit_code: i64,
    pub output: Vec<String>,
    /// GUI: report exited from this inspect call onwards. `None` never exits.
    pub exits_after_inspects: Option<usize>,
    pub host_port: Option<u16>,
    pub launch_error: Option<String>,
    /// Container already gone: stop/remove report not found.
    pub gone: bool,
    /// Files the "engine" writes when the container starts.
    pub writes_on_launch: Vec<(PathBuf, String)>,
    pub registry: Option<Arc<Registry>>,
    /// Runs inside `launch`, after the container "exists".
    pub on_launch: Option<Box<dyn Fn() + Send + Sync>>,
    /// Once removed, inspect/wait/logs report not found like a real daemon.
    pub vanishes_when_removed: bool,
    /// Error returned by `wait` and `inspect`.
    pub supervision_error: Option<String>,
    pub calls: Mutex<RuntimeCalls>,
}

impl FakeRuntime {
    pub fn calls(&self) -> RuntimeCalls {
        self.calls.lock().unwrap().clone()
    }

    fn note_supervision(&self) {
        let registered = self
            .registry
            .as_ref()
            .is_some_and(|registry| !registry.is_empty());
        self.calls
            .lock()
            .unwrap()
            .registered_while_supervising
            .push(registered);
    }

    fn check_present(&self, container_id: &str) -> Result<(), RuntimeError> {
        if let Some(message) = &self.supervision_error {
            return Err(RuntimeError::Api(message.clone()));
        }
        if self.vanishes_when_removed && !self.calls.lock().unwrap().removed.is_empty() {
            return Err(RuntimeError::NotFound(container_id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn launch(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        self.calls.lock().unwrap().launched.push(spec.clone());
        if let Some(message) = &self.launch_error {
            return Err(RuntimeError::Api(message.clone()));
        }
        for (path, contents) in &self.writes_on_launch {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }
        if let Some(hook) = &self.on_launch {
            hook();
        }
        Ok(CONTAINER_ID.to_string())
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerSnapshot, RuntimeError> {
        self.note_supervision();
        self.check_present(container_id)?;
        let mut calls = self.calls.lock().unwrap();
        calls.inspects += 1;
        let exited = !calls.stopped.is_empty()
            || self
                .exits_after_inspects
                .is_some_and(|after| calls.inspects >= after);
        Ok(ContainerSnapshot {
            status: if exited {
                ContainerStatus::Exited
            } else {
                ContainerStatus::Running
            },
            exit_code: exited.then_some(self.exit_code),
            host_port: self.host_port,
        })
    }

    fn stream_logs<'a>(
        &'a self,
        _container_id: &'a str,
    ) -> BoxStream<'a, Result<String, RuntimeError>> {
        self.note_supervision();
        futures::stream::iter(self.output.clone().into_iter().map(Ok)).boxed()
    }

    async fn logs(&self, container_id: &str) -> Result<String, RuntimeError> {
        self.check_present(container_id)?;
        Ok(self.output.concat())
    }

    async fn wait(&self, container_id: &str) -> Result<i64, RuntimeError> {
        self.note_supervision();
        self.check_present(container_id)?;
        Ok(self.exit_code)
    }

    async fn stop(&self, container_id: &str, _grace: Duration) -> Result<(), RuntimeError> {
        self.calls.lock().unwrap().stopped.push(container_id.to_string());
        if self.gone {
            return Err(RuntimeError::NotFound(container_id.to_string()));
        }
        Ok(())
    }

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.calls.lock().unwrap().removed.push(container_id.to_string());
        if self.gone {
            return Err(RuntimeError::NotFound(container_id.to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory broker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BrokerInner {
    next: u64,
    order: Vec<TaskRef>,
    tasks: HashMap<TaskRef, (TaskRequest, TaskState)>,
    progress: Vec<(TaskRef, TaskProgress)>,
    revoked: Vec<TaskRef>,
}

/// Broker and queue backed by a mutex-guarded map, mirroring the state
/// guards of the Postgres broker.
#[derive(Default)]
pub struct MemoryBroker {
    inner: Mutex<BrokerInner>,
}

impl MemoryBroker {
    /// Insert a task that is already being worked on.
    pub fn insert_in_progress(&self, task_ref: &str, request: TaskRequest) {
        let mut inner = self.inner.lock().unwrap();
        inner.order.push(task_ref.to_string());
        inner.tasks.insert(
            task_ref.to_string(),
            (request, TaskState::InProgress(TaskProgress::default())),
        );
    }

    pub fn state(&self, task_ref: &str) -> Option<TaskState> {
        let inner = self.inner.lock().unwrap();
        inner.tasks.get(task_ref).map(|(_, state)| state.clone())
    }

    pub fn progress_of(&self, task_ref: &str) -> Vec<TaskProgress> {
        let inner = self.inner.lock().unwrap();
        inner
            .progress
            .iter()
            .filter(|(r, _)| r == task_ref)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Revoke synchronously, for use inside runtime hooks.
    pub fn mark_revoked(&self, task_ref: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.revoked.push(task_ref.to_string());
        if let Some((_, state)) = inner.tasks.get_mut(task_ref) {
            if !state.is_terminal() {
                *state = TaskState::Revoked;
            }
        }
    }

    pub fn revoked(&self) -> Vec<TaskRef> {
        self.inner.lock().unwrap().revoked.clone()
    }
}

#[async_trait]
impl TaskBroker for MemoryBroker {
    async fn submit(&self, request: TaskRequest) -> Result<TaskRef, BrokerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next += 1;
        let task_ref = format!("{:08x}-0000-4000-8000-000000000000", inner.next);
        inner.order.push(task_ref.clone());
        inner
            .tasks
            .insert(task_ref.clone(), (request, TaskState::Queued));
        Ok(task_ref)
    }

    async fn query_state(&self, task_ref: &str) -> Result<TaskState, BrokerError> {
        self.state(task_ref)
            .ok_or_else(|| BrokerError::UnknownTask(task_ref.to_string()))
    }

    async fn revoke(&self, task_ref: &str) -> Result<(), BrokerError> {
        self.mark_revoked(task_ref);
        Ok(())
    }
}

#[async_trait]
impl ProgressSink for MemoryBroker {
    async fn publish_progress(
        &self,
        task_ref: &str,
        progress: &TaskProgress,
    ) -> Result<(), BrokerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.progress.push((task_ref.to_string(), progress.clone()));
        if let Some((_, state @ TaskState::InProgress(_))) = inner.tasks.get_mut(task_ref) {
            *state = TaskState::InProgress(progress.clone());
        }
        Ok(())
    }

    async fn is_revoked(&self, task_ref: &str) -> Result<bool, BrokerError> {
        Ok(matches!(self.state(task_ref), Some(TaskState::Revoked)))
    }
}

#[async_trait]
impl TaskQueue for MemoryBroker {
    async fn claim_next(
        &self,
        kind: TaskKind,
        _worker_name: &str,
    ) -> Result<Option<ClaimedTask>, BrokerError> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        for task_ref in &inner.order {
            let Some((request, state)) = inner.tasks.get_mut(task_ref) else {
                continue;
            };
            if request.kind() == kind && *state == TaskState::Queued {
                *state = TaskState::InProgress(TaskProgress::default());
                return Ok(Some(ClaimedTask {
                    task_ref: task_ref.clone(),
                    request: request.clone(),
                }));
            }
        }
        Ok(None)
    }

    async fn finish(&self, task_ref: &str, outcome: &TaskOutcome) -> Result<(), BrokerError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some((_, state @ TaskState::InProgress(_))) = inner.tasks.get_mut(task_ref) {
            *state = if outcome.status == RunStatus::Failed {
                TaskState::Failure(outcome.clone())
            } else {
                TaskState::Success(outcome.clone())
            };
        }
        Ok(())
    }
}
