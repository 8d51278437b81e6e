//! Shared fakes and HTTP helpers for API integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use futures::stream::BoxStream;
use futures::StreamExt;
use http_body_util::BodyExt;
use simrun_api::config::ServerConfig;
use simrun_api::router::build_app_router;
use simrun_api::state::AppState;
use simrun_core::broker::{BrokerError, TaskBroker};
use simrun_core::run_status::RunStatus;
use simrun_core::task::{TaskRequest, TaskState};
use simrun_core::types::{DbId, TaskRef, Timestamp};
use simrun_db::models::project::Project;
use simrun_db::models::run::Run;
use simrun_db::RunStore;
use simrun_worker::registry::Registry;
use simrun_worker::runtime::{ContainerRuntime, ContainerSnapshot, ContainerSpec, RuntimeError};
use simrun_worker::stop::stop_simulation;
use tower::ServiceExt;

pub const USER_ID: DbId = 7;
pub const PROJECT_ID: DbId = 42;
pub const SECRET: &str = "test-secret";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` rooted at `projects_base`.
pub fn test_config(projects_base: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        projects_base_dir: projects_base.to_path_buf(),
        runs_dir_name: "runs".to_string(),
        scratch_dir_name: "results".to_string(),
        access_token_secret: SECRET.to_string(),
        cancel_wait_secs: 1,
    }
}

// ---------------------------------------------------------------------------
// In-memory run store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreInner {
    next_run: DbId,
    runs: HashMap<DbId, Run>,
    projects: HashMap<DbId, Project>,
}

/// Run store with the same compare-and-set rules as the Postgres store.
#[derive(Default)]
pub struct MemoryRunStore {
    inner: Mutex<StoreInner>,
    pub unhealthy: AtomicBool,
}

impl MemoryRunStore {
    pub fn with_project() -> Self {
        let store = Self::default();
        let now = Utc::now();
        store.inner.lock().unwrap().projects.insert(
            PROJECT_ID,
            Project {
                id: PROJECT_ID,
                user_id: USER_ID,
                name: "highway".into(),
                description: None,
                config_name: "Default".into(),
                created_at: now,
                updated_at: now,
            },
        );
        store
    }

    /// Insert a run in `status`, dispatched to `task_ref` if given.
    pub fn insert_run(&self, use_gui: bool, status: RunStatus, task_ref: Option<&str>) -> Run {
        let mut inner = self.inner.lock().unwrap();
        inner.next_run += 1;
        let now = Utc::now();
        let run = Run {
            id: inner.next_run,
            project_id: PROJECT_ID,
            status,
            task_ref: task_ref.map(str::to_string),
            use_gui,
            notes: None,
            start_time: task_ref.map(|_| now),
            end_time: status.is_terminal().then_some(now),
            created_at: now,
            updated_at: now,
        };
        inner.runs.insert(run.id, run.clone());
        run
    }

    pub fn run(&self, run_id: DbId) -> Run {
        self.inner.lock().unwrap().runs[&run_id].clone()
    }

    /// Overwrite a run's status, as a concurrent writer would.
    pub fn force_status(&self, run_id: DbId, status: RunStatus) {
        if let Some(run) = self.inner.lock().unwrap().runs.get_mut(&run_id) {
            run.status = status;
        }
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn health_check(&self) -> Result<(), sqlx::Error> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(())
    }

    async fn find_run(&self, run_id: DbId) -> Result<Option<Run>, sqlx::Error> {
        Ok(self.inner.lock().unwrap().runs.get(&run_id).cloned())
    }

    async fn find_project(&self, project_id: DbId) -> Result<Option<Project>, sqlx::Error> {
        Ok(self.inner.lock().unwrap().projects.get(&project_id).cloned())
    }

    async fn mark_dispatched(
        &self,
        run_id: DbId,
        task_ref: &str,
        start_time: Timestamp,
    ) -> Result<Option<Run>, sqlx::Error> {
        let mut inner = self.inner.lock().unwrap();
        let Some(run) = inner.runs.get_mut(&run_id) else {
            return Ok(None);
        };
        if run.task_ref.is_some() || run.status != RunStatus::Pending {
            return Ok(None);
        }
        run.task_ref = Some(task_ref.to_string());
        run.status = RunStatus::Starting;
        run.start_time = Some(start_time);
        run.end_time = None;
        Ok(Some(run.clone()))
    }

    async fn transition(
        &self,
        run_id: DbId,
        from: RunStatus,
        to: RunStatus,
        end_time: Option<Timestamp>,
    ) -> Result<Option<Run>, sqlx::Error> {
        let mut inner = self.inner.lock().unwrap();
        let Some(run) = inner.runs.get_mut(&run_id) else {
            return Ok(None);
        };
        if run.status != from {
            return Ok(None);
        }
        run.status = to;
        run.end_time = run.end_time.or(end_time);
        Ok(Some(run.clone()))
    }
}

// ---------------------------------------------------------------------------
// Container runtime that only records teardown
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct NoopRuntime {
    pub stopped: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
}

#[async_trait]
impl ContainerRuntime for NoopRuntime {
    async fn launch(&self, _spec: &ContainerSpec) -> Result<String, RuntimeError> {
        Err(RuntimeError::Api("launch not supported".into()))
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerSnapshot, RuntimeError> {
        Err(RuntimeError::NotFound(container_id.to_string()))
    }

    fn stream_logs<'a>(
        &'a self,
        _container_id: &'a str,
    ) -> BoxStream<'a, Result<String, RuntimeError>> {
        futures::stream::empty().boxed()
    }

    async fn logs(&self, _container_id: &str) -> Result<String, RuntimeError> {
        Ok(String::new())
    }

    async fn wait(&self, _container_id: &str) -> Result<i64, RuntimeError> {
        Ok(0)
    }

    async fn stop(&self, container_id: &str, _grace: Duration) -> Result<(), RuntimeError> {
        self.stopped.lock().unwrap().push(container_id.to_string());
        Ok(())
    }

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError> {
        self.removed.lock().unwrap().push(container_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted broker
// ---------------------------------------------------------------------------

/// Worker side of the fake broker: stop tasks are executed inline against
/// this registry and runtime.
pub struct InlineWorker {
    pub registry: Arc<Registry>,
    pub runtime: Arc<NoopRuntime>,
}

#[derive(Default)]
struct BrokerInner {
    next: u64,
    submitted: Vec<(TaskRef, TaskRequest)>,
    states: HashMap<TaskRef, TaskState>,
    revoked: Vec<TaskRef>,
}

#[derive(Default)]
pub struct FakeBroker {
    inner: Mutex<BrokerInner>,
    pub queries: AtomicUsize,
    pub unavailable: AtomicBool,
    pub worker: Option<InlineWorker>,
}

impl FakeBroker {
    pub fn with_worker(registry: Arc<Registry>, runtime: Arc<NoopRuntime>) -> Self {
        Self {
            worker: Some(InlineWorker { registry, runtime }),
            ..Self::default()
        }
    }

    /// Script the state reported for `task_ref`.
    pub fn set_state(&self, task_ref: &str, state: TaskState) {
        self.inner
            .lock()
            .unwrap()
            .states
            .insert(task_ref.to_string(), state);
    }

    pub fn submitted(&self) -> Vec<(TaskRef, TaskRequest)> {
        self.inner.lock().unwrap().submitted.clone()
    }

    pub fn revoked(&self) -> Vec<TaskRef> {
        self.inner.lock().unwrap().revoked.clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), BrokerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskBroker for FakeBroker {
    async fn submit(&self, request: TaskRequest) -> Result<TaskRef, BrokerError> {
        self.check_available()?;
        let task_ref = {
            let mut inner = self.inner.lock().unwrap();
            inner.next += 1;
            let task_ref = format!("task-{}", inner.next);
            inner.submitted.push((task_ref.clone(), request.clone()));
            inner.states.insert(task_ref.clone(), TaskState::Queued);
            task_ref
        };

        if let (TaskRequest::Stop(args), Some(worker)) = (&request, &self.worker) {
            let outcome = stop_simulation(
                &args.task_ref,
                self,
                &worker.registry,
                worker.runtime.as_ref(),
                Duration::from_secs(1),
            )
            .await;
            self.set_state(&task_ref, TaskState::Success(outcome));
        }
        Ok(task_ref)
    }

    async fn query_state(&self, task_ref: &str) -> Result<TaskState, BrokerError> {
        self.check_available()?;
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner
            .lock()
            .unwrap()
            .states
            .get(task_ref)
            .cloned()
            .ok_or_else(|| BrokerError::UnknownTask(task_ref.to_string()))
    }

    async fn revoke(&self, task_ref: &str) -> Result<(), BrokerError> {
        self.check_available()?;
        let mut inner = self.inner.lock().unwrap();
        inner.revoked.push(task_ref.to_string());
        if let Some(state) = inner.states.get_mut(task_ref) {
            if !state.is_terminal() {
                *state = TaskState::Revoked;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// App and HTTP helpers
// ---------------------------------------------------------------------------

pub fn build_state(
    projects_base: &Path,
    store: Arc<MemoryRunStore>,
    broker: Arc<FakeBroker>,
) -> AppState {
    AppState::new(test_config(projects_base), store, broker)
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app(
    projects_base: &Path,
    store: Arc<MemoryRunStore>,
    broker: Arc<FakeBroker>,
) -> Router {
    let config = test_config(projects_base);
    let state = AppState::new(config.clone(), store, broker);
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri).await
}

pub async fn post(app: Router, uri: &str) -> Response {
    send(app, Method::POST, uri).await
}

async fn send(app: Router, method: Method, uri: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
