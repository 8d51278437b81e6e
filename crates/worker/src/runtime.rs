//! Container runtime seam.
//!
//! The executor and the stop task only talk to containers through
//! [`ContainerRuntime`]; [`crate::docker::DockerRuntime`] is the production
//! implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The container does not exist (never created, or already removed).
    #[error("container not found: {0}")]
    NotFound(String),

    /// Any other failure reported by the runtime.
    #[error("container runtime error: {0}")]
    Api(String),
}

/// Everything needed to launch one simulation container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub command: Vec<String>,
    /// Host path bind-mounted read-write.
    pub mount_source: String,
    /// In-container mount point, also the working directory.
    pub mount_target: String,
    /// Container port to publish on a runtime-chosen host port.
    pub publish_port: Option<u16>,
    /// Keep stdin open and allocate a TTY.
    pub interactive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Created,
    Running,
    Exited,
}

/// Point-in-time view of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSnapshot {
    pub status: ContainerStatus,
    pub exit_code: Option<i64>,
    /// Host port bound to the published container port, once assigned.
    pub host_port: Option<u16>,
}

impl ContainerSnapshot {
    pub fn has_exited(&self) -> bool {
        self.status == ContainerStatus::Exited
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a container, returning its id.
    async fn launch(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    async fn inspect(&self, container_id: &str) -> Result<ContainerSnapshot, RuntimeError>;

    /// Follow combined stdout/stderr until the container exits.
    fn stream_logs<'a>(&'a self, container_id: &'a str)
        -> BoxStream<'a, Result<String, RuntimeError>>;

    /// Full combined output captured so far.
    async fn logs(&self, container_id: &str) -> Result<String, RuntimeError>;

    /// Block until the container exits and return its exit code.
    async fn wait(&self, container_id: &str) -> Result<i64, RuntimeError>;

    /// Stop with a grace period before the container is killed.
    /// Stopping an already-stopped container succeeds.
    async fn stop(&self, container_id: &str, grace: Duration) -> Result<(), RuntimeError>;

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError>;
}
