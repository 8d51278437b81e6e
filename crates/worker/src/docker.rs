//! Docker implementation of [`ContainerRuntime`] over `bollard`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::models::{ContainerStateStatusEnum, HostConfig, Mount, MountTypeEnum, PortBinding};
use bollard::Docker;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};

use crate::runtime::{
    ContainerRuntime, ContainerSnapshot, ContainerSpec, ContainerStatus, RuntimeError,
};

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using the platform defaults (`DOCKER_HOST` or the local socket).
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults().map_err(classify)?;
        Ok(Self { docker })
    }

    /// Verify the daemon is reachable.
    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.docker.ping().await.map_err(classify)?;
        Ok(())
    }
}

/// Map a bollard error onto [`RuntimeError`]; HTTP 404 means the container
/// is gone.
fn classify(err: DockerError) -> RuntimeError {
    match err {
        DockerError::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound(message),
        other => RuntimeError::Api(other.to_string()),
    }
}

fn port_key(port: u16) -> String {
    format!("{port}/tcp")
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn launch(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let mount = Mount {
            target: Some(spec.mount_target.clone()),
            source: Some(spec.mount_source.clone()),
            typ: Some(MountTypeEnum::BIND),
            read_only: Some(false),
            ..Default::default()
        };

        let (exposed_ports, port_bindings) = match spec.publish_port {
            Some(port) => {
                let exposed = HashMap::from([(port_key(port), HashMap::new())]);
                // Empty host port lets the daemon pick a free one.
                let bindings = HashMap::from([(
                    port_key(port),
                    Some(vec![PortBinding {
                        host_ip: None,
                        host_port: Some(String::new()),
                    }]),
                )]);
                (Some(exposed), Some(bindings))
            }
            None => (None, None),
        };

        let host_config = HostConfig {
            mounts: Some(vec![mount]),
            port_bindings,
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: Some(spec.command.clone()),
            working_dir: Some(spec.mount_target.clone()),
            exposed_ports,
            open_stdin: Some(spec.interactive),
            tty: Some(spec.interactive),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let container_id = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(classify)?
            .id;

        if let Err(e) = self
            .docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
        {
            if let Err(remove_err) = self.remove(&container_id).await {
                tracing::warn!(container_id = %container_id, error = %remove_err, "Failed to remove container that did not start");
            }
            return Err(classify(e));
        }

        tracing::debug!(container_id = %container_id, name = %spec.name, "Container started");
        Ok(container_id)
    }

    async fn inspect(&self, container_id: &str) -> Result<ContainerSnapshot, RuntimeError> {
        let info = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(classify)?;

        let state = info.state.unwrap_or_default();
        let status = match state.status {
            Some(ContainerStateStatusEnum::EXITED | ContainerStateStatusEnum::DEAD) => {
                ContainerStatus::Exited
            }
            Some(ContainerStateStatusEnum::CREATED) | None => ContainerStatus::Created,
            Some(_) => ContainerStatus::Running,
        };

        let host_port = info
            .network_settings
            .and_then(|settings| settings.ports)
            .into_iter()
            .flat_map(|ports| ports.into_values())
            .flatten()
            .flatten()
            .find_map(|binding| binding.host_port.and_then(|port| port.parse().ok()));

        Ok(ContainerSnapshot {
            status,
            exit_code: state.exit_code,
            host_port,
        })
    }

    fn stream_logs<'a>(
        &'a self,
        container_id: &'a str,
    ) -> BoxStream<'a, Result<String, RuntimeError>> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        self.docker
            .logs(container_id, Some(options))
            .map_ok(|chunk| chunk.to_string())
            .map_err(classify)
            .boxed()
    }

    async fn logs(&self, container_id: &str) -> Result<String, RuntimeError> {
        let options = LogsOptions::<String> {
            follow: false,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let chunks: Vec<String> = self
            .docker
            .logs(container_id, Some(options))
            .map_ok(|chunk| chunk.to_string())
            .map_err(classify)
            .try_collect()
            .await?;
        Ok(chunks.concat())
    }

    async fn wait(&self, container_id: &str) -> Result<i64, RuntimeError> {
        let mut waits = std::pin::pin!(self
            .docker
            .wait_container(container_id, None::<WaitContainerOptions<String>>));

        match waits.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a nonzero exit as an error carrying the code.
            Some(Err(DockerError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(classify(e)),
            None => self
                .inspect(container_id)
                .await?
                .exit_code
                .ok_or_else(|| RuntimeError::Api("wait ended without an exit code".into())),
        }
    }

    async fn stop(&self, container_id: &str, grace: Duration) -> Result<(), RuntimeError> {
        let options = StopContainerOptions {
            t: grace.as_secs() as i64,
        };
        match self.docker.stop_container(container_id, Some(options)).await {
            Ok(()) => Ok(()),
            // 304: already stopped.
            Err(DockerError::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(classify(e)),
        }
    }

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker
            .remove_container(container_id, Some(options))
            .await
            .map_err(classify)
    }
}
