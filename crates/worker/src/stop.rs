//! Body of the `simulation.stop` task.

use std::time::Duration;

use simrun_core::broker::TaskBroker;
use simrun_core::task::TaskOutcome;

use crate::registry::Registry;
use crate::runtime::{ContainerRuntime, RuntimeError};

/// Tear down the simulation started by `task_ref`.
///
/// Revokes the broker task, then stops and removes its container if this
/// process registered one. Always reports `CANCELLED`: a container that
/// already exited or was never launched leaves nothing running, which is
/// all cancellation promises.
pub async fn stop_simulation(
    task_ref: &str,
    broker: &dyn TaskBroker,
    registry: &Registry,
    runtime: &dyn ContainerRuntime,
    grace: Duration,
) -> TaskOutcome {
    if let Err(e) = broker.revoke(task_ref).await {
        tracing::warn!(task_ref, error = %e, "Failed to revoke simulation task");
    }

    let Some(container_id) = registry.lookup(task_ref) else {
        tracing::info!(task_ref, "No container registered for task, nothing to stop");
        return TaskOutcome::cancelled("no running container; task revoked");
    };

    match runtime.stop(&container_id, grace).await {
        Ok(()) | Err(RuntimeError::NotFound(_)) => {}
        Err(e) => {
            tracing::warn!(task_ref, container_id = %container_id, error = %e, "Failed to stop container");
        }
    }
    match runtime.remove(&container_id).await {
        Ok(()) | Err(RuntimeError::NotFound(_)) => {}
        Err(e) => {
            tracing::warn!(task_ref, container_id = %container_id, error = %e, "Failed to remove container");
        }
    }
    registry.unregister(task_ref);

    tracing::info!(task_ref, container_id = %container_id, "Simulation container stopped");
    TaskOutcome::cancelled(format!("container {container_id} stopped and removed"))
}
