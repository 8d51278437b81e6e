//! Worker claim loop.
//!
//! Polls the broker every `claim_interval`. Simulations occupy one of
//! `max_concurrent` slots for their whole wall-clock duration; stop tasks
//! run on a separate control lane with no slot limit so a saturated pool
//! can always be cancelled.

use std::sync::Arc;

use simrun_core::broker::{TaskBroker, TaskQueue};
use simrun_core::task::{TaskKind, TaskRequest};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::executor::ContainerExecutor;
use crate::registry::Registry;
use crate::runtime::ContainerRuntime;
use crate::stop::stop_simulation;

pub struct WorkerPool<B> {
    broker: Arc<B>,
    runtime: Arc<dyn ContainerRuntime>,
    registry: Arc<Registry>,
    executor: Arc<ContainerExecutor>,
    config: Arc<WorkerConfig>,
}

impl<B> WorkerPool<B>
where
    B: TaskBroker + TaskQueue + 'static,
{
    pub fn new(
        broker: Arc<B>,
        runtime: Arc<dyn ContainerRuntime>,
        registry: Arc<Registry>,
        config: Arc<WorkerConfig>,
    ) -> Self {
        let executor = Arc::new(ContainerExecutor::new(
            Arc::clone(&runtime),
            Arc::clone(&registry),
            Arc::clone(&config),
        ));
        Self {
            broker,
            runtime,
            registry,
            executor,
            config,
        }
    }

    /// Run the claim loop until the cancellation token is triggered, then
    /// wait for in-flight tasks to finish.
    pub async fn run(&self, cancel: CancellationToken) {
        let slots = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut in_flight = JoinSet::new();
        let mut ticker = tokio::time::interval(self.config.claim_interval);
        tracing::info!(
            worker = %self.config.worker_name,
            max_concurrent = self.config.max_concurrent,
            claim_interval_ms = self.config.claim_interval.as_millis() as u64,
            "Worker pool started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Worker pool shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.claim_stops(&mut in_flight).await;
                    self.claim_runs(&slots, &mut in_flight).await;
                }
            }

            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Worker task panicked");
                }
            }
        }

        if !in_flight.is_empty() {
            tracing::info!(in_flight = in_flight.len(), "Waiting for in-flight tasks");
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
        tracing::info!("Worker pool stopped");
    }

    /// Drain every queued stop task onto the control lane.
    async fn claim_stops(&self, in_flight: &mut JoinSet<()>) {
        loop {
            match self.broker.claim_next(TaskKind::Stop, &self.config.worker_name).await {
                Ok(Some(task)) => {
                    let TaskRequest::Stop(args) = task.request else {
                        tracing::error!(task_ref = %task.task_ref, "Stop lane claimed a non-stop task");
                        continue;
                    };
                    let broker = Arc::clone(&self.broker);
                    let registry = Arc::clone(&self.registry);
                    let runtime = Arc::clone(&self.runtime);
                    let grace = self.config.stop_grace;
                    in_flight.spawn(async move {
                        let outcome = stop_simulation(
                            &args.task_ref,
                            broker.as_ref(),
                            &registry,
                            runtime.as_ref(),
                            grace,
                        )
                        .await;
                        if let Err(e) = broker.finish(&task.task_ref, &outcome).await {
                            tracing::error!(task_ref = %task.task_ref, error = %e, "Failed to record stop outcome");
                        }
                    });
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim stop task");
                    break;
                }
            }
        }
    }

    /// Claim simulations while slots are free.
    async fn claim_runs(&self, slots: &Arc<Semaphore>, in_flight: &mut JoinSet<()>) {
        while let Ok(permit) = Arc::clone(slots).try_acquire_owned() {
            let task = match self.broker.claim_next(TaskKind::Run, &self.config.worker_name).await {
                Ok(Some(task)) => task,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim simulation task");
                    break;
                }
            };
            let TaskRequest::Run(args) = task.request else {
                tracing::error!(task_ref = %task.task_ref, "Run lane claimed a non-run task");
                continue;
            };

            tracing::info!(task_ref = %task.task_ref, run_id = args.run_id, gui = args.gui_mode, "Simulation task claimed");
            let broker = Arc::clone(&self.broker);
            let executor = Arc::clone(&self.executor);
            in_flight.spawn(async move {
                let _permit = permit;
                let outcome = executor.run(&task.task_ref, &args, broker.as_ref()).await;
                if let Err(e) = broker.finish(&task.task_ref, &outcome).await {
                    tracing::error!(task_ref = %task.task_ref, error = %e, "Failed to record simulation outcome");
                }
            });
        }
    }
}
