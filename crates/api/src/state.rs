use std::sync::Arc;

use simrun_core::broker::TaskBroker;
use simrun_db::RunStore;

use crate::config::ServerConfig;
use crate::engine::{CancellationCoordinator, RunDispatcher, StatusSynchronizer};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Run and project storage.
    pub store: Arc<dyn RunStore>,
    pub dispatcher: RunDispatcher,
    pub synchronizer: StatusSynchronizer,
    pub canceller: CancellationCoordinator,
}

impl AppState {
    /// Wire the lifecycle engine over one store and one broker.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn RunStore>,
        broker: Arc<dyn TaskBroker>,
    ) -> Self {
        let settings = Arc::new(config.engine_settings());
        Self {
            dispatcher: RunDispatcher::new(
                Arc::clone(&store),
                Arc::clone(&broker),
                Arc::clone(&settings),
            ),
            synchronizer: StatusSynchronizer::new(
                Arc::clone(&store),
                Arc::clone(&broker),
                Arc::clone(&settings),
            ),
            canceller: CancellationCoordinator::new(Arc::clone(&store), broker, settings),
            store,
            config: Arc::new(config),
        }
    }
}
