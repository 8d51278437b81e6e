use std::sync::Arc;

use simrun_db::PgTaskBroker;
use simrun_worker::config::WorkerConfig;
use simrun_worker::docker::DockerRuntime;
use simrun_worker::pool::WorkerPool;
use simrun_worker::registry::Registry;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simrun_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        worker = %config.worker_name,
        image = %config.image,
        max_concurrent = config.max_concurrent,
        "Loaded worker configuration",
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = simrun_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    simrun_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database connection pool created");

    // --- Container runtime ---
    let runtime = DockerRuntime::connect().expect("Failed to connect to Docker");
    runtime.ping().await.expect("Docker daemon is not reachable");
    tracing::info!("Connected to Docker");

    let worker_pool = WorkerPool::new(
        Arc::new(PgTaskBroker::new(pool)),
        Arc::new(runtime),
        Arc::new(Registry::new()),
        Arc::new(config),
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    worker_pool.run(cancel).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), finishing in-flight simulations");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, finishing in-flight simulations");
        }
    }
}
