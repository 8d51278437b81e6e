use std::time::Duration;

use simrun_core::paths::DEFAULT_SCRATCH_DIR_NAME;

/// Worker configuration loaded from environment variables.
///
/// All fields have defaults suitable for a single-host deployment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Container image holding the simulation engine.
    pub image: String,
    /// Wall-clock limit for a GUI session before it is force-stopped.
    pub max_duration: Duration,
    /// Upper bound on simulations supervised at once by this process.
    pub max_concurrent: usize,
    /// Interval between container state checks in GUI mode.
    pub gui_poll_interval: Duration,
    /// Grace period given to a container before it is killed on stop.
    pub stop_grace: Duration,
    /// In-container mount point of the project working directory.
    pub container_workdir: String,
    /// Container port serving the remote display.
    pub display_port: u16,
    /// Host name put into display URLs.
    pub display_host: String,
    /// Interval between broker claim attempts.
    pub claim_interval: Duration,
    /// Per-project directory the engine writes results into.
    pub scratch_dir_name: String,
    /// Identifies this process in `tasks.claimed_by`.
    pub worker_name: String,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default               |
    /// |-------------------------------|-----------------------|
    /// | `SIMULATION_IMAGE`            | `veins-worker-gui`    |
    /// | `SIMULATION_MAX_TIMEOUT_SECS` | `14400`               |
    /// | `MAX_CONCURRENT_SIMULATIONS`  | `5`                   |
    /// | `GUI_POLL_INTERVAL_MS`        | `3000`                |
    /// | `STOP_GRACE_SECS`             | `30`                  |
    /// | `CONTAINER_WORKDIR`           | `/simulation/project` |
    /// | `DISPLAY_PORT`                | `8080`                |
    /// | `DISPLAY_HOST`                | `localhost`           |
    /// | `CLAIM_INTERVAL_MS`           | `1000`                |
    /// | `SCRATCH_DIR_NAME`            | `results`             |
    /// | `WORKER_NAME`                 | `$HOSTNAME` or `worker-<pid>` |
    pub fn from_env() -> Self {
        let image = std::env::var("SIMULATION_IMAGE").unwrap_or_else(|_| "veins-worker-gui".into());

        let max_timeout_secs: u64 = std::env::var("SIMULATION_MAX_TIMEOUT_SECS")
            .unwrap_or_else(|_| "14400".into())
            .parse()
            .expect("SIMULATION_MAX_TIMEOUT_SECS must be a valid u64");

        let max_concurrent: usize = std::env::var("MAX_CONCURRENT_SIMULATIONS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("MAX_CONCURRENT_SIMULATIONS must be a valid usize");
        assert!(max_concurrent > 0, "MAX_CONCURRENT_SIMULATIONS must be at least 1");

        let gui_poll_ms: u64 = std::env::var("GUI_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("GUI_POLL_INTERVAL_MS must be a valid u64");

        let stop_grace_secs: u64 = std::env::var("STOP_GRACE_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("STOP_GRACE_SECS must be a valid u64");

        let container_workdir =
            std::env::var("CONTAINER_WORKDIR").unwrap_or_else(|_| "/simulation/project".into());

        let display_port: u16 = std::env::var("DISPLAY_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .expect("DISPLAY_PORT must be a valid u16");

        let display_host = std::env::var("DISPLAY_HOST").unwrap_or_else(|_| "localhost".into());

        let claim_interval_ms: u64 = std::env::var("CLAIM_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("CLAIM_INTERVAL_MS must be a valid u64");

        let scratch_dir_name =
            std::env::var("SCRATCH_DIR_NAME").unwrap_or_else(|_| DEFAULT_SCRATCH_DIR_NAME.into());

        let worker_name = std::env::var("WORKER_NAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| format!("worker-{}", std::process::id()));

        Self {
            image,
            max_duration: Duration::from_secs(max_timeout_secs),
            max_concurrent,
            gui_poll_interval: Duration::from_millis(gui_poll_ms),
            stop_grace: Duration::from_secs(stop_grace_secs),
            container_workdir,
            display_port,
            display_host,
            claim_interval: Duration::from_millis(claim_interval_ms),
            scratch_dir_name,
            worker_name,
        }
    }
}
