//! Simulation worker.
//!
//! Claims `simulation.run` and `simulation.stop` tasks from the broker,
//! executes each simulation inside one container, and tears containers
//! down on request.

pub mod config;
pub mod docker;
pub mod executor;
pub mod pool;
pub mod registry;
pub mod results;
pub mod runtime;
pub mod sim_log;
pub mod stop;
