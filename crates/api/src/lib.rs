//! Simulation run API server library.
//!
//! Exposes the run lifecycle engine, configuration, state, error handling
//! and routes so integration tests and the binary entrypoint can both use
//! them.

pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
