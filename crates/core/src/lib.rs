//! Domain logic for simulation runs.
//!
//! Everything here is pure: the run state machine, the typed task payloads
//! exchanged with the broker, access-token derivation and the path rules for
//! project, run and scratch directories. I/O lives in the `db`, `worker`
//! and `api` crates.

pub mod access_token;
pub mod broker;
pub mod error;
pub mod paths;
pub mod run_status;
pub mod task;
pub mod types;
