//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row, plus create DTOs where rows are inserted by the app.

pub mod project;
pub mod run;
pub mod task;
