//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod project_repo;
pub mod run_repo;
pub mod task_repo;

pub use project_repo::ProjectRepo;
pub use run_repo::RunRepo;
pub use task_repo::TaskRepo;
