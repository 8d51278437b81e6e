//! Route definitions for the `/runs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;

/// Routes mounted at `/runs`.
///
/// ```text
/// GET    /{id}            -> get_run
/// POST   /{id}/execute    -> execute_run
/// POST   /{id}/cancel     -> cancel_run
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(runs::get_run))
        .route("/{id}/execute", post(runs::execute_run))
        .route("/{id}/cancel", post(runs::cancel_run))
}
