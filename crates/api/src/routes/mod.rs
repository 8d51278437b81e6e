pub mod health;
pub mod runs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /runs/{id}              sync and view a run (GET)
/// /runs/{id}/execute      dispatch a pending run (POST)
/// /runs/{id}/cancel       cancel a starting or running run (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/runs", runs::router())
}
