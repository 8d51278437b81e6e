//! Handlers for the `/runs` resource.
//!
//! Each handler delegates to the lifecycle engine; all state-machine rules
//! live there.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use simrun_core::types::DbId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/runs/{id}/execute
///
/// Dispatch a pending run. Returns 202 with the run; repeating the call for
/// an already dispatched run returns it unchanged.
pub async fn execute_run(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let run = state.dispatcher.execute(run_id).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: run })))
}

/// GET /api/v1/runs/{id}
///
/// Synchronize the run with its task and return it with the display URL
/// (GUI runs only) and the result file listing.
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let view = state.synchronizer.sync(run_id).await?;
    Ok(Json(DataResponse { data: view }))
}

/// POST /api/v1/runs/{id}/cancel
///
/// Cancel a starting or running run. Blocks until the teardown finished or
/// the cancel wait elapsed.
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let run = state.canceller.cancel(run_id).await?;
    Ok(Json(DataResponse { data: run }))
}
