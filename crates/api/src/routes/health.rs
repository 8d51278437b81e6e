//! Liveness endpoint, mounted outside `/api/v1`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// `"reachable"` or `"unreachable"`.
    pub store: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_error: Option<String>,
}

/// Runs cannot be dispatched, synced or cancelled without the store, so an
/// unreachable store is reported as 503.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (code, store, store_error) = match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, "reachable", None),
        Err(e) => {
            tracing::warn!(error = %e, "Run store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unreachable", Some(e.to_string()))
        }
    };

    let body = HealthResponse {
        status: if store_error.is_none() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        store,
        store_error,
    };
    (code, Json(body))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
