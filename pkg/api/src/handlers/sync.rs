use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use crate::AppState;

/// POST /api/v1/sync: run one sync pass and return its outcome.
pub async fn trigger_sync(State(state): State<AppState>) -> impl IntoResponse {
    info!("Sync pass requested through the API");
    match state.sync.try_run().await {
        Some(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        None => (
            StatusCode::CONFLICT,
            "A synchronization pass is already running",
        )
            .into_response(),
    }
}
