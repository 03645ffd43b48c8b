use axum::{http::StatusCode, response::IntoResponse};

/// GET /healthz: liveness probe, unauthenticated.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
