use axum::{
    Json,
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateNamespaceRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

/// GET /api/v1/namespaces
pub async fn list_namespaces(State(state): State<AppState>) -> impl IntoResponse {
    match state.registry.list_namespaces().await {
        Ok(namespaces) => (StatusCode::OK, Json(namespaces)).into_response(),
        Err(e) => {
            error!("Failed to list namespaces: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to list namespaces").into_response()
        }
    }
}

/// POST /api/v1/namespaces: record a namespace to be created on the next pass.
/// The name is free-form; it is turned into a legal name when pushed.
pub async fn create_namespace(
    State(state): State<AppState>,
    Json(req): Json<CreateNamespaceRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Namespace name must not be empty").into_response();
    }
    match state.registry.create_pending_namespace(&req.name).await {
        Ok(ns) => {
            info!("Namespace '{}' requested (id={})", ns.name, ns.id);
            (StatusCode::CREATED, Json(ns)).into_response()
        }
        Err(e) => {
            error!("Failed to create namespace record: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create namespace").into_response()
        }
    }
}

/// PUT /api/v1/namespaces/{id}/visibility: hide or show a namespace.
/// Hidden namespaces are left alone by role binding enforcement.
pub async fn set_visibility(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<VisibilityRequest>,
) -> impl IntoResponse {
    match state.registry.get_namespace(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => return (StatusCode::NOT_FOUND, "Namespace not found").into_response(),
        Err(e) => {
            error!("Failed to read namespace {}: {}", id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read namespace").into_response();
        }
    }
    match state.registry.set_namespace_visible(&id, req.visible).await {
        Ok(ns) => {
            info!("Namespace '{}' visible={}", ns.name, ns.visible);
            (StatusCode::OK, Json(ns)).into_response()
        }
        Err(e) => {
            error!("Failed to update namespace {}: {}", id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to update namespace").into_response()
        }
    }
}
