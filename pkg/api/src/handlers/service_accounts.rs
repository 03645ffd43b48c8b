use axum::{
    Json,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use pkg_types::names::validate_name;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::AppState;

/// Query parameters for listing service accounts.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Only accounts of this namespace record.
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateServiceAccountRequest {
    pub name: String,
}

/// GET /api/v1/serviceaccounts[?namespace=<id>]
pub async fn list_service_accounts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let accounts = match &query.namespace {
        Some(id) => state.registry.service_accounts_of(id).await,
        None => state.registry.list_service_accounts().await,
    };
    match accounts {
        Ok(accounts) => (StatusCode::OK, Json(accounts)).into_response(),
        Err(e) => {
            error!("Failed to list service accounts: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to list service accounts").into_response()
        }
    }
}

/// POST /api/v1/namespaces/{id}/serviceaccounts: record a service account
/// to be created on the next pass.
pub async fn create_service_account(
    State(state): State<AppState>,
    AxumPath(namespace_id): AxumPath<String>,
    Json(req): Json<CreateServiceAccountRequest>,
) -> impl IntoResponse {
    if let Err(e) = validate_name(&req.name) {
        return (
            StatusCode::BAD_REQUEST,
            format!("Invalid service account name '{}': {}", req.name, e),
        )
            .into_response();
    }
    match state.registry.get_namespace(&namespace_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return (StatusCode::NOT_FOUND, "Namespace not found").into_response(),
        Err(e) => {
            error!("Failed to read namespace {}: {}", namespace_id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read namespace").into_response();
        }
    }
    match state
        .registry
        .create_pending_service_account(&namespace_id, &req.name)
        .await
    {
        Ok(sa) => {
            info!("Service account '{}' requested (id={})", sa.name, sa.id);
            (StatusCode::CREATED, Json(sa)).into_response()
        }
        Err(e) => {
            error!("Failed to create service account record: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create service account",
            )
                .into_response()
        }
    }
}
