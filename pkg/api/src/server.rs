use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use pkg_cluster::ClusterGateway;
use pkg_controllers::sync::{SyncOrchestrator, SyncSettings};
use pkg_state::client::StateStore;
use pkg_state::registry::PortalRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use crate::AppState;
use crate::auth::auth_middleware;
use crate::handlers::{health, namespaces, service_accounts, sync};
use crate::request_id::request_id_middleware;

/// Server configuration passed from the binary's CLI.
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub data_dir: String,
    pub admin_token: String,
    /// Period of the scheduled sync pass; `None` disables it.
    pub sync_interval: Option<Duration>,
    pub sync: SyncSettings,
}

/// Build the API router: `/healthz` is public, everything under
/// `/api/v1` requires the admin token.
pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/api/v1/sync", post(sync::trigger_sync))
        .route(
            "/api/v1/namespaces",
            get(namespaces::list_namespaces).post(namespaces::create_namespace),
        )
        .route(
            "/api/v1/namespaces/{id}/visibility",
            put(namespaces::set_visibility),
        )
        .route(
            "/api/v1/namespaces/{id}/serviceaccounts",
            post(service_accounts::create_service_account),
        )
        .route(
            "/api/v1/serviceaccounts",
            get(service_accounts::list_service_accounts),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/healthz", get(health::healthz))
        .merge(api_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

pub async fn start_server(
    config: ServerConfig,
    cluster: Arc<dyn ClusterGateway>,
) -> anyhow::Result<()> {
    let store = StateStore::new(&config.data_dir).await?;
    let registry = PortalRegistry::new(store);
    let sync = Arc::new(SyncOrchestrator::new(
        registry.clone(),
        cluster,
        config.sync,
    ));

    match config.sync_interval {
        Some(interval) => {
            sync.clone().start(interval);
        }
        None => info!("Scheduled sync disabled, passes run on request only"),
    }

    let state = AppState {
        registry,
        sync,
        admin_token: config.admin_token,
    };

    info!("Starting API server on {}", config.addr);
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
