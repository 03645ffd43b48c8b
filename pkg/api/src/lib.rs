pub mod auth;
pub mod handlers;
pub mod request_id;
pub mod server;

use std::sync::Arc;

use pkg_controllers::sync::SyncOrchestrator;
use pkg_state::registry::PortalRegistry;

/// Shared application state injected into all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: PortalRegistry,
    pub sync: Arc<SyncOrchestrator>,
    pub admin_token: String,
}
