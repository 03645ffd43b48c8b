use pkg_cluster::{ClusterGateway, MemoryCluster};
use pkg_state::client::StateStore;
use pkg_state::registry::PortalRegistry;
use pkg_types::notice::{Notice, Severity};
use std::sync::Arc;

pub(crate) async fn make_registry() -> PortalRegistry {
    PortalRegistry::new(StateStore::in_memory().await.unwrap())
}

pub(crate) fn make_cluster() -> (Arc<MemoryCluster>, Arc<dyn ClusterGateway>) {
    let cluster = Arc::new(MemoryCluster::new());
    let gateway: Arc<dyn ClusterGateway> = cluster.clone();
    (cluster, gateway)
}

/// Notices of `severity` whose message contains `needle`.
pub(crate) fn count_notices<'a>(
    notices: impl IntoIterator<Item = &'a Notice>,
    severity: Severity,
    needle: &str,
) -> usize {
    notices
        .into_iter()
        .filter(|n| n.severity == severity && n.message.contains(needle))
        .count()
}
