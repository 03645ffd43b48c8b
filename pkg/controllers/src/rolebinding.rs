use pkg_cluster::ClusterGateway;
use pkg_state::registry::PortalRegistry;
use pkg_types::notice::NoticeContext;
use pkg_types::rbac::bound_cluster_roles;
use pkg_types::sync::EnforcementSummary;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::SyncError;
use crate::notices::Notices;

/// Makes sure every visible namespace grants its service accounts the
/// configured cluster roles. Only ever adds bindings.
pub struct RoleBindingEnforcer {
    registry: PortalRegistry,
    cluster: Arc<dyn ClusterGateway>,
    required_roles: Vec<String>,
}

impl RoleBindingEnforcer {
    pub fn new(
        registry: PortalRegistry,
        cluster: Arc<dyn ClusterGateway>,
        required_roles: Vec<String>,
    ) -> Self {
        let mut roles: Vec<String> = Vec::with_capacity(required_roles.len());
        for role in required_roles {
            if !role.is_empty() && !roles.contains(&role) {
                roles.push(role);
            }
        }
        Self {
            registry,
            cluster,
            required_roles: roles,
        }
    }

    pub fn required_roles(&self) -> &[String] {
        &self.required_roles
    }

    pub async fn enforce_all(&self, notices: &mut Notices) -> Result<EnforcementSummary, SyncError> {
        let mut summary = EnforcementSummary::default();
        if self.required_roles.is_empty() {
            debug!("No cluster roles configured for namespaces, skipping role bindings");
            return Ok(summary);
        }

        let namespaces = self.registry.list_namespaces().await?;
        // Pending namespaces do not exist in the cluster yet
        for ns in namespaces.iter().filter(|ns| ns.visible && ns.is_synced()) {
            summary.namespaces += 1;

            let bindings = match self.cluster.list_role_bindings(&ns.name).await {
                Ok(bindings) => bindings,
                Err(e) => {
                    summary.failed += 1;
                    notices.item_failed(
                        "Fetching role bindings for namespace",
                        &NoticeContext::single(&ns.name),
                        &e,
                    );
                    continue;
                }
            };
            let bound = bound_cluster_roles(&bindings);
            debug!("Namespace '{}' is bound to cluster roles {:?}", ns.name, bound);

            for role in &self.required_roles {
                if bound.contains(role.as_str()) {
                    continue;
                }
                info!(
                    "Namespace '{}' is not bound to cluster role '{}', fixing this",
                    ns.name, role
                );
                match self.cluster.create_role_binding(&ns.name, role).await {
                    Ok(()) => summary.created += 1,
                    Err(e) => {
                        summary.failed += 1;
                        notices.item_failed(
                            "Binding to cluster role",
                            &NoticeContext::pair(&ns.name, role),
                            &e,
                        );
                    }
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{count_notices, make_cluster, make_registry};
    use pkg_types::namespace::ClusterNamespace;
    use pkg_types::notice::Severity;
    use pkg_types::rbac::{RoleBindingRef, RoleRefKind};

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|r| r.to_string()).collect()
    }

    async fn mirror(
        registry: &PortalRegistry,
        cluster: &pkg_cluster::MemoryCluster,
        name: &str,
        visible: bool,
    ) {
        let uid = cluster.add_namespace(name).await;
        registry
            .insert_namespace(&ClusterNamespace::mirrored(name, &uid, visible))
            .await
            .unwrap();
    }

    fn bound_roles(bindings: &[RoleBindingRef]) -> Vec<String> {
        let mut names: Vec<String> = bound_cluster_roles(bindings)
            .into_iter()
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn missing_bindings_are_added_and_others_kept() {
        let registry = make_registry().await;
        let (cluster, gateway) = make_cluster();
        mirror(&registry, &cluster, "teamx", true).await;
        cluster
            .add_role_binding("teamx", RoleBindingRef::cluster_role("custom", "custom-role"))
            .await;
        cluster
            .add_role_binding(
                "teamx",
                RoleBindingRef {
                    name: "local-edit".to_string(),
                    role_name: "edit".to_string(),
                    role_kind: RoleRefKind::Role,
                },
            )
            .await;
        let enforcer = RoleBindingEnforcer::new(registry, gateway, roles(&["edit", "view"]));

        let mut notices = Notices::new();
        let summary = enforcer.enforce_all(&mut notices).await.unwrap();
        assert_eq!(summary.created, 2);
        assert!(notices.is_empty());

        let bindings = cluster.role_bindings_in("teamx").await;
        assert_eq!(bindings.len(), 4);
        assert_eq!(bound_roles(&bindings), vec!["custom-role", "edit", "view"]);

        // Second run has nothing to do
        let summary = enforcer.enforce_all(&mut notices).await.unwrap();
        assert_eq!(summary.created, 0);
        assert_eq!(cluster.create_calls().await.role_bindings, 2);
    }

    #[tokio::test]
    async fn hidden_and_pending_namespaces_are_skipped() {
        let registry = make_registry().await;
        let (cluster, gateway) = make_cluster();
        mirror(&registry, &cluster, "kube-system", false).await;
        registry.create_pending_namespace("later").await.unwrap();
        let enforcer = RoleBindingEnforcer::new(registry, gateway, roles(&["edit"]));

        let summary = enforcer.enforce_all(&mut Notices::new()).await.unwrap();
        assert_eq!(summary.namespaces, 0);
        assert!(cluster.role_bindings_in("kube-system").await.is_empty());
        assert_eq!(cluster.create_calls().await.role_bindings, 0);
    }

    #[tokio::test]
    async fn failures_are_isolated_per_namespace() {
        let registry = make_registry().await;
        let (cluster, gateway) = make_cluster();
        mirror(&registry, &cluster, "broken", true).await;
        mirror(&registry, &cluster, "unlistable", true).await;
        mirror(&registry, &cluster, "fine", true).await;
        cluster.reject_role_bindings_in("broken").await;
        cluster.fail_role_binding_listing_in("unlistable").await;
        let enforcer = RoleBindingEnforcer::new(registry, gateway, roles(&["edit", "view"]));

        let mut notices = Notices::new();
        let summary = enforcer.enforce_all(&mut notices).await.unwrap();
        assert_eq!(summary.namespaces, 3);
        assert_eq!(summary.created, 2);
        assert_eq!(summary.failed, 3);

        let notices = notices.into_vec();
        assert_eq!(count_notices(&notices, Severity::Error, "'broken:edit'"), 1);
        assert_eq!(count_notices(&notices, Severity::Error, "'broken:view'"), 1);
        assert_eq!(count_notices(&notices, Severity::Error, "'unlistable'"), 1);
        assert_eq!(bound_roles(&cluster.role_bindings_in("fine").await), vec!["edit", "view"]);
    }

    #[tokio::test]
    async fn duplicate_roles_are_dropped() {
        let (_cluster, gateway) = make_cluster();
        let enforcer = RoleBindingEnforcer::new(
            make_registry().await,
            gateway,
            roles(&["edit", "", "edit", "view"]),
        );
        assert_eq!(enforcer.required_roles(), &["edit".to_string(), "view".to_string()]);
    }
}
