use async_trait::async_trait;
use pkg_types::namespace::RemoteNamespace;
use pkg_types::rbac::RoleBindingRef;
use pkg_types::service_account::RemoteServiceAccount;

use crate::error::GatewayError;

/// Capabilities the reconciler needs from the cluster control plane.
///
/// There are no delete operations. Cluster resources are only removed
/// out-of-band by cluster administrators.
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<RemoteNamespace>, GatewayError>;

    /// Create a namespace, or return the existing one if the name is taken.
    async fn create_namespace(&self, name: &str) -> Result<RemoteNamespace, GatewayError>;

    async fn list_service_accounts(&self) -> Result<Vec<RemoteServiceAccount>, GatewayError>;

    /// Create a service account, or return the existing one if the name is taken.
    async fn create_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<RemoteServiceAccount, GatewayError>;

    async fn list_role_bindings(&self, namespace: &str) -> Result<Vec<RoleBindingRef>, GatewayError>;

    /// Bind all service accounts of `namespace` to the cluster role `role`.
    async fn create_role_binding(&self, namespace: &str, role: &str) -> Result<(), GatewayError>;
}
