use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use k8s_openapi::api::rbac::v1::{RoleBinding, RoleRef, Subject};
use kube::api::{Api, ListParams, ObjectMeta, PostParams};
use kube::Client;
use pkg_constants::sync::RBAC_API_GROUP;
use pkg_types::namespace::RemoteNamespace;
use pkg_types::rbac::{RoleBindingRef, RoleBindingSpec, RoleRefKind};
use pkg_types::service_account::RemoteServiceAccount;
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::gateway::ClusterGateway;

/// Cluster gateway backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
}

impl KubeGateway {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using in-cluster configuration, falling back to the local kubeconfig.
    pub async fn try_default() -> Result<Self, GatewayError> {
        let client = Client::try_default()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))?;
        info!("Connected to Kubernetes API server");
        Ok(Self::new(client))
    }
}

fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409)
}

/// API answers are rejections; everything else (connect, TLS, decode) means
/// the control plane could not be queried.
fn classify(err: kube::Error) -> GatewayError {
    match err {
        kube::Error::Api(resp) => GatewayError::rejected(resp.code, resp.message),
        other => GatewayError::Unreachable(other.to_string()),
    }
}

fn remote_namespace(ns: &Namespace) -> RemoteNamespace {
    RemoteNamespace {
        name: ns.metadata.name.clone().unwrap_or_default(),
        external_id: ns.metadata.uid.clone().unwrap_or_default(),
    }
}

fn remote_service_account(sa: &ServiceAccount) -> RemoteServiceAccount {
    RemoteServiceAccount {
        name: sa.metadata.name.clone().unwrap_or_default(),
        external_id: sa.metadata.uid.clone().unwrap_or_default(),
        namespace: sa.metadata.namespace.clone().unwrap_or_default(),
    }
}

fn role_binding_ref(rb: &RoleBinding) -> RoleBindingRef {
    RoleBindingRef {
        name: rb.metadata.name.clone().unwrap_or_default(),
        role_name: rb.role_ref.name.clone(),
        role_kind: RoleRefKind::parse(&rb.role_ref.kind),
    }
}

fn role_binding(spec: &RoleBindingSpec) -> RoleBinding {
    RoleBinding {
        metadata: ObjectMeta {
            name: Some(spec.binding_name().to_string()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: spec.role_name.clone(),
        },
        subjects: Some(vec![Subject {
            api_group: Some(RBAC_API_GROUP.to_string()),
            kind: "Group".to_string(),
            name: spec.subject_group(),
            namespace: None,
        }]),
    }
}

#[async_trait]
impl ClusterGateway for KubeGateway {
    async fn list_namespaces(&self) -> Result<Vec<RemoteNamespace>, GatewayError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await.map_err(classify)?;
        debug!("Listed {} Kubernetes namespaces", list.items.len());
        Ok(list.items.iter().map(remote_namespace).collect())
    }

    async fn create_namespace(&self, name: &str) -> Result<RemoteNamespace, GatewayError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        match api.create(&PostParams::default(), &ns).await {
            Ok(created) => {
                info!("Created Kubernetes namespace '{}'", name);
                Ok(remote_namespace(&created))
            }
            Err(e) if is_conflict(&e) => {
                warn!(
                    "Kubernetes namespace '{}' already exists, using the existing one",
                    name
                );
                let existing = api.get(name).await.map_err(classify)?;
                Ok(remote_namespace(&existing))
            }
            Err(e) => Err(classify(e)),
        }
    }

    async fn list_service_accounts(&self) -> Result<Vec<RemoteServiceAccount>, GatewayError> {
        let api: Api<ServiceAccount> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await.map_err(classify)?;
        debug!("Listed {} Kubernetes service accounts", list.items.len());
        Ok(list.items.iter().map(remote_service_account).collect())
    }

    async fn create_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<RemoteServiceAccount, GatewayError> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        let sa = ServiceAccount {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        match api.create(&PostParams::default(), &sa).await {
            Ok(created) => {
                info!("Created Kubernetes service account '{}:{}'", namespace, name);
                Ok(remote_service_account(&created))
            }
            Err(e) if is_conflict(&e) => {
                warn!(
                    "Kubernetes service account '{}:{}' already exists, using the existing one",
                    namespace, name
                );
                let existing = api.get(name).await.map_err(classify)?;
                Ok(remote_service_account(&existing))
            }
            Err(e) => Err(classify(e)),
        }
    }

    async fn list_role_bindings(&self, namespace: &str) -> Result<Vec<RoleBindingRef>, GatewayError> {
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
        let list = api.list(&ListParams::default()).await.map_err(classify)?;
        Ok(list.items.iter().map(role_binding_ref).collect())
    }

    async fn create_role_binding(&self, namespace: &str, role: &str) -> Result<(), GatewayError> {
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
        let spec = RoleBindingSpec::new(namespace, role);
        match api.create(&PostParams::default(), &role_binding(&spec)).await {
            Ok(_) => {
                info!("Bound namespace '{}' to cluster role '{}'", namespace, role);
                Ok(())
            }
            Err(e) if is_conflict(&e) => {
                warn!(
                    "Role binding '{}' already exists in namespace '{}'",
                    spec.binding_name(),
                    namespace
                );
                Ok(())
            }
            Err(e) => Err(classify(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_grants_cluster_role_to_namespace_group() {
        let rb = role_binding(&RoleBindingSpec::new("teamx", "edit"));
        assert_eq!(rb.metadata.name.as_deref(), Some("edit"));
        assert_eq!(rb.role_ref.kind, "ClusterRole");
        assert_eq!(rb.role_ref.api_group, RBAC_API_GROUP);
        let subjects = rb.subjects.unwrap();
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].kind, "Group");
        assert_eq!(subjects[0].name, "system:serviceaccounts:teamx");
    }

    #[test]
    fn objects_without_uid_map_to_malformed_records() {
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some("ghost".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(remote_namespace(&ns).is_malformed());
    }

    #[test]
    fn observed_binding_kind() {
        let mut rb = role_binding(&RoleBindingSpec::new("teamx", "edit"));
        rb.role_ref.kind = "Role".to_string();
        let observed = role_binding_ref(&rb);
        assert_eq!(observed.role_kind, RoleRefKind::Role);
        assert_eq!(observed.role_name, "edit");
    }
}
