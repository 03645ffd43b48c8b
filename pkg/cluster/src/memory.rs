//! In-process cluster for tests and local development.
//!
//! Behaves like the API server where the reconciler can tell the difference:
//! UIDs are assigned on creation, creating an existing name adopts it,
//! creating into a missing namespace is rejected, and every new namespace
//! gets a `default` service account. Failures can be injected per resource.

use async_trait::async_trait;
use pkg_types::names::validate_name;
use pkg_types::namespace::RemoteNamespace;
use pkg_types::rbac::{RoleBindingRef, RoleBindingSpec};
use pkg_types::service_account::RemoteServiceAccount;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::gateway::ClusterGateway;

/// Number of create calls received, whether they created or adopted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CreateCalls {
    pub namespaces: usize,
    pub service_accounts: usize,
    pub role_bindings: usize,
}

#[derive(Default)]
struct ClusterState {
    namespaces: Vec<RemoteNamespace>,
    service_accounts: Vec<RemoteServiceAccount>,
    role_bindings: HashMap<String, Vec<RoleBindingRef>>,
    unreachable: bool,
    rejected_namespaces: HashSet<String>,
    rejected_service_accounts: HashSet<(String, String)>,
    rejected_bindings: HashSet<String>,
    unlistable_bindings: HashSet<String>,
    calls: CreateCalls,
}

impl ClusterState {
    fn check_reachable(&self) -> Result<(), GatewayError> {
        if self.unreachable {
            return Err(GatewayError::Unreachable("connection refused".to_string()));
        }
        Ok(())
    }

    fn namespace(&self, name: &str) -> Option<&RemoteNamespace> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    fn insert_namespace(&mut self, name: &str) -> RemoteNamespace {
        let ns = RemoteNamespace::new(name, &Uuid::new_v4().to_string());
        self.namespaces.push(ns.clone());
        self.insert_service_account(name, "default");
        ns
    }

    fn service_account(&self, namespace: &str, name: &str) -> Option<&RemoteServiceAccount> {
        self.service_accounts
            .iter()
            .find(|sa| sa.namespace == namespace && sa.name == name)
    }

    fn insert_service_account(&mut self, namespace: &str, name: &str) -> RemoteServiceAccount {
        let sa = RemoteServiceAccount::new(namespace, name, &Uuid::new_v4().to_string());
        self.service_accounts.push(sa.clone());
        sa
    }
}

/// A cluster kept in memory.
#[derive(Default)]
pub struct MemoryCluster {
    state: RwLock<ClusterState>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Out-of-band changes, as a cluster administrator would make them ---

    /// Create a namespace directly in the cluster. Returns its UID.
    pub async fn add_namespace(&self, name: &str) -> String {
        let mut state = self.state.write().await;
        if let Some(ns) = state.namespace(name) {
            return ns.external_id.clone();
        }
        state.insert_namespace(name).external_id
    }

    /// Append a raw listing entry, bypassing all checks.
    pub async fn add_raw_namespace(&self, ns: RemoteNamespace) {
        self.state.write().await.namespaces.push(ns);
    }

    /// Delete a namespace together with everything inside it.
    pub async fn remove_namespace(&self, name: &str) {
        let mut state = self.state.write().await;
        state.namespaces.retain(|ns| ns.name != name);
        state.service_accounts.retain(|sa| sa.namespace != name);
        state.role_bindings.remove(name);
    }

    /// Create a service account directly in the cluster. Returns its UID.
    /// The namespace does not have to exist, mimicking a listing that raced a deletion.
    pub async fn add_service_account(&self, namespace: &str, name: &str) -> String {
        let mut state = self.state.write().await;
        if let Some(sa) = state.service_account(namespace, name) {
            return sa.external_id.clone();
        }
        state.insert_service_account(namespace, name).external_id
    }

    pub async fn remove_service_account(&self, namespace: &str, name: &str) {
        self.state
            .write()
            .await
            .service_accounts
            .retain(|sa| !(sa.namespace == namespace && sa.name == name));
    }

    pub async fn add_role_binding(&self, namespace: &str, binding: RoleBindingRef) {
        self.state
            .write()
            .await
            .role_bindings
            .entry(namespace.to_string())
            .or_default()
            .push(binding);
    }

    // --- Failure injection ---

    pub async fn set_unreachable(&self, unreachable: bool) {
        self.state.write().await.unreachable = unreachable;
    }

    pub async fn reject_namespace(&self, name: &str) {
        self.state
            .write()
            .await
            .rejected_namespaces
            .insert(name.to_string());
    }

    pub async fn reject_service_account(&self, namespace: &str, name: &str) {
        self.state
            .write()
            .await
            .rejected_service_accounts
            .insert((namespace.to_string(), name.to_string()));
    }

    /// Every binding creation in `namespace` fails.
    pub async fn reject_role_bindings_in(&self, namespace: &str) {
        self.state
            .write()
            .await
            .rejected_bindings
            .insert(namespace.to_string());
    }

    /// Listing bindings of `namespace` fails.
    pub async fn fail_role_binding_listing_in(&self, namespace: &str) {
        self.state
            .write()
            .await
            .unlistable_bindings
            .insert(namespace.to_string());
    }

    // --- Inspection ---

    pub async fn namespace_names(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.namespaces.iter().map(|ns| ns.name.clone()).collect()
    }

    pub async fn namespace_uid(&self, name: &str) -> Option<String> {
        let state = self.state.read().await;
        state.namespace(name).map(|ns| ns.external_id.clone())
    }

    pub async fn service_account_uid(&self, namespace: &str, name: &str) -> Option<String> {
        let state = self.state.read().await;
        state
            .service_account(namespace, name)
            .map(|sa| sa.external_id.clone())
    }

    pub async fn role_bindings_in(&self, namespace: &str) -> Vec<RoleBindingRef> {
        let state = self.state.read().await;
        state
            .role_bindings
            .get(namespace)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn create_calls(&self) -> CreateCalls {
        self.state.read().await.calls
    }
}

#[async_trait]
impl ClusterGateway for MemoryCluster {
    async fn list_namespaces(&self) -> Result<Vec<RemoteNamespace>, GatewayError> {
        let state = self.state.read().await;
        state.check_reachable()?;
        Ok(state.namespaces.clone())
    }

    async fn create_namespace(&self, name: &str) -> Result<RemoteNamespace, GatewayError> {
        let mut state = self.state.write().await;
        state.check_reachable()?;
        state.calls.namespaces += 1;
        if state.rejected_namespaces.contains(name) {
            return Err(GatewayError::rejected(403, format!("namespaces \"{}\" is forbidden", name)));
        }
        if let Err(e) = validate_name(name) {
            return Err(GatewayError::rejected(422, e.to_string()));
        }
        if let Some(existing) = state.namespace(name) {
            return Ok(existing.clone());
        }
        Ok(state.insert_namespace(name))
    }

    async fn list_service_accounts(&self) -> Result<Vec<RemoteServiceAccount>, GatewayError> {
        let state = self.state.read().await;
        state.check_reachable()?;
        Ok(state.service_accounts.clone())
    }

    async fn create_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<RemoteServiceAccount, GatewayError> {
        let mut state = self.state.write().await;
        state.check_reachable()?;
        state.calls.service_accounts += 1;
        let key = (namespace.to_string(), name.to_string());
        if state.rejected_service_accounts.contains(&key) {
            return Err(GatewayError::rejected(
                403,
                format!("serviceaccounts \"{}\" is forbidden", name),
            ));
        }
        if state.namespace(namespace).is_none() {
            return Err(GatewayError::rejected(
                404,
                format!("namespaces \"{}\" not found", namespace),
            ));
        }
        if let Some(existing) = state.service_account(namespace, name) {
            return Ok(existing.clone());
        }
        Ok(state.insert_service_account(namespace, name))
    }

    async fn list_role_bindings(&self, namespace: &str) -> Result<Vec<RoleBindingRef>, GatewayError> {
        let state = self.state.read().await;
        state.check_reachable()?;
        if state.unlistable_bindings.contains(namespace) {
            return Err(GatewayError::rejected(
                403,
                format!("rolebindings in \"{}\" are forbidden", namespace),
            ));
        }
        Ok(state
            .role_bindings
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_role_binding(&self, namespace: &str, role: &str) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        state.check_reachable()?;
        state.calls.role_bindings += 1;
        if state.rejected_bindings.contains(namespace) {
            return Err(GatewayError::rejected(
                403,
                format!("rolebindings in \"{}\" are forbidden", namespace),
            ));
        }
        if state.namespace(namespace).is_none() {
            return Err(GatewayError::rejected(
                404,
                format!("namespaces \"{}\" not found", namespace),
            ));
        }
        let spec = RoleBindingSpec::new(namespace, role);
        let bindings = state.role_bindings.entry(namespace.to_string()).or_default();
        if !bindings.iter().any(|b| b.name == spec.binding_name()) {
            bindings.push(RoleBindingRef::cluster_role(spec.binding_name(), &spec.role_name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_adopts_existing_namespace() {
        let cluster = MemoryCluster::new();
        let uid = cluster.add_namespace("teamx").await;

        let created = cluster.create_namespace("teamx").await.unwrap();
        assert_eq!(created.external_id, uid);
        assert_eq!(cluster.namespace_names().await, vec!["teamx".to_string()]);
        assert_eq!(cluster.create_calls().await.namespaces, 1);
    }

    #[tokio::test]
    async fn new_namespace_gets_default_service_account() {
        let cluster = MemoryCluster::new();
        cluster.create_namespace("teamx").await.unwrap();
        assert!(cluster.service_account_uid("teamx", "default").await.is_some());
    }

    #[tokio::test]
    async fn illegal_names_are_rejected() {
        let cluster = MemoryCluster::new();
        let err = cluster.create_namespace("Team_X").await.unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { status: 422, .. }));
    }

    #[tokio::test]
    async fn service_account_needs_namespace() {
        let cluster = MemoryCluster::new();
        let err = cluster.create_service_account("ghost", "bot").await.unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn unreachable_fails_everything() {
        let cluster = MemoryCluster::new();
        cluster.set_unreachable(true).await;
        assert!(matches!(
            cluster.list_namespaces().await,
            Err(GatewayError::Unreachable(_))
        ));
        assert!(cluster.list_service_accounts().await.is_err());
    }

    #[tokio::test]
    async fn removing_namespace_removes_contents() {
        let cluster = MemoryCluster::new();
        cluster.add_namespace("teamx").await;
        cluster.create_role_binding("teamx", "edit").await.unwrap();
        cluster.remove_namespace("teamx").await;

        assert!(cluster.service_account_uid("teamx", "default").await.is_none());
        assert!(cluster.role_bindings_in("teamx").await.is_empty());
    }
}
