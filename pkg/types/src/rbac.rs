use pkg_constants::sync::SERVICE_ACCOUNTS_GROUP_PREFIX;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// --- Role reference ---

/// Kind of role a binding refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleRefKind {
    ClusterRole,
    Role,
    Other(String),
}

impl RoleRefKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "ClusterRole" => RoleRefKind::ClusterRole,
            "Role" => RoleRefKind::Role,
            other => RoleRefKind::Other(other.to_string()),
        }
    }
}

// --- Observed binding ---

/// A role binding as observed in one cluster namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBindingRef {
    pub name: String,
    pub role_name: String,
    pub role_kind: RoleRefKind,
}

impl RoleBindingRef {
    pub fn cluster_role(name: &str, role_name: &str) -> Self {
        Self {
            name: name.to_string(),
            role_name: role_name.to_string(),
            role_kind: RoleRefKind::ClusterRole,
        }
    }
}

/// Names of the cluster roles a namespace is currently bound to.
/// Bindings to namespaced roles do not count.
pub fn bound_cluster_roles(bindings: &[RoleBindingRef]) -> HashSet<&str> {
    bindings
        .iter()
        .filter(|b| b.role_kind == RoleRefKind::ClusterRole)
        .map(|b| b.role_name.as_str())
        .collect()
}

// --- Desired binding ---

/// Binding of every service account in `namespace` to the cluster role `role_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBindingSpec {
    pub namespace: String,
    pub role_name: String,
}

impl RoleBindingSpec {
    pub fn new(namespace: &str, role_name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            role_name: role_name.to_string(),
        }
    }

    /// Bindings are named after the role they grant.
    pub fn binding_name(&self) -> &str {
        &self.role_name
    }

    /// Group subject representing all service accounts of the namespace.
    pub fn subject_group(&self) -> String {
        format!("{}{}", SERVICE_ACCOUNTS_GROUP_PREFIX, self.namespace)
    }
}
