//! Reconciliation constants.

/// Cluster namespaces mirrored with `visible = false`.
/// Hidden namespaces never receive role bindings.
pub const HIDDEN_NAMESPACES: &[&str] = &["kube-system", "kube-public", "kube-node-lease"];

/// API group of RBAC role references and group subjects.
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Group subject prefix covering every service account of a namespace.
/// Full subject = `SERVICE_ACCOUNTS_GROUP_PREFIX + namespace`.
pub const SERVICE_ACCOUNTS_GROUP_PREFIX: &str = "system:serviceaccounts:";

/// Default interval of the scheduled sync job, in seconds.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

/// Returns true if the namespace is one of the hidden system namespaces.
pub fn is_hidden_namespace(name: &str) -> bool {
    HIDDEN_NAMESPACES.contains(&name)
}
