use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Portal mirror of a cluster service account, owned by one namespace record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterServiceAccount {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub external_id: Option<String>,
    /// `id` of the owning `ClusterNamespace` record.
    pub namespace_id: String,
    pub created_at: DateTime<Utc>,
}

impl ClusterServiceAccount {
    pub fn pending(namespace_id: &str, name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            external_id: None,
            namespace_id: namespace_id.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn mirrored(namespace_id: &str, name: &str, external_id: &str) -> Self {
        Self {
            external_id: Some(external_id.to_string()),
            ..Self::pending(namespace_id, name)
        }
    }

    pub fn is_synced(&self) -> bool {
        self.external_id.is_some()
    }
}

/// A service account as listed by the cluster control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteServiceAccount {
    pub name: String,
    pub external_id: String,
    /// Name of the cluster namespace holding the account.
    pub namespace: String,
}

impl RemoteServiceAccount {
    pub fn new(namespace: &str, name: &str, external_id: &str) -> Self {
        Self {
            name: name.to_string(),
            external_id: external_id.to_string(),
            namespace: namespace.to_string(),
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.name.is_empty() || self.external_id.is_empty() || self.namespace.is_empty()
    }
}

impl std::fmt::Display for RemoteServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}
