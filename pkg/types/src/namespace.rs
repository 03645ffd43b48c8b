use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Portal mirror of a cluster namespace.
///
/// `external_id` is the cluster-assigned UID. It is `None` while the record
/// is pending creation in the cluster, and `Some` once the namespace was
/// confirmed to exist as of the last pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNamespace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    pub created_at: DateTime<Utc>,
}

fn default_visible() -> bool {
    true
}

impl ClusterNamespace {
    /// A record created by an administrator, not yet materialized in the cluster.
    /// The name may still be an arbitrary display string.
    pub fn pending(name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            external_id: None,
            visible: true,
            created_at: Utc::now(),
        }
    }

    /// A record mirroring a namespace discovered in the cluster.
    pub fn mirrored(name: &str, external_id: &str, visible: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            external_id: Some(external_id.to_string()),
            visible,
            created_at: Utc::now(),
        }
    }

    pub fn is_synced(&self) -> bool {
        self.external_id.is_some()
    }
}

impl std::fmt::Display for ClusterNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A namespace as listed by the cluster control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNamespace {
    pub name: String,
    pub external_id: String,
}

impl RemoteNamespace {
    pub fn new(name: &str, external_id: &str) -> Self {
        Self {
            name: name.to_string(),
            external_id: external_id.to_string(),
        }
    }

    /// Cluster objects without name or UID cannot be mirrored.
    pub fn is_malformed(&self) -> bool {
        self.name.is_empty() || self.external_id.is_empty()
    }
}
