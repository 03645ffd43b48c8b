use pkg_cluster::ClusterGateway;
use pkg_constants::sync::is_hidden_namespace;
use pkg_state::registry::PortalRegistry;
use pkg_types::names::{sanitize, sanitize_or_reject};
use pkg_types::namespace::{ClusterNamespace, RemoteNamespace};
use pkg_types::notice::NoticeContext;
use pkg_types::sync::ReconcileSummary;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::SyncError;
use crate::notices::Notices;

/// What the pull half saw in the cluster, handed to the push half.
#[derive(Debug, Default)]
pub struct NamespacePull {
    /// UIDs of every namespace the cluster listed, malformed ones included.
    pub observed: HashSet<String>,
    pub summary: ReconcileSummary,
}

enum PushAction {
    Confirmed,
    Removed,
    Created,
}

/// Reconciles namespace records with the cluster's namespaces.
///
/// Pull mirrors every cluster namespace into the registry; push creates
/// pending records in the cluster and drops records whose namespace vanished.
pub struct NamespaceReconciler {
    registry: PortalRegistry,
    cluster: Arc<dyn ClusterGateway>,
}

impl NamespaceReconciler {
    pub fn new(registry: PortalRegistry, cluster: Arc<dyn ClusterGateway>) -> Self {
        Self { registry, cluster }
    }

    pub async fn pull(&self, notices: &mut Notices) -> Result<NamespacePull, SyncError> {
        let remote = self.cluster.list_namespaces().await?;
        debug!("Pulling {} Kubernetes namespaces", remote.len());

        let mut pull = NamespacePull::default();
        for ns in remote {
            if !ns.external_id.is_empty() {
                pull.observed.insert(ns.external_id.clone());
            }
            match self.pull_one(&ns, notices).await {
                Ok(true) => pull.summary.discovered += 1,
                Ok(false) => pull.summary.pulled += 1,
                Err(e) => {
                    pull.summary.failed += 1;
                    notices.item_failed(
                        "Sync from Kubernetes for namespace",
                        &NoticeContext::single(&ns.name),
                        &e,
                    );
                }
            }
        }
        Ok(pull)
    }

    /// Returns whether a new record was created.
    async fn pull_one(&self, ns: &RemoteNamespace, notices: &mut Notices) -> Result<bool, SyncError> {
        if ns.is_malformed() {
            return Err(SyncError::Malformed(format!(
                "namespace '{}' with UID '{}'",
                ns.name, ns.external_id
            )));
        }
        let visible = !is_hidden_namespace(&ns.name);
        let (record, created) = self
            .registry
            .get_or_create_namespace(&ns.name, &ns.external_id, visible)
            .await?;
        if created {
            notices.info(format!("Found new Kubernetes namespace '{}'.", record.name));
        }
        Ok(created)
    }

    pub async fn push(
        &self,
        pull: NamespacePull,
        notices: &mut Notices,
    ) -> Result<ReconcileSummary, SyncError> {
        let records = self.registry.list_namespaces().await?;
        let mut summary = pull.summary;

        for record in records {
            match self.push_one(&record, &pull.observed, notices).await {
                Ok(PushAction::Confirmed) => summary.confirmed += 1,
                Ok(PushAction::Removed) => summary.removed += 1,
                Ok(PushAction::Created) => summary.created += 1,
                Err(e) => {
                    summary.failed += 1;
                    notices.item_failed(
                        "Sync to Kubernetes for namespace",
                        &NoticeContext::single(&record.name),
                        &e,
                    );
                }
            }
        }

        if summary.in_sync() {
            notices.success("All valid namespaces are in sync.");
        }
        Ok(summary)
    }

    async fn push_one(
        &self,
        record: &ClusterNamespace,
        observed: &HashSet<String>,
        notices: &mut Notices,
    ) -> Result<PushAction, SyncError> {
        match &record.external_id {
            Some(uid) if observed.contains(uid) => Ok(PushAction::Confirmed),
            Some(_) => {
                let accounts = self.registry.delete_namespace(&record.id).await?;
                debug!(
                    "Removed namespace record {} with {} service account record(s)",
                    record.id, accounts
                );
                notices.info(format!(
                    "Namespace '{}' no longer exists in Kubernetes and was removed.",
                    record.name
                ));
                Ok(PushAction::Removed)
            }
            None => self.create_in_cluster(record, notices).await,
        }
    }

    async fn create_in_cluster(
        &self,
        record: &ClusterNamespace,
        notices: &mut Notices,
    ) -> Result<PushAction, SyncError> {
        // Re-read so renames and creations made earlier in this pass count as taken
        let current = self.registry.list_namespaces().await?;

        if sanitize(&record.name).is_empty() {
            return Err(SyncError::Malformed(format!(
                "name '{}' has no usable characters",
                record.name
            )));
        }

        // Other pending records under the same stored name are not claims yet;
        // the first one to reach the cluster takes the name.
        let taken: HashSet<String> = current
            .iter()
            .filter(|ns| ns.id != record.id)
            .filter(|ns| ns.is_synced() || ns.name != record.name)
            .map(|ns| ns.name.clone())
            .collect();
        let sanitized = sanitize_or_reject(&record.name, &taken)?;

        let mut record = record.clone();
        if sanitized != record.name {
            notices.warning(format!(
                "Given name '{}' for new Kubernetes namespace was invalid, chosen name is now '{}'.",
                record.name, sanitized
            ));
            record = self.registry.rename_namespace(&record.id, &sanitized).await?;
        }

        let remote = self.cluster.create_namespace(&record.name).await?;
        if remote.is_malformed() {
            return Err(SyncError::Malformed(format!(
                "created namespace '{}' came back without UID",
                record.name
            )));
        }

        let owner = current.iter().find(|ns| {
            ns.id != record.id && ns.external_id.as_deref() == Some(remote.external_id.as_str())
        });
        if let Some(owner) = owner {
            return Err(SyncError::Item(anyhow::anyhow!(
                "Kubernetes namespace '{}' is already mirrored by record {}",
                record.name,
                owner.id
            )));
        }

        self.registry
            .set_namespace_external_id(&record.id, &remote.external_id)
            .await?;
        notices.success(format!("Created namespace '{}' in Kubernetes.", record.name));
        Ok(PushAction::Created)
    }
}
