use pkg_cluster::ClusterGateway;
use pkg_state::registry::PortalRegistry;
use pkg_types::namespace::ClusterNamespace;
use pkg_types::notice::NoticeContext;
use pkg_types::service_account::{ClusterServiceAccount, RemoteServiceAccount};
use pkg_types::sync::ReconcileSummary;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::SyncError;
use crate::notices::Notices;

/// What the pull half saw in the cluster, handed to the push half.
#[derive(Debug, Default)]
pub struct ServiceAccountPull {
    pub observed: HashSet<String>,
    /// `namespace:name` of accounts whose namespace has no record.
    pub skipped: Vec<String>,
    pub summary: ReconcileSummary,
}

enum PullAction {
    Existing,
    Discovered,
    Skipped,
}

enum PushAction {
    Confirmed,
    Removed,
    Created,
}

/// Reconciles service account records with the cluster's service accounts.
/// Runs after namespaces, so every account normally finds its namespace record.
pub struct ServiceAccountReconciler {
    registry: PortalRegistry,
    cluster: Arc<dyn ClusterGateway>,
}

impl ServiceAccountReconciler {
    pub fn new(registry: PortalRegistry, cluster: Arc<dyn ClusterGateway>) -> Self {
        Self { registry, cluster }
    }

    pub async fn pull(&self, notices: &mut Notices) -> Result<ServiceAccountPull, SyncError> {
        let remote = self.cluster.list_service_accounts().await?;
        debug!("Pulling {} Kubernetes service accounts", remote.len());

        let mut pull = ServiceAccountPull::default();
        for sa in remote {
            if !sa.external_id.is_empty() {
                pull.observed.insert(sa.external_id.clone());
            }
            match self.pull_one(&sa, notices).await {
                Ok(PullAction::Existing) => pull.summary.pulled += 1,
                Ok(PullAction::Discovered) => pull.summary.discovered += 1,
                Ok(PullAction::Skipped) => pull.skipped.push(sa.to_string()),
                Err(e) => {
                    pull.summary.failed += 1;
                    notices.item_failed(
                        "Sync from Kubernetes for service account",
                        &NoticeContext::pair(&sa.namespace, &sa.name),
                        &e,
                    );
                }
            }
        }

        if !pull.skipped.is_empty() {
            notices.warning(format!(
                "Skipping service accounts with non-existent namespaces: {:?}",
                pull.skipped
            ));
        }
        Ok(pull)
    }

    async fn pull_one(
        &self,
        sa: &RemoteServiceAccount,
        notices: &mut Notices,
    ) -> Result<PullAction, SyncError> {
        if sa.is_malformed() {
            return Err(SyncError::Malformed(format!(
                "service account '{}' with UID '{}'",
                sa, sa.external_id
            )));
        }
        let Some(ns) = self.resolve_namespace(&sa.namespace, notices).await? else {
            warn!(
                "Skipping Kubernetes service account {}, namespace has no record",
                sa
            );
            return Ok(PullAction::Skipped);
        };

        let (_, created) = self
            .registry
            .get_or_create_service_account(&ns.id, &sa.name, &sa.external_id)
            .await?;
        if created {
            notices.info(format!("Found new Kubernetes service account '{}'.", sa));
            Ok(PullAction::Discovered)
        } else {
            Ok(PullAction::Existing)
        }
    }

    /// Find the single namespace record called `name`.
    ///
    /// More than one record for a name is an integrity problem. It is healed
    /// by keeping one record and deleting the rest together with their
    /// service account records. Confirmed records win over pending ones,
    /// then the most recently created wins.
    async fn resolve_namespace(
        &self,
        name: &str,
        notices: &mut Notices,
    ) -> Result<Option<ClusterNamespace>, SyncError> {
        let mut matches = self.registry.namespaces_named(name).await?;
        if matches.len() <= 1 {
            return Ok(matches.pop());
        }

        error!(
            "Found {} namespace records named '{}', keeping one and deleting the others",
            matches.len(),
            name
        );
        matches.sort_by_key(|ns| (ns.is_synced(), ns.created_at, ns.id.clone()));
        let Some(keep) = matches.pop() else {
            return Ok(None);
        };
        for duplicate in &matches {
            let accounts = self.registry.delete_namespace(&duplicate.id).await?;
            error!(
                "Deleted duplicate namespace record {} of '{}' (kept {}), {} service account record(s) removed with it",
                duplicate.id, name, keep.id, accounts
            );
        }
        notices.error(format!(
            "Removed {} duplicate record(s) of namespace '{}'.",
            matches.len(),
            name
        ));

        let mut resolved = self.registry.namespaces_named(name).await?;
        Ok(resolved.pop())
    }

    pub async fn push(
        &self,
        pull: ServiceAccountPull,
        notices: &mut Notices,
    ) -> Result<ReconcileSummary, SyncError> {
        let accounts = self.registry.list_service_accounts().await?;
        let namespaces: HashMap<String, ClusterNamespace> = self
            .registry
            .list_namespaces()
            .await?
            .into_iter()
            .map(|ns| (ns.id.clone(), ns))
            .collect();
        let mut summary = pull.summary;

        for sa in &accounts {
            let namespace = namespaces.get(&sa.namespace_id);
            let result = match namespace {
                Some(ns) => self.push_one(sa, ns, &accounts, &pull.observed, notices).await,
                None => Err(SyncError::Item(anyhow::anyhow!(
                    "namespace record {} does not exist",
                    sa.namespace_id
                ))),
            };
            match result {
                Ok(PushAction::Confirmed) => summary.confirmed += 1,
                Ok(PushAction::Removed) => summary.removed += 1,
                Ok(PushAction::Created) => summary.created += 1,
                Err(e) => {
                    summary.failed += 1;
                    let ns_name = namespace.map(|ns| ns.name.as_str()).unwrap_or_default();
                    notices.item_failed(
                        "Sync to Kubernetes for service account",
                        &NoticeContext::pair(ns_name, &sa.name),
                        &e,
                    );
                }
            }
        }

        if summary.in_sync() {
            notices.success("All valid service accounts are in sync.");
        }
        Ok(summary)
    }

    async fn push_one(
        &self,
        sa: &ClusterServiceAccount,
        ns: &ClusterNamespace,
        accounts: &[ClusterServiceAccount],
        observed: &HashSet<String>,
        notices: &mut Notices,
    ) -> Result<PushAction, SyncError> {
        match &sa.external_id {
            Some(uid) if observed.contains(uid) => Ok(PushAction::Confirmed),
            Some(_) => {
                self.registry.delete_service_account(sa).await?;
                notices.info(format!(
                    "Service account '{}:{}' no longer exists in Kubernetes and was removed.",
                    ns.name, sa.name
                ));
                Ok(PushAction::Removed)
            }
            None => {
                if !ns.is_synced() {
                    return Err(SyncError::PendingNamespace {
                        namespace: ns.name.clone(),
                        account: sa.name.clone(),
                    });
                }
                let remote = self.cluster.create_service_account(&ns.name, &sa.name).await?;
                if remote.is_malformed() {
                    return Err(SyncError::Malformed(format!(
                        "created service account '{}:{}' came back without UID",
                        ns.name, sa.name
                    )));
                }

                let owner = accounts.iter().find(|other| {
                    other.id != sa.id
                        && other.external_id.as_deref() == Some(remote.external_id.as_str())
                });
                if let Some(owner) = owner {
                    return Err(SyncError::Item(anyhow::anyhow!(
                        "Kubernetes service account '{}:{}' is already mirrored by record {}",
                        ns.name,
                        sa.name,
                        owner.id
                    )));
                }

                self.registry
                    .set_service_account_external_id(sa, &remote.external_id)
                    .await?;
                notices.success(format!(
                    "Created service account '{}:{}' in Kubernetes.",
                    ns.name, sa.name
                ));
                Ok(PushAction::Created)
            }
        }
    }
}
