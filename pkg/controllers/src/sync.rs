use pkg_cluster::ClusterGateway;
use pkg_constants::state::SYNC_LEASE_TTL_SECS;
use pkg_state::lease::SyncLease;
use pkg_state::registry::PortalRegistry;
use pkg_types::notice::{Notice, Severity};
use pkg_types::sync::SyncOutcome;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SyncError;
use crate::namespace::NamespaceReconciler;
use crate::notices::Notices;
use crate::rolebinding::RoleBindingEnforcer;
use crate::service_account::ServiceAccountReconciler;

const ALREADY_RUNNING: &str = "A synchronization pass is already running, try again later.";

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Cluster roles every visible namespace must be bound to.
    pub required_roles: Vec<String>,
    /// Identifies this server in the sync lease.
    pub holder_id: String,
    pub lease_ttl: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            required_roles: Vec::new(),
            holder_id: format!("kportal-{}", Uuid::new_v4()),
            lease_ttl: Duration::from_secs(SYNC_LEASE_TTL_SECS),
        }
    }
}

/// Runs sync passes: namespaces, then role bindings, then service accounts.
///
/// At most one pass runs at a time, both within this process and across
/// servers sharing the state store.
pub struct SyncOrchestrator {
    namespaces: NamespaceReconciler,
    role_bindings: RoleBindingEnforcer,
    service_accounts: ServiceAccountReconciler,
    lease: SyncLease,
    running: Mutex<()>,
}

impl SyncOrchestrator {
    pub fn new(
        registry: PortalRegistry,
        cluster: Arc<dyn ClusterGateway>,
        settings: SyncSettings,
    ) -> Self {
        let lease = SyncLease::new(registry.store().clone(), settings.holder_id)
            .with_ttl(settings.lease_ttl);
        Self {
            namespaces: NamespaceReconciler::new(registry.clone(), cluster.clone()),
            role_bindings: RoleBindingEnforcer::new(
                registry.clone(),
                cluster.clone(),
                settings.required_roles,
            ),
            service_accounts: ServiceAccountReconciler::new(registry, cluster),
            lease,
            running: Mutex::new(()),
        }
    }

    /// Start the scheduled sync loop in the background.
    pub fn start(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "SyncOrchestrator started (interval={}s, holder={})",
                interval.as_secs(),
                self.lease.holder_id()
            );
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let outcome = self.run_once().await;
                if !outcome.success {
                    warn!("Scheduled sync pass did not complete");
                }
            }
        })
    }

    /// Run one pass. A pass refused because another one is running comes
    /// back unsuccessful with a warning notice.
    pub async fn run_once(&self) -> SyncOutcome {
        match self.try_run().await {
            Some(outcome) => outcome,
            None => SyncOutcome {
                success: false,
                notices: vec![Notice::new(Severity::Warning, ALREADY_RUNNING)],
                ..Default::default()
            },
        }
    }

    /// Run one pass, or return `None` without touching anything if another
    /// pass holds the guard.
    pub async fn try_run(&self) -> Option<SyncOutcome> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Sync pass requested while another one is running in this process");
            return None;
        };

        match self.lease.try_acquire().await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Sync pass requested while another server holds the sync lease");
                return None;
            }
            Err(e) => {
                let mut notices = Notices::new();
                notices.error(format!("Could not take the sync lease: {:#}", e));
                return Some(SyncOutcome {
                    success: false,
                    notices: notices.into_vec(),
                    ..Default::default()
                });
            }
        }

        let outcome = self.run_pass().await;
        if let Err(e) = self.lease.release().await {
            warn!("Failed to release sync lease: {}", e);
        }
        Some(outcome)
    }

    async fn run_pass(&self) -> SyncOutcome {
        let started = Instant::now();
        let mut notices = Notices::new();
        let mut outcome = SyncOutcome::default();

        match self.run_phases(&mut outcome, &mut notices).await {
            Ok(()) => outcome.success = true,
            Err(SyncError::Transport(e)) => notices.error(format!(
                "Kubernetes returned an error during synchronization: {}",
                e.message()
            )),
            Err(e) => notices.error(format!("Synchronization failed: {}", e)),
        }

        outcome.notices = notices.into_vec();
        info!(
            "Sync pass finished in {:?} (success={}, notices={})",
            started.elapsed(),
            outcome.success,
            outcome.notices.len()
        );
        outcome
    }

    async fn run_phases(
        &self,
        outcome: &mut SyncOutcome,
        notices: &mut Notices,
    ) -> Result<(), SyncError> {
        let pulled = self.namespaces.pull(notices).await?;
        outcome.namespaces = self.namespaces.push(pulled, notices).await?;

        outcome.role_bindings = self.role_bindings.enforce_all(notices).await?;

        let pulled = self.service_accounts.pull(notices).await?;
        outcome.service_accounts = self.service_accounts.push(pulled, notices).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{count_notices, make_cluster, make_registry};
    use pkg_cluster::MemoryCluster;
    use pkg_types::namespace::ClusterNamespace;
    use pkg_types::service_account::ClusterServiceAccount;

    async fn make_orchestrator(
        roles: &[&str],
    ) -> (SyncOrchestrator, PortalRegistry, Arc<MemoryCluster>) {
        let registry = make_registry().await;
        let (cluster, gateway) = make_cluster();
        let settings = SyncSettings {
            required_roles: roles.iter().map(|r| r.to_string()).collect(),
            holder_id: "test-server".to_string(),
            ..Default::default()
        };
        let orchestrator = SyncOrchestrator::new(registry.clone(), gateway, settings);
        (orchestrator, registry, cluster)
    }

    async fn snapshot(
        registry: &PortalRegistry,
    ) -> (Vec<ClusterNamespace>, Vec<ClusterServiceAccount>) {
        (
            registry.list_namespaces().await.unwrap(),
            registry.list_service_accounts().await.unwrap(),
        )
    }

    #[tokio::test]
    async fn second_pass_changes_nothing() {
        let (orchestrator, registry, cluster) = make_orchestrator(&["edit"]).await;
        cluster.add_namespace("default").await;
        cluster.add_namespace("kube-system").await;
        let teamx = registry.create_pending_namespace("Team_X").await.unwrap();
        registry
            .create_pending_service_account(&teamx.id, "bot")
            .await
            .unwrap();

        let first = orchestrator.run_once().await;
        assert!(first.success);
        let state = snapshot(&registry).await;
        let calls = cluster.create_calls().await;

        let second = orchestrator.run_once().await;
        assert!(second.success);
        assert_eq!(snapshot(&registry).await, state);
        assert_eq!(cluster.create_calls().await, calls);
        assert!(second.namespaces.in_sync());
        assert!(second.service_accounts.in_sync());
        assert_eq!(second.role_bindings.created, 0);
        assert_eq!(second.notices_with(Severity::Error).count(), 0);
    }

    #[tokio::test]
    async fn pending_records_converge_in_one_pass() {
        let (orchestrator, registry, cluster) = make_orchestrator(&["edit", "view"]).await;
        let teamx = registry.create_pending_namespace("Team_X").await.unwrap();
        registry
            .create_pending_service_account(&teamx.id, "bot")
            .await
            .unwrap();

        let outcome = orchestrator.run_once().await;
        assert!(outcome.success);
        assert_eq!(outcome.namespaces.created, 1);
        assert_eq!(outcome.role_bindings.created, 2);
        assert_eq!(outcome.service_accounts.created, 1);

        let ns_uid = cluster.namespace_uid("teamx").await.unwrap();
        let record = registry.get_namespace(&teamx.id).await.unwrap().unwrap();
        assert_eq!(record.name, "teamx");
        assert_eq!(record.external_id.as_deref(), Some(ns_uid.as_str()));

        let sa_uid = cluster.service_account_uid("teamx", "bot").await.unwrap();
        let accounts = registry.service_accounts_of(&teamx.id).await.unwrap();
        let bot = accounts.iter().find(|sa| sa.name == "bot").unwrap();
        assert_eq!(bot.external_id.as_deref(), Some(sa_uid.as_str()));
        assert_eq!(cluster.role_bindings_in("teamx").await.len(), 2);
    }

    #[tokio::test]
    async fn unreachable_cluster_fails_the_pass_and_keeps_state() {
        let (orchestrator, registry, cluster) = make_orchestrator(&["edit"]).await;
        registry.create_pending_namespace("teamx").await.unwrap();
        cluster.set_unreachable(true).await;
        let before = snapshot(&registry).await;

        let outcome = orchestrator.run_once().await;
        assert!(!outcome.success);
        assert_eq!(
            count_notices(
                &outcome.notices,
                Severity::Error,
                "Kubernetes returned an error during synchronization: connection refused"
            ),
            1
        );
        assert_eq!(snapshot(&registry).await, before);

        // The lease is released, so the next pass can run
        cluster.set_unreachable(false).await;
        assert!(orchestrator.run_once().await.success);
    }

    #[tokio::test]
    async fn overlapping_pass_is_refused() {
        let (orchestrator, registry, cluster) = make_orchestrator(&[]).await;
        registry.create_pending_namespace("teamx").await.unwrap();

        let guard = orchestrator.running.try_lock().unwrap();
        assert!(orchestrator.try_run().await.is_none());
        let outcome = orchestrator.run_once().await;
        assert!(!outcome.success);
        assert_eq!(count_notices(&outcome.notices, Severity::Warning, "already running"), 1);
        assert_eq!(cluster.create_calls().await.namespaces, 0);
        drop(guard);

        assert!(orchestrator.run_once().await.success);
        assert_eq!(cluster.create_calls().await.namespaces, 1);
    }

    #[tokio::test]
    async fn lease_held_by_another_server_refuses_the_pass() {
        let (orchestrator, registry, cluster) = make_orchestrator(&[]).await;
        registry.create_pending_namespace("teamx").await.unwrap();
        let other = SyncLease::new(registry.store().clone(), "other-server".to_string());
        assert!(other.try_acquire().await.unwrap());

        assert!(orchestrator.try_run().await.is_none());
        assert!(cluster.namespace_names().await.is_empty());

        other.release().await.unwrap();
        assert!(orchestrator.try_run().await.unwrap().success);
        assert!(orchestrator.lease.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn namespace_deleted_in_cluster_takes_its_accounts() {
        let (orchestrator, registry, cluster) = make_orchestrator(&[]).await;
        cluster.add_namespace("teamx").await;
        cluster.add_service_account("teamx", "bot").await;
        assert!(orchestrator.run_once().await.success);
        assert_eq!(registry.list_service_accounts().await.unwrap().len(), 2);

        cluster.remove_namespace("teamx").await;
        let outcome = orchestrator.run_once().await;
        assert!(outcome.success);
        assert_eq!(outcome.namespaces.removed, 1);
        assert!(registry.list_namespaces().await.unwrap().is_empty());
        assert!(registry.list_service_accounts().await.unwrap().is_empty());
        assert_eq!(
            count_notices(
                &outcome.notices,
                Severity::Info,
                "Namespace 'teamx' no longer exists in Kubernetes and was removed."
            ),
            1
        );
    }

    #[tokio::test]
    async fn recreated_namespace_replaces_its_record() {
        let (orchestrator, registry, cluster) = make_orchestrator(&[]).await;
        let first_uid = cluster.add_namespace("teamx").await;
        assert!(orchestrator.run_once().await.success);

        cluster.remove_namespace("teamx").await;
        let second_uid = cluster.add_namespace("teamx").await;
        assert_ne!(first_uid, second_uid);

        let outcome = orchestrator.run_once().await;
        assert!(outcome.success);
        let records = registry.namespaces_named("teamx").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].external_id.as_deref(), Some(second_uid.as_str()));
        assert_eq!(registry.list_service_accounts().await.unwrap().len(), 1);
    }
}
