//! Typed access to the portal's mirror records.
//!
//! Namespace records live under `/registry/portal/namespaces/{id}`, service
//! account records under `/registry/portal/serviceaccounts/{namespace_id}/{id}`.
//! Keying service accounts by their namespace id makes the cascade on
//! namespace removal a single prefix delete.

use anyhow::{Context, bail};
use pkg_constants::state::{NAMESPACE_PREFIX, SERVICE_ACCOUNT_PREFIX};
use pkg_types::names::validate_name;
use pkg_types::namespace::ClusterNamespace;
use pkg_types::service_account::ClusterServiceAccount;
use tracing::{debug, info};

use crate::client::StateStore;

fn namespace_key(id: &str) -> String {
    format!("{}{}", NAMESPACE_PREFIX, id)
}

fn service_accounts_prefix(namespace_id: &str) -> String {
    format!("{}{}/", SERVICE_ACCOUNT_PREFIX, namespace_id)
}

fn service_account_key(namespace_id: &str, id: &str) -> String {
    format!("{}{}", service_accounts_prefix(namespace_id), id)
}

/// Oldest first; ties broken by id so the order is total.
fn sort_by_creation<T, F>(records: &mut [T], key: F)
where
    F: Fn(&T) -> (chrono::DateTime<chrono::Utc>, String),
{
    records.sort_by_key(key);
}

/// Local store of mirrored namespaces and service accounts.
#[derive(Clone)]
pub struct PortalRegistry {
    store: StateStore,
}

impl PortalRegistry {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    // ============================================================
    // Namespaces
    // ============================================================

    /// All namespace records, oldest first.
    pub async fn list_namespaces(&self) -> anyhow::Result<Vec<ClusterNamespace>> {
        let mut namespaces: Vec<ClusterNamespace> = self.store.list_json(NAMESPACE_PREFIX).await?;
        sort_by_creation(&mut namespaces, |ns| (ns.created_at, ns.id.clone()));
        Ok(namespaces)
    }

    pub async fn get_namespace(&self, id: &str) -> anyhow::Result<Option<ClusterNamespace>> {
        self.store.get_json(&namespace_key(id)).await
    }

    /// Every record carrying `name`. More than one is a data anomaly.
    pub async fn namespaces_named(&self, name: &str) -> anyhow::Result<Vec<ClusterNamespace>> {
        Ok(self
            .list_namespaces()
            .await?
            .into_iter()
            .filter(|ns| ns.name == name)
            .collect())
    }

    /// Record mirroring the cluster namespace `(name, external_id)`, if any.
    pub async fn find_namespace(
        &self,
        name: &str,
        external_id: &str,
    ) -> anyhow::Result<Option<ClusterNamespace>> {
        Ok(self
            .list_namespaces()
            .await?
            .into_iter()
            .find(|ns| ns.name == name && ns.external_id.as_deref() == Some(external_id)))
    }

    /// Look up the record for `(name, external_id)`, creating a mirrored one if absent.
    /// Returns the record and whether it was created.
    pub async fn get_or_create_namespace(
        &self,
        name: &str,
        external_id: &str,
        visible: bool,
    ) -> anyhow::Result<(ClusterNamespace, bool)> {
        if let Some(existing) = self.find_namespace(name, external_id).await? {
            return Ok((existing, false));
        }
        let ns = ClusterNamespace::mirrored(name, external_id, visible);
        self.insert_namespace(&ns).await?;
        debug!("Created namespace record {} ({})", ns.name, ns.id);
        Ok((ns, true))
    }

    /// Administrator entry point: a namespace to be created in the cluster on the next pass.
    pub async fn create_pending_namespace(&self, name: &str) -> anyhow::Result<ClusterNamespace> {
        if name.trim().is_empty() {
            bail!("namespace name must not be empty");
        }
        let ns = ClusterNamespace::pending(name);
        self.insert_namespace(&ns).await?;
        info!("Created pending namespace record '{}'", ns.name);
        Ok(ns)
    }

    /// Write a namespace record as-is.
    pub async fn insert_namespace(&self, ns: &ClusterNamespace) -> anyhow::Result<()> {
        self.store.put_json(&namespace_key(&ns.id), ns).await
    }

    async fn update_namespace<F>(&self, id: &str, mutate: F) -> anyhow::Result<ClusterNamespace>
    where
        F: FnOnce(&mut ClusterNamespace),
    {
        let mut ns = self
            .get_namespace(id)
            .await?
            .with_context(|| format!("namespace record {} not found", id))?;
        mutate(&mut ns);
        self.insert_namespace(&ns).await?;
        Ok(ns)
    }

    pub async fn rename_namespace(&self, id: &str, name: &str) -> anyhow::Result<ClusterNamespace> {
        self.update_namespace(id, |ns| ns.name = name.to_string())
            .await
    }

    pub async fn set_namespace_external_id(
        &self,
        id: &str,
        external_id: &str,
    ) -> anyhow::Result<ClusterNamespace> {
        self.update_namespace(id, |ns| ns.external_id = Some(external_id.to_string()))
            .await
    }

    pub async fn set_namespace_visible(
        &self,
        id: &str,
        visible: bool,
    ) -> anyhow::Result<ClusterNamespace> {
        self.update_namespace(id, |ns| ns.visible = visible).await
    }

    /// Delete a namespace record together with all of its service account records.
    /// Returns the number of service account records removed.
    pub async fn delete_namespace(&self, id: &str) -> anyhow::Result<usize> {
        let removed = self.store.delete_prefix(&service_accounts_prefix(id)).await?;
        self.store.delete(&namespace_key(id)).await?;
        debug!(
            "Deleted namespace record {} and {} service account record(s)",
            id, removed
        );
        Ok(removed)
    }

    // ============================================================
    // Service accounts
    // ============================================================

    /// All service account records, oldest first.
    pub async fn list_service_accounts(&self) -> anyhow::Result<Vec<ClusterServiceAccount>> {
        let mut accounts: Vec<ClusterServiceAccount> =
            self.store.list_json(SERVICE_ACCOUNT_PREFIX).await?;
        sort_by_creation(&mut accounts, |sa| (sa.created_at, sa.id.clone()));
        Ok(accounts)
    }

    pub async fn service_accounts_of(
        &self,
        namespace_id: &str,
    ) -> anyhow::Result<Vec<ClusterServiceAccount>> {
        let mut accounts: Vec<ClusterServiceAccount> = self
            .store
            .list_json(&service_accounts_prefix(namespace_id))
            .await?;
        sort_by_creation(&mut accounts, |sa| (sa.created_at, sa.id.clone()));
        Ok(accounts)
    }

    /// Look up the record for `(name, external_id)` below `namespace_id`,
    /// creating a mirrored one if absent. Returns the record and whether it was created.
    pub async fn get_or_create_service_account(
        &self,
        namespace_id: &str,
        name: &str,
        external_id: &str,
    ) -> anyhow::Result<(ClusterServiceAccount, bool)> {
        let existing = self
            .service_accounts_of(namespace_id)
            .await?
            .into_iter()
            .find(|sa| sa.name == name && sa.external_id.as_deref() == Some(external_id));
        if let Some(sa) = existing {
            return Ok((sa, false));
        }
        let sa = ClusterServiceAccount::mirrored(namespace_id, name, external_id);
        self.insert_service_account(&sa).await?;
        Ok((sa, true))
    }

    /// Administrator entry point: a service account to be created in the cluster.
    /// The name must already be a legal DNS label.
    pub async fn create_pending_service_account(
        &self,
        namespace_id: &str,
        name: &str,
    ) -> anyhow::Result<ClusterServiceAccount> {
        validate_name(name)?;
        let ns = self
            .get_namespace(namespace_id)
            .await?
            .with_context(|| format!("namespace record {} not found", namespace_id))?;
        let sa = ClusterServiceAccount::pending(&ns.id, name);
        self.insert_service_account(&sa).await?;
        info!("Created pending service account record '{}:{}'", ns.name, sa.name);
        Ok(sa)
    }

    pub async fn insert_service_account(&self, sa: &ClusterServiceAccount) -> anyhow::Result<()> {
        self.store
            .put_json(&service_account_key(&sa.namespace_id, &sa.id), sa)
            .await
    }

    pub async fn set_service_account_external_id(
        &self,
        sa: &ClusterServiceAccount,
        external_id: &str,
    ) -> anyhow::Result<ClusterServiceAccount> {
        let updated = ClusterServiceAccount {
            external_id: Some(external_id.to_string()),
            ..sa.clone()
        };
        self.insert_service_account(&updated).await?;
        Ok(updated)
    }

    pub async fn delete_service_account(&self, sa: &ClusterServiceAccount) -> anyhow::Result<()> {
        self.store
            .delete(&service_account_key(&sa.namespace_id, &sa.id))
            .await
    }
}
