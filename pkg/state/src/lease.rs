use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::client::StateStore;

use pkg_constants::state::{SYNC_LEASE_KEY, SYNC_LEASE_TTL_SECS};

/// A lease held in the state store by whoever runs the current sync pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub id: String,
    pub holder_id: String,
    pub acquired_at: chrono::DateTime<Utc>,
    pub renew_at: chrono::DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl Lease {
    /// A TTL too large to represent never expires.
    pub fn is_expired(&self) -> bool {
        let expiry = i64::try_from(self.ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|ttl| self.renew_at.checked_add_signed(ttl));
        match expiry {
            Some(expiry) => Utc::now() > expiry,
            None => false,
        }
    }
}

/// Single-flight lease for sync passes.
///
/// Servers sharing one state store take this lease before reconciling and
/// drop it afterwards, so at most one pass touches the store at a time.
/// The TTL only matters when a holder dies mid-pass.
pub struct SyncLease {
    store: StateStore,
    holder_id: String,
    ttl: Duration,
}

impl SyncLease {
    pub fn new(store: StateStore, holder_id: String) -> Self {
        Self {
            store,
            holder_id,
            ttl: Duration::from_secs(SYNC_LEASE_TTL_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    fn fresh_lease(&self) -> Lease {
        let now = Utc::now();
        Lease {
            id: "sync-pass".to_string(),
            holder_id: self.holder_id.clone(),
            acquired_at: now,
            renew_at: now,
            ttl_seconds: self.ttl.as_secs(),
        }
    }

    /// Try to take the lease. Returns true if this holder now owns it.
    pub async fn try_acquire(&self) -> anyhow::Result<bool> {
        match self.store.get_json::<Lease>(SYNC_LEASE_KEY).await? {
            Some(lease) if lease.holder_id == self.holder_id => {
                // Ours from an earlier pass that never released it
                let renewed = Lease {
                    renew_at: Utc::now(),
                    ..lease
                };
                self.store.put_json(SYNC_LEASE_KEY, &renewed).await?;
                Ok(true)
            }
            Some(lease) if lease.is_expired() => {
                warn!(
                    "Sync lease held by {} expired, taking over for {}",
                    lease.holder_id, self.holder_id
                );
                self.store.put_json(SYNC_LEASE_KEY, &self.fresh_lease()).await?;
                Ok(true)
            }
            Some(lease) => {
                info!(
                    "Sync lease held by {} since {}",
                    lease.holder_id, lease.acquired_at
                );
                Ok(false)
            }
            None => {
                self.store.put_json(SYNC_LEASE_KEY, &self.fresh_lease()).await?;
                Ok(true)
            }
        }
    }

    /// Drop the lease if this holder owns it.
    pub async fn release(&self) -> anyhow::Result<()> {
        if let Some(lease) = self.store.get_json::<Lease>(SYNC_LEASE_KEY).await?
            && lease.holder_id == self.holder_id
        {
            self.store.delete(SYNC_LEASE_KEY).await?;
        }
        Ok(())
    }

    /// The lease currently stored, whoever holds it.
    pub async fn current(&self) -> anyhow::Result<Option<Lease>> {
        self.store.get_json(SYNC_LEASE_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_holder_is_refused_until_release() {
        let store = StateStore::in_memory().await.unwrap();
        let a = SyncLease::new(store.clone(), "server-a".to_string());
        let b = SyncLease::new(store.clone(), "server-b".to_string());

        assert!(a.try_acquire().await.unwrap());
        assert!(!b.try_acquire().await.unwrap());

        // Releasing someone else's lease is a no-op
        b.release().await.unwrap();
        assert_eq!(a.current().await.unwrap().unwrap().holder_id, "server-a");

        a.release().await.unwrap();
        assert!(b.try_acquire().await.unwrap());
    }

    #[tokio::test]
    async fn holder_may_reacquire() {
        let store = StateStore::in_memory().await.unwrap();
        let a = SyncLease::new(store, "server-a".to_string());
        assert!(a.try_acquire().await.unwrap());
        assert!(a.try_acquire().await.unwrap());
    }

    #[tokio::test]
    async fn expired_lease_is_taken_over() {
        let store = StateStore::in_memory().await.unwrap();
        let past = Utc::now() - chrono::Duration::seconds(600);
        let stale = Lease {
            id: "sync-pass".to_string(),
            holder_id: "dead-server".to_string(),
            acquired_at: past,
            renew_at: past,
            ttl_seconds: 60,
        };
        assert!(stale.is_expired());
        store.put_json(SYNC_LEASE_KEY, &stale).await.unwrap();

        let b = SyncLease::new(store, "server-b".to_string());
        assert!(b.try_acquire().await.unwrap());
        assert_eq!(b.current().await.unwrap().unwrap().holder_id, "server-b");
    }

    #[tokio::test]
    async fn huge_ttl_never_expires() {
        let store = StateStore::in_memory().await.unwrap();
        let now = Utc::now();
        let held = Lease {
            id: "sync-pass".to_string(),
            holder_id: "server-a".to_string(),
            acquired_at: now,
            renew_at: now,
            ttl_seconds: 100_000_000_000_000_000,
        };
        assert!(!held.is_expired());
        assert!(!Lease { ttl_seconds: u64::MAX, ..held.clone() }.is_expired());
        store.put_json(SYNC_LEASE_KEY, &held).await.unwrap();

        let b = SyncLease::new(store, "server-b".to_string());
        assert!(!b.try_acquire().await.unwrap());
    }
}
