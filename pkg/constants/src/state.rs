//! State store / sync lease constants.

/// Key prefix for mirrored namespace records.
pub const NAMESPACE_PREFIX: &str = "/registry/portal/namespaces/";

/// Key prefix for mirrored service account records.
/// Full key = `SERVICE_ACCOUNT_PREFIX + namespace_id + "/" + id`.
pub const SERVICE_ACCOUNT_PREFIX: &str = "/registry/portal/serviceaccounts/";

/// etcd-style key for the single-flight sync pass lease.
pub const SYNC_LEASE_KEY: &str = "/registry/leases/sync-pass";

/// How long a sync lease is valid when its holder never releases it, in seconds.
pub const SYNC_LEASE_TTL_SECS: u64 = 300;
