use pkg_cluster::GatewayError;
use pkg_types::names::NameConflict;
use thiserror::Error;

/// Errors raised while reconciling.
///
/// `Transport` and `Store` coming out of a list call end the pass. Everything
/// raised while handling a single item is caught at the item boundary and
/// turned into a notice.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0}")]
    Transport(#[from] GatewayError),
    #[error("local store failure: {0:#}")]
    Store(anyhow::Error),
    #[error(transparent)]
    NameConflict(#[from] NameConflict),
    #[error("malformed cluster record: {0}")]
    Malformed(String),
    #[error("namespace '{namespace}' of service account '{account}' does not exist in Kubernetes yet")]
    PendingNamespace { namespace: String, account: String },
    #[error("{0:#}")]
    Item(anyhow::Error),
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Store(err)
    }
}

impl SyncError {
    /// Whether this error came from the cluster rather than the local side.
    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let err = SyncError::from(GatewayError::Unreachable("connection refused".to_string()));
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "cluster API unreachable: connection refused");

        let err = SyncError::PendingNamespace {
            namespace: "teamx".to_string(),
            account: "bot".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "namespace 'teamx' of service account 'bot' does not exist in Kubernetes yet"
        );
    }
}
