use serde::{Deserialize, Serialize};

use crate::notice::{Notice, Severity};

/// Counters of one reconciler over one pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    /// Cluster objects that already had a local record.
    pub pulled: usize,
    /// Cluster objects that got a new local record.
    pub discovered: usize,
    /// Confirmed local records still present in the cluster.
    pub confirmed: usize,
    /// Pending local records created in the cluster.
    pub created: usize,
    /// Stale local records removed.
    pub removed: usize,
    /// Items that failed and were skipped.
    pub failed: usize,
}

impl ReconcileSummary {
    /// Coarse "everything in sync" signal: every confirmed record was
    /// already known when the cluster was listed.
    pub fn in_sync(&self) -> bool {
        self.pulled == self.confirmed
    }
}

/// Counters of one role binding enforcement run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementSummary {
    /// Visible namespaces checked.
    pub namespaces: usize,
    pub created: usize,
    pub failed: usize,
}

/// Result of one sync pass, as reported to whoever triggered it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub notices: Vec<Notice>,
    #[serde(default)]
    pub namespaces: ReconcileSummary,
    #[serde(default)]
    pub service_accounts: ReconcileSummary,
    #[serde(default)]
    pub role_bindings: EnforcementSummary,
}

impl SyncOutcome {
    pub fn notices_with(&self, severity: Severity) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(move |n| n.severity == severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_sync_compares_known_and_confirmed() {
        let mut summary = ReconcileSummary {
            pulled: 3,
            confirmed: 3,
            ..Default::default()
        };
        assert!(summary.in_sync());
        summary.discovered = 1;
        summary.confirmed = 4;
        assert!(!summary.in_sync());
    }

    #[test]
    fn outcome_without_summaries_decodes() {
        let outcome: SyncOutcome = serde_json::from_str(
            r#"{"success":false,"notices":[{"severity":"warning","message":"busy"}]}"#,
        )
        .unwrap();
        assert_eq!(outcome.notices_with(Severity::Warning).count(), 1);
        assert_eq!(outcome.namespaces, ReconcileSummary::default());
    }
}
