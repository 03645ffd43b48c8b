use pkg_types::notice::{Notice, NoticeContext, Severity};
use std::fmt::Display;
use tracing::{error, info, warn};

/// Notices collected over one sync pass.
///
/// Every notice is logged at the matching level when it is recorded, so a
/// scheduled pass that nobody reads still leaves a trail in the logs.
#[derive(Debug, Default)]
pub struct Notices {
    items: Vec<Notice>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message.into());
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Severity::Success, message.into());
    }

    /// Record a failed item: "<action> '<context>' failed: <err>."
    pub fn item_failed(&mut self, action: &str, context: &NoticeContext, err: &impl Display) {
        self.error(format!("{}{} failed: {}.", action, context, err));
    }

    fn push(&mut self, severity: Severity, message: String) {
        match severity {
            Severity::Info | Severity::Success => info!("{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error => error!("{}", message),
        }
        self.items.push(Notice::new(severity, message));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Notice> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_failures_carry_context() {
        let mut notices = Notices::new();
        notices.item_failed(
            "Sync to Kubernetes for service account",
            &NoticeContext::pair("teamx", "bot"),
            &"forbidden",
        );
        notices.success("All valid namespaces are in sync.");

        let items = notices.into_vec();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].severity, Severity::Error);
        assert_eq!(
            items[0].message,
            "Sync to Kubernetes for service account 'teamx:bot' failed: forbidden."
        );
        assert_eq!(items[1].severity, Severity::Success);
    }
}
