use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Success => write!(f, "success"),
        }
    }
}

/// A human-readable message surfaced to whoever triggered a sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// The item a failure notice is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeContext {
    None,
    /// A single resource, e.g. a namespace name.
    Single(String),
    /// A namespaced pair, e.g. namespace and service account.
    Pair(String, String),
}

impl NoticeContext {
    pub fn single(value: impl Into<String>) -> Self {
        NoticeContext::Single(value.into())
    }

    pub fn pair(first: impl Into<String>, second: impl Into<String>) -> Self {
        NoticeContext::Pair(first.into(), second.into())
    }
}

impl fmt::Display for NoticeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoticeContext::None => Ok(()),
            NoticeContext::Single(value) => write!(f, " '{}'", value),
            NoticeContext::Pair(first, second) => write!(f, " '{}:{}'", first, second),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_rendering() {
        assert_eq!(
            format!("Sync of namespace{} failed", NoticeContext::None),
            "Sync of namespace failed"
        );
        assert_eq!(
            format!("Sync of namespace{} failed", NoticeContext::single("teamx")),
            "Sync of namespace 'teamx' failed"
        );
        assert_eq!(
            format!(
                "Sync of service account{} failed",
                NoticeContext::pair("teamx", "default")
            ),
            "Sync of service account 'teamx:default' failed"
        );
    }

    #[test]
    fn severity_serializes_lowercase() {
        let notice = Notice::new(Severity::Warning, "careful");
        let json = serde_json::to_string(&notice).unwrap();
        assert_eq!(json, r#"{"severity":"warning","message":"careful"}"#);
    }
}
