//! Cluster-legal resource names.
//!
//! Namespace names entered by administrators are free-form display strings.
//! Before a namespace can be created in the cluster its name is reduced to a
//! DNS label by [`sanitize`]. Service account names are expected to be legal
//! already and are checked with [`validate_name`] on entry.

use std::collections::HashSet;
use thiserror::Error;

/// Maximum length of a DNS label.
pub const MAX_NAME_LEN: usize = 63;

/// Sanitized name collides with an existing record; a human must rename.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sanitized name '{sanitized}' for '{raw}' already exists")]
pub struct NameConflict {
    pub raw: String,
    pub sanitized: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidName {
    #[error("name must not be empty")]
    Empty,
    #[error("name '{0}' exceeds {MAX_NAME_LEN} characters")]
    TooLong(String),
    #[error("name '{0}' must not start or end with a hyphen")]
    EdgeHyphen(String),
    #[error("name '{0}' must contain only lowercase letters, digits, and hyphens [a-z0-9-]")]
    IllegalChars(String),
}

/// Strip everything outside `[a-zA-Z0-9]` and lower-case the rest.
///
/// Total: an input without any alphanumeric character yields `""`.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// [`sanitize`], failing when the result is already taken by one of `existing`.
pub fn sanitize_or_reject(raw: &str, existing: &HashSet<String>) -> Result<String, NameConflict> {
    let sanitized = sanitize(raw);
    if existing.contains(&sanitized) {
        return Err(NameConflict {
            raw: raw.to_string(),
            sanitized,
        });
    }
    Ok(sanitized)
}

/// Validate a Kubernetes-style resource name.
/// Rules: lowercase `[a-z0-9-]`, max 63 chars, no leading/trailing hyphens.
pub fn validate_name(name: &str) -> Result<(), InvalidName> {
    if name.is_empty() {
        return Err(InvalidName::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(InvalidName::TooLong(name.to_string()));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(InvalidName::EdgeHyphen(name.to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(InvalidName::IllegalChars(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sanitize_strips_and_lowercases() {
        assert_eq!(sanitize("foo_bar"), "foobar");
        assert_eq!(sanitize("ABC"), "abc");
        assert_eq!(sanitize("Team X-42"), "teamx42");
        assert_eq!(sanitize("teamx"), "teamx");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let once = sanitize("My_Fancy Namespace!");
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn sanitize_degenerate_input() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("__--!!"), "");
        assert_eq!(sanitize("ünïcode"), "ncode");
    }

    #[test]
    fn reject_on_collision() {
        let existing = names(&["foobar", "other"]);
        let err = sanitize_or_reject("foo-bar", &existing).unwrap_err();
        assert_eq!(err.sanitized, "foobar");
        assert_eq!(err.raw, "foo-bar");
        assert_eq!(sanitize_or_reject("Foo_Baz", &existing).unwrap(), "foobaz");
    }

    #[test]
    fn collision_is_case_sensitive() {
        let existing = names(&["FooBar"]);
        assert_eq!(sanitize_or_reject("foo_bar", &existing).unwrap(), "foobar");
    }

    #[test]
    fn valid_names() {
        assert!(validate_name("default").is_ok());
        assert!(validate_name("build-bot").is_ok());
        assert!(validate_name("sa-123").is_ok());
        assert!(validate_name("a").is_ok());
    }

    #[test]
    fn invalid_names() {
        assert_eq!(validate_name(""), Err(InvalidName::Empty));
        assert!(matches!(validate_name("Build-Bot"), Err(InvalidName::IllegalChars(_))));
        assert!(matches!(validate_name("build_bot"), Err(InvalidName::IllegalChars(_))));
        assert!(matches!(validate_name("-bot"), Err(InvalidName::EdgeHyphen(_))));
        assert!(matches!(validate_name("bot-"), Err(InvalidName::EdgeHyphen(_))));
        assert!(matches!(validate_name(&"a".repeat(64)), Err(InvalidName::TooLong(_))));
    }
}
