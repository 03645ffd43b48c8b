//! Filesystem path constants.

/// Default config file path for the server.
pub const DEFAULT_SERVER_CONFIG: &str = "/etc/kportal/config.yaml";

/// Default data directory for the portal state store.
pub const DEFAULT_SERVER_DATA_DIR: &str = "/tmp/kportal-data";
