//! Network-related constants.

/// Default port for the kportal API server.
pub const DEFAULT_API_PORT: u16 = 8086;

/// Default API server address (HTTP).
pub const DEFAULT_API_ADDR: &str = "http://127.0.0.1:8086";
