pub mod config;
pub mod names;
pub mod namespace;
pub mod notice;
pub mod rbac;
pub mod service_account;
pub mod sync;
