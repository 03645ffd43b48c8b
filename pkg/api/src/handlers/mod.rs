pub mod health;
pub mod namespaces;
pub mod service_accounts;
pub mod sync;
