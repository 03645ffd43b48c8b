pub mod client;
pub mod lease;
pub mod registry;
