pub mod error;
pub mod namespace;
pub mod notices;
pub mod rolebinding;
pub mod service_account;
pub mod sync;

#[cfg(test)]
mod testing;
