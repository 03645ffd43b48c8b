//! Access to the cluster control plane.
//!
//! The reconciler only talks to the cluster through [`ClusterGateway`].
//! [`KubeGateway`] is the production transport; [`MemoryCluster`] is an
//! in-process cluster used by tests and local development.

pub mod error;
pub mod gateway;
pub mod kubernetes;
pub mod memory;

pub use error::GatewayError;
pub use gateway::ClusterGateway;
pub use kubernetes::KubeGateway;
pub use memory::MemoryCluster;
