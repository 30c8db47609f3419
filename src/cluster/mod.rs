//! Cluster topology and slot routing
//!
//! - Topology discovery via CLUSTER NODES
//! - Slot mapping and CRC16 calculation
//! - Topology refresh on MOVED, ASK redirect parsing

pub mod node;
pub mod topology;
pub mod topology_manager;

pub use node::ClusterNode;
pub use topology::{ClusterTopology, SLOT_COUNT};
pub use topology_manager::{RedirectInfo, TopologyManager};
