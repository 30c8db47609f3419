//! Client connection layer

pub mod cluster_client;
pub mod node_connection;
pub mod pool;
pub mod raw_connection;

pub use cluster_client::{Ack, ClusterClient, JsonLookup};
pub use node_connection::{Connector, Handshake, NodeConnection, NodeConnectionExt};
pub use pool::NodePool;
pub use raw_connection::{ConnectionFactory, RawConnection};
