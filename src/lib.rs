//! memorydb-records library
//!
//! Cluster-aware record client for Redis-compatible clusters (Amazon
//! MemoryDB, Valkey, Redis Cluster): raw string, JSON document and Hash
//! records routed by hash slot over pooled TCP/TLS connections.

pub mod client;
pub mod cluster;
pub mod config;
pub mod records;
pub mod utils;

pub use client::{Ack, ClusterClient, JsonLookup};
pub use config::{ConnectionConfig, PropertySource};
pub use records::{DeleteOutcome, RecordOutcome, RecordService, RecordValue};
pub use utils::{ClientError, Result};
