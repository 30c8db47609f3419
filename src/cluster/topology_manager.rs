//! Shared cluster topology with on-demand refresh
//!
//! The current topology is an immutable snapshot behind an `Arc`.
//! Readers clone the `Arc` and release the lock before any I/O; a
//! refresh builds a new snapshot off-lock and swaps it in.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::topology::ClusterTopology;
use crate::client::NodePool;
use crate::config::ServerAddress;
use crate::utils::{ClientError, ClusterError, ConnectionError, Result};

/// Redirect information parsed from MOVED/ASK error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectInfo {
    pub slot: u16,
    pub target: ServerAddress,
    /// Whether this is an ASK redirect (requires ASKING prefix)
    pub is_ask: bool,
}

impl RedirectInfo {
    /// Parse from error message like "MOVED 3999 127.0.0.1:7001" or "ASK 3999 127.0.0.1:7001"
    pub fn parse(error_msg: &str) -> Option<Self> {
        let mut parts = error_msg.split_whitespace();
        let is_ask = match parts.next()? {
            "MOVED" => false,
            "ASK" => true,
            _ => return None,
        };

        let slot: u16 = parts.next()?.parse().ok()?;
        let (host, port) = parts.next()?.rsplit_once(':')?;
        let port: u16 = port.parse().ok()?;
        // IPv6 endpoints may arrive bracketed
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return None;
        }

        Some(Self {
            slot,
            target: ServerAddress::new(host, port),
            is_ask,
        })
    }
}

/// Shared topology manager for cluster mode
pub struct TopologyManager {
    /// Current cluster topology
    topology: RwLock<Arc<ClusterTopology>>,

    /// Whether a refresh is currently in progress (prevents concurrent refreshes)
    is_refreshing: AtomicBool,

    /// Bumped on every successful refresh
    version: AtomicU64,

    /// Seed addresses for topology discovery
    seed_addresses: Vec<ServerAddress>,
}

impl TopologyManager {
    pub fn new(initial_topology: ClusterTopology, seed_addresses: Vec<ServerAddress>) -> Self {
        Self {
            topology: RwLock::new(Arc::new(initial_topology)),
            is_refreshing: AtomicBool::new(false),
            version: AtomicU64::new(1),
            seed_addresses,
        }
    }

    /// Discover the topology from the first seed that answers
    ///
    /// Authentication and TLS failures are returned at once; other
    /// failures move on to the next seed.
    pub fn discover(pool: &NodePool, seeds: &[ServerAddress]) -> Result<ClusterTopology> {
        let mut failures = Vec::new();

        for seed in seeds {
            match Self::fetch_topology_from_node(pool, seed) {
                Ok(topology) => return Ok(topology),
                Err(e @ ClientError::Connection(ConnectionError::AuthFailed(_)))
                | Err(e @ ClientError::Connection(ConnectionError::TlsFailed(_)))
                | Err(e @ ClientError::Closed) => return Err(e),
                Err(e) => {
                    warn!("Topology discovery via {} failed: {}", seed, e);
                    failures.push(format!("{}: {}", seed, e));
                }
            }
        }

        Err(ConnectionError::Unreachable(failures.join("; ")).into())
    }

    /// Fetch topology from a specific node
    fn fetch_topology_from_node(pool: &NodePool, address: &ServerAddress) -> Result<ClusterTopology> {
        match pool.cluster_nodes(address)? {
            Some(response) => Ok(ClusterTopology::from_cluster_nodes(&response, &address.host)?),
            None => {
                info!("{} has cluster support disabled, using it as the only node", address);
                Ok(ClusterTopology::single_node(address))
            }
        }
    }

    /// Current topology version
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<ClusterTopology> {
        Arc::clone(&self.topology.read())
    }

    /// Address owning `slot` in the current snapshot
    pub fn address_for_slot(&self, slot: u16) -> std::result::Result<ServerAddress, ClusterError> {
        self.snapshot().address_for_slot(slot)
    }

    /// Refresh cluster topology
    ///
    /// Called when MOVED errors are encountered. Only one caller performs
    /// the refresh; returns false if another refresh is in progress or no
    /// node answered.
    pub fn refresh_topology(&self, pool: &NodePool) -> bool {
        if self
            .is_refreshing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Topology refresh already in progress");
            return false;
        }

        warn!("Cluster topology changed, refreshing slot configuration...");
        let result = self.do_refresh(pool);
        self.is_refreshing.store(false, Ordering::SeqCst);
        result
    }

    fn do_refresh(&self, pool: &NodePool) -> bool {
        // Seeds first, then known primaries that are not seeds
        let mut candidates = self.seed_addresses.clone();
        candidates.extend(
            self.snapshot()
                .primaries()
                .filter(|n| n.is_available())
                .map(|n| n.address())
                .filter(|a| !self.seed_addresses.contains(a)),
        );

        for address in &candidates {
            match Self::fetch_topology_from_node(pool, address) {
                Ok(new_topology) => {
                    info!(
                        "Cluster topology refreshed: {} primaries, {} total nodes",
                        new_topology.num_primaries(),
                        new_topology.num_nodes()
                    );
                    *self.topology.write() = Arc::new(new_topology);
                    self.version.fetch_add(1, Ordering::SeqCst);
                    return true;
                }
                Err(ClientError::Closed) => return false,
                Err(e) => {
                    warn!("Failed to fetch topology from {}: {}", address, e);
                }
            }
        }

        warn!("Failed to refresh cluster topology from any node");
        false
    }

    /// Check if CLUSTERDOWN error
    pub fn is_cluster_down(error_msg: &str) -> bool {
        error_msg.starts_with("CLUSTERDOWN")
    }
}
