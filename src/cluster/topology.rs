//! Cluster topology snapshot and slot hashing

use super::node::{parse_cluster_node_line, ClusterNode};
use crate::config::ServerAddress;
use crate::utils::ClusterError;

/// Number of hash slots in a Redis-compatible cluster
pub const SLOT_COUNT: usize = 16384;

/// Immutable slot → node snapshot
#[derive(Debug, Clone)]
pub struct ClusterTopology {
    /// All nodes in the cluster
    pub nodes: Vec<ClusterNode>,
    /// Slot to node index mapping
    slot_map: Box<[Option<usize>]>,
    /// Primary node indices
    primary_indices: Vec<usize>,
}

impl ClusterTopology {
    /// Parse CLUSTER NODES response
    ///
    /// `queried_host` replaces an empty host, which a node reports for
    /// itself when it does not know its own address.
    pub fn from_cluster_nodes(response: &str, queried_host: &str) -> Result<Self, ClusterError> {
        let mut nodes = Vec::new();
        let mut slot_map = vec![None; SLOT_COUNT].into_boxed_slice();
        let mut primary_indices = Vec::new();

        for line in response.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut node = parse_cluster_node_line(line)
                .ok_or_else(|| ClusterError::ParseFailed(line.to_string()))?;
            if node.host.is_empty() {
                node.host = queried_host.to_string();
            }

            let idx = nodes.len();
            if node.is_primary {
                primary_indices.push(idx);
                for &(start, end) in &node.slot_ranges {
                    for slot in start..=end {
                        if let Some(entry) = slot_map.get_mut(slot as usize) {
                            *entry = Some(idx);
                        }
                    }
                }
            }
            nodes.push(node);
        }

        if primary_indices.is_empty() {
            return Err(ClusterError::NoPrimaries);
        }

        Ok(Self {
            nodes,
            slot_map,
            primary_indices,
        })
    }

    /// Topology for a server running without cluster support: one node owns every slot
    pub fn single_node(address: &ServerAddress) -> Self {
        let node = ClusterNode {
            id: "standalone".to_string(),
            host: address.host.clone(),
            port: address.port,
            is_primary: true,
            is_replica: false,
            primary_id: None,
            slot_ranges: vec![(0, (SLOT_COUNT - 1) as u16)],
            flags: vec!["master".to_string()],
            available: true,
        };
        Self {
            nodes: vec![node],
            slot_map: vec![Some(0); SLOT_COUNT].into_boxed_slice(),
            primary_indices: vec![0],
        }
    }

    /// Get node for slot
    pub fn get_node_for_slot(&self, slot: u16) -> Option<&ClusterNode> {
        self.slot_map
            .get(slot as usize)
            .copied()
            .flatten()
            .map(|idx| &self.nodes[idx])
    }

    /// Address owning `slot`
    pub fn address_for_slot(&self, slot: u16) -> Result<ServerAddress, ClusterError> {
        self.get_node_for_slot(slot)
            .map(ClusterNode::address)
            .ok_or(ClusterError::UnassignedSlot(slot))
    }

    /// Get all primary nodes
    pub fn primaries(&self) -> impl Iterator<Item = &ClusterNode> {
        self.primary_indices.iter().map(|&idx| &self.nodes[idx])
    }

    /// Get number of primary nodes
    pub fn num_primaries(&self) -> usize {
        self.primary_indices.len()
    }

    /// Get total number of nodes
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Calculate slot for key using CRC16
    pub fn slot_for_key(key: &[u8]) -> u16 {
        // Hash tag: only the part inside the first non-empty {...}
        if let Some(start) = key.iter().position(|&b| b == b'{') {
            if let Some(end) = key[start + 1..].iter().position(|&b| b == b'}') {
                if end > 0 {
                    return crc16(&key[start + 1..start + 1 + end]) % SLOT_COUNT as u16;
                }
            }
        }
        crc16(key) % SLOT_COUNT as u16
    }
}

/// CRC16 implementation for Redis cluster slot calculation (XMODEM)
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
