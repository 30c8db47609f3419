//! Cluster node representation

use crate::config::ServerAddress;

/// Cluster node information
#[derive(Debug, Clone)]
pub struct ClusterNode {
    /// Node ID from CLUSTER NODES
    pub id: String,
    /// Hostname or IP (empty when the node does not know its own address)
    pub host: String,
    pub port: u16,
    pub is_primary: bool,
    pub is_replica: bool,
    /// Primary node ID (if replica)
    pub primary_id: Option<String>,
    /// Owned slot ranges, inclusive (primaries only)
    pub slot_ranges: Vec<(u16, u16)>,
    /// Node flags (myself, fail, handshake, ...)
    pub flags: Vec<String>,
    /// Link state reported as connected
    pub available: bool,
}

impl ClusterNode {
    /// Check if node is available
    pub fn is_available(&self) -> bool {
        self.available
            && !self
                .flags
                .iter()
                .any(|f| f == "fail" || f == "handshake" || f == "noaddr")
    }

    pub fn address(&self) -> ServerAddress {
        ServerAddress::new(self.host.clone(), self.port)
    }
}

/// Parse a line from CLUSTER NODES response
///
/// Format: `<id> <ip:port@cport[,hostname]> <flags> <master> <ping-sent> <pong-recv> <config-epoch> <link-state> <slot> ...`
pub fn parse_cluster_node_line(line: &str) -> Option<ClusterNode> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 8 {
        return None;
    }

    let id = parts[0].to_string();
    let (host, port) = parse_node_address(parts[1])?;

    let flags: Vec<String> = parts[2].split(',').map(String::from).collect();
    let is_primary = flags.iter().any(|f| f == "master");
    let is_replica = flags.iter().any(|f| f == "slave" || f == "replica");

    let primary_id = if is_replica && parts[3] != "-" {
        Some(parts[3].to_string())
    } else {
        None
    };

    let available = parts[7] == "connected";

    let slot_ranges = if is_primary {
        parts[8..]
            .iter()
            .filter_map(|s| parse_slot_range(s))
            .collect()
    } else {
        Vec::new()
    };

    Some(ClusterNode {
        id,
        host,
        port,
        is_primary,
        is_replica,
        primary_id,
        slot_ranges,
        flags,
        available,
    })
}

/// Parse node address from CLUSTER NODES
/// Formats: "host:port@cport", "host:port", "host:port@cport,hostname"
fn parse_node_address(addr: &str) -> Option<(String, u16)> {
    // ElastiCache/MemoryDB append ",hostname"
    let addr = addr.split(',').next().unwrap_or(addr);
    let host_port = addr.split('@').next().unwrap_or(addr);

    let (host, port) = host_port.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;

    Some((host.to_string(), port))
}

/// Parse slot range: "0-5460" or "0"
fn parse_slot_range(s: &str) -> Option<(u16, u16)> {
    // Skip migrating/importing markers like "[123->-node_id]"
    if s.contains('[') {
        return None;
    }

    if let Some((start, end)) = s.split_once('-') {
        let start: u16 = start.parse().ok()?;
        let end: u16 = end.parse().ok()?;
        (start <= end).then_some((start, end))
    } else {
        let slot: u16 = s.parse().ok()?;
        Some((slot, slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primary_node() {
        let line = "07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:30001@31001 myself,master - 0 1426238316232 1 connected 0-5460 5500";
        let node = parse_cluster_node_line(line).unwrap();

        assert_eq!(node.host, "127.0.0.1");
        assert_eq!(node.port, 30001);
        assert!(node.is_primary);
        assert!(!node.is_replica);
        assert!(node.is_available());
        assert_eq!(node.slot_ranges, vec![(0, 5460), (5500, 5500)]);
    }

    #[test]
    fn test_parse_replica_node() {
        let line = "292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 127.0.0.1:30004@31004 slave e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 0 1426238317239 4 connected";
        let node = parse_cluster_node_line(line).unwrap();

        assert!(node.is_replica);
        assert!(!node.is_primary);
        assert_eq!(
            node.primary_id.as_deref(),
            Some("e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca")
        );
        assert!(node.slot_ranges.is_empty());
    }

    #[test]
    fn test_failed_node_unavailable() {
        let line = "67ed2db8d677e59ec4a4cefb06858cf2a1a89fa1 127.0.0.1:30003@31003 master,fail - 0 1426238316232 3 disconnected 10923-16383";
        let node = parse_cluster_node_line(line).unwrap();
        assert!(!node.is_available());
    }

    #[test]
    fn test_parse_memorydb_address() {
        let (host, port) = parse_node_address("10.0.0.1:6379@16379,node-0001.example.com").unwrap();
        assert_eq!(host, "10.0.0.1");
        assert_eq!(port, 6379);
    }

    #[test]
    fn test_parse_unknown_own_address() {
        let (host, port) = parse_node_address(":7000@17000").unwrap();
        assert_eq!(host, "");
        assert_eq!(port, 7000);
    }

    #[test]
    fn test_parse_slot_range() {
        assert_eq!(parse_slot_range("0-5460"), Some((0, 5460)));
        assert_eq!(parse_slot_range("5461"), Some((5461, 5461)));
        assert_eq!(parse_slot_range("[123->-abc]"), None);
        assert_eq!(parse_slot_range("9-3"), None);
    }

    #[test]
    fn test_short_line_rejected() {
        assert!(parse_cluster_node_line("abc 127.0.0.1:1 master").is_none());
    }
}
