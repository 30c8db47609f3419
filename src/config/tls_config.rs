//! TLS configuration

use std::net::IpAddr;
use std::path::PathBuf;

/// TLS settings applied when the connection config enables TLS
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    pub skip_verify: bool,
    pub ca_cert: Option<PathBuf>,
    pub sni: Option<String>,
}

impl TlsConfig {
    /// Name verified against the certificate when dialling `host`
    ///
    /// Nodes learned from CLUSTER NODES are addressed by IP, while managed
    /// clusters only certify DNS names, so an IP host verifies against
    /// `endpoint_host` unless an explicit SNI name is configured.
    pub fn server_name<'a>(&'a self, host: &'a str, endpoint_host: &'a str) -> &'a str {
        if let Some(sni) = self.sni.as_deref() {
            return sni;
        }
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if bare.parse::<IpAddr>().is_ok() {
            endpoint_host
        } else {
            host
        }
    }
}
