//! Cluster connection configuration
//!
//! Built once from a [`PropertySource`] and never mutated afterwards. All
//! fields are read through accessors.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::properties::PropertySource;
use super::tls_config::TlsConfig;
use crate::utils::ConfigError;

pub const ENDPOINT_HOSTNAME: &str = "MEMORYDB_CLUSTER_ENDPOINT_HOSTNAME";
pub const ENDPOINT_PORT: &str = "MEMORYDB_CLUSTER_ENDPOINT_PORT";
pub const ENDPOINT_USERNAME: &str = "MEMORYDB_CLUSTER_ENDPOINT_USERNAME";
pub const ENDPOINT_PASSWORD: &str = "MEMORYDB_CLUSTER_ENDPOINT_PASSWORD";
pub const CLIENT_NAME: &str = "MEMORYDB_CLIENT_NAME";
pub const CLIENT_USE_SSL: &str = "MEMORYDB_CLIENT_USE_SSL";
pub const CLIENT_TIMEOUT: &str = "MEMORYDB_CLIENT_TIMEOUT_IN_SECS";
pub const CONNECTION_TIMEOUT: &str = "MEMORYDB_CLIENT_CONNECTION_TIMEOUT_IN_SECS";
pub const BLOCKING_SOCKET_TIMEOUT: &str = "MEMORYDB_CLIENT_BLOCKING_SOCKET_TIMEOUT_IN_SECS";
pub const SOCKET_TIMEOUT: &str = "MEMORYDB_CLIENT_SOCKET_TIMEOUT_IN_SECS";
pub const MAX_ATTEMPTS: &str = "MEMORYDB_CLIENT_MAX_ATTEMPTS";

pub const TLS_SKIP_VERIFY: &str = "MEMORYDB_CLIENT_TLS_SKIP_VERIFY";
pub const TLS_CA_CERT: &str = "MEMORYDB_CLIENT_TLS_CA_CERT";
pub const TLS_SNI: &str = "MEMORYDB_CLIENT_TLS_SNI";

/// Every property key the loader reads
pub const ALL_KEYS: &[&str] = &[
    ENDPOINT_HOSTNAME,
    ENDPOINT_PORT,
    ENDPOINT_USERNAME,
    ENDPOINT_PASSWORD,
    CLIENT_NAME,
    CLIENT_USE_SSL,
    CLIENT_TIMEOUT,
    CONNECTION_TIMEOUT,
    BLOCKING_SOCKET_TIMEOUT,
    SOCKET_TIMEOUT,
    MAX_ATTEMPTS,
    TLS_SKIP_VERIFY,
    TLS_CA_CERT,
    TLS_SNI,
];

/// Resolved server address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Password that stays out of Debug output and logs
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Immutable cluster connection settings
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    endpoint: ServerAddress,
    username: String,
    password: Secret,
    client_name: String,
    use_tls: bool,
    tls: TlsConfig,
    connect_timeout: Duration,
    socket_timeout: Duration,
    blocking_socket_timeout: Duration,
    client_idle_timeout: Duration,
    max_retry_attempts: u32,
}

impl ConnectionConfig {
    /// Validate and build the configuration from `source`
    pub fn load(source: &PropertySource) -> Result<Self, ConfigError> {
        let host = required(source, ENDPOINT_HOSTNAME)?.to_string();
        let port = parse_port(source)?;
        let username = required(source, ENDPOINT_USERNAME)?.to_string();
        let password = Secret::new(required(source, ENDPOINT_PASSWORD)?);
        let client_name = required(source, CLIENT_NAME)?.to_string();
        let use_tls = parse_bool(CLIENT_USE_SSL, required(source, CLIENT_USE_SSL)?)?;

        let client_idle_timeout = parse_secs(source, CLIENT_TIMEOUT)?;
        let connect_timeout = parse_secs(source, CONNECTION_TIMEOUT)?;
        let blocking_socket_timeout = parse_secs(source, BLOCKING_SOCKET_TIMEOUT)?;
        let socket_timeout = parse_secs(source, SOCKET_TIMEOUT)?;

        let raw_attempts = required(source, MAX_ATTEMPTS)?;
        let max_retry_attempts: u32 = raw_attempts.parse().map_err(|_| ConfigError::Malformed {
            key: MAX_ATTEMPTS,
            value: raw_attempts.to_string(),
            reason: "expected a non-negative integer".to_string(),
        })?;

        let tls = TlsConfig {
            skip_verify: match source.get(TLS_SKIP_VERIFY) {
                Some(v) => parse_bool(TLS_SKIP_VERIFY, v)?,
                None => false,
            },
            ca_cert: source.get(TLS_CA_CERT).map(PathBuf::from),
            sni: source.get(TLS_SNI).map(String::from),
        };

        Ok(Self {
            endpoint: ServerAddress::new(host, port),
            username,
            password,
            client_name,
            use_tls,
            tls,
            connect_timeout,
            socket_timeout,
            blocking_socket_timeout,
            client_idle_timeout,
            max_retry_attempts,
        })
    }

    pub fn endpoint(&self) -> &ServerAddress {
        &self.endpoint
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &Secret {
        &self.password
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn use_tls(&self) -> bool {
        self.use_tls
    }

    /// TLS settings, present only when TLS is enabled
    pub fn tls(&self) -> Option<&TlsConfig> {
        self.use_tls.then_some(&self.tls)
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn socket_timeout(&self) -> Duration {
        self.socket_timeout
    }

    pub fn blocking_socket_timeout(&self) -> Duration {
        self.blocking_socket_timeout
    }

    pub fn client_idle_timeout(&self) -> Duration {
        self.client_idle_timeout
    }

    pub fn max_retry_attempts(&self) -> u32 {
        self.max_retry_attempts
    }
}

fn required<'a>(source: &'a PropertySource, key: &'static str) -> Result<&'a str, ConfigError> {
    source.get(key).ok_or(ConfigError::Missing { key })
}

fn parse_port(source: &PropertySource) -> Result<u16, ConfigError> {
    let raw = required(source, ENDPOINT_PORT)?;
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err(ConfigError::Malformed {
            key: ENDPOINT_PORT,
            value: raw.to_string(),
            reason: "expected a port number between 1 and 65535".to_string(),
        }),
        Ok(port) => Ok(port),
    }
}

fn parse_secs(source: &PropertySource, key: &'static str) -> Result<Duration, ConfigError> {
    let raw = required(source, key)?;
    match raw.parse::<u64>() {
        Ok(0) => Err(ConfigError::Malformed {
            key,
            value: raw.to_string(),
            reason: "timeout must be greater than zero".to_string(),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => Err(ConfigError::Malformed {
            key,
            value: raw.to_string(),
            reason: "expected a whole number of seconds".to_string(),
        }),
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    if raw.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConfigError::Malformed {
            key,
            value: raw.to_string(),
            reason: "expected true or false".to_string(),
        })
    }
}
