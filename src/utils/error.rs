//! Error types for memorydb-records

use std::io;
use thiserror::Error;

use crate::config::ServerAddress;

/// Top-level client error
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Client is closed")]
    Closed,
}

impl ClientError {
    /// Classify an I/O failure while talking to `address`
    ///
    /// Undecodable replies are protocol errors; everything else goes
    /// through [`ConnectionError::from_io`].
    pub fn from_io(err: io::Error, address: &ServerAddress, timeout_ms: u64) -> Self {
        if err.kind() == io::ErrorKind::InvalidData {
            return ProtocolError::Parse(format!("Reply from {}: {}", address, err)).into();
        }
        ConnectionError::from_io(err, address, timeout_ms).into()
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required property {key}")]
    Missing { key: &'static str },

    #[error("Malformed property {key}={value:?}: {reason}")]
    Malformed {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read configuration source: {0}")]
    Source(String),

    #[error("Property {key} has an unquoted '$' that would be substituted; single-quote the value")]
    UnquotedDollar { key: String },
}

/// Connection-related errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        source: io::Error,
    },

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("TLS handshake failed: {0}")]
    TlsFailed(String),

    #[error("Connection closed unexpectedly")]
    Closed,

    #[error("Connection timeout after {0}ms")]
    Timeout(u64),

    #[error("No seed node reachable: {0}")]
    Unreachable(String),
}

impl ConnectionError {
    /// Classify an I/O failure on an established connection
    pub fn from_io(err: io::Error, address: &ServerAddress, timeout_ms: u64) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                ConnectionError::Timeout(timeout_ms)
            }
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ConnectionError::Closed,
            _ => ConnectionError::ConnectFailed {
                host: address.host.clone(),
                port: address.port,
                source: err,
            },
        }
    }
}

/// RESP protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Unexpected response to {command}: {actual}")]
    UnexpectedResponse { command: String, actual: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Cluster-related errors
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Slot {slot} still redirected after {attempts} attempts")]
    TopologyExhausted { slot: u16, attempts: u32 },

    #[error("Cluster is down: {0}")]
    ClusterDown(String),

    #[error("Failed to parse CLUSTER NODES response: {0}")]
    ParseFailed(String),

    #[error("No primary nodes found in cluster")]
    NoPrimaries,

    #[error("Slot {0} has no assigned node")]
    UnassignedSlot(u16),
}

/// Rejected write input
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Invalid JSON document: {0}")]
    InvalidDocument(String),

    #[error("Not a flat string mapping: {0}")]
    NotAFlatMapping(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
