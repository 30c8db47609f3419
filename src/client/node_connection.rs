//! Connection traits for node communication
//!
//! `NodeConnection` is the request/response channel to one cluster node
//! and `Connector` opens new ones. `RawConnection` and
//! `ConnectionFactory` are the TCP/TLS implementations; anything else
//! speaking the same commands (an in-memory cluster in tests) can be
//! plugged in through these traits.

use std::io;

use crate::config::{ConnectionConfig, Secret, ServerAddress};
use crate::utils::{ClientError, ConnectionError, ProtocolError, RespValue, Result};

/// One established connection to a cluster node
pub trait NodeConnection: Send {
    /// Send one command and wait for its reply
    fn execute(&mut self, args: &[&[u8]]) -> io::Result<RespValue>;

    /// Close the underlying transport
    fn shutdown(&mut self) {}
}

/// Opens connections to cluster nodes
pub trait Connector: Send + Sync {
    fn connect(&self, address: &ServerAddress)
        -> std::result::Result<Box<dyn NodeConnection>, ConnectionError>;
}

/// Extension trait with the control commands the client needs
pub trait NodeConnectionExt: NodeConnection {
    /// Execute a command with string arguments
    fn execute_str(&mut self, args: &[&str]) -> io::Result<RespValue> {
        let byte_args: Vec<&[u8]> = args.iter().map(|s| s.as_bytes()).collect();
        self.execute(&byte_args)
    }

    /// Get CLUSTER NODES response as string
    ///
    /// Returns `None` when the server runs without cluster support.
    fn cluster_nodes(&mut self) -> io::Result<Option<String>> {
        match self.execute_str(&["CLUSTER", "NODES"])? {
            RespValue::BulkString(data) => String::from_utf8(data)
                .map(Some)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("Invalid UTF-8: {}", e))),
            RespValue::Error(e) if e.contains("cluster support disabled") => Ok(None),
            RespValue::Error(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unexpected CLUSTER NODES response: {:?}", other),
            )),
        }
    }

    /// Send AUTH command
    fn authenticate(&mut self, username: &str, password: &str) -> io::Result<()> {
        match self.execute_str(&["AUTH", username, password])? {
            RespValue::SimpleString(s) if s == "OK" => Ok(()),
            RespValue::Error(e) => Err(io::Error::new(io::ErrorKind::PermissionDenied, e)),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unexpected AUTH response: {:?}", other),
            )),
        }
    }

    /// Send CLIENT SETNAME
    fn set_client_name(&mut self, name: &str) -> io::Result<()> {
        match self.execute_str(&["CLIENT", "SETNAME", name])? {
            RespValue::SimpleString(s) if s == "OK" => Ok(()),
            RespValue::Error(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unexpected CLIENT SETNAME response: {:?}", other),
            )),
        }
    }

    /// Send ASKING before a command redirected by ASK
    fn asking(&mut self) -> io::Result<()> {
        match self.execute_str(&["ASKING"])? {
            RespValue::SimpleString(_) => Ok(()),
            RespValue::Error(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unexpected ASKING response: {:?}", other),
            )),
        }
    }
}

impl<T: NodeConnection + ?Sized> NodeConnectionExt for T {}

/// Per-connection setup run right after connecting
#[derive(Debug, Clone)]
pub struct Handshake {
    pub username: String,
    pub password: Secret,
    pub client_name: String,
}

impl Handshake {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            username: config.username().to_string(),
            password: config.password().clone(),
            client_name: config.client_name().to_string(),
        }
    }

    /// Authenticate and name the connection to `address`
    ///
    /// Only a rejected AUTH is an authentication failure; transport
    /// errors keep their own classification.
    pub fn perform(
        &self,
        conn: &mut dyn NodeConnection,
        address: &ServerAddress,
        timeout_ms: u64,
    ) -> Result<()> {
        conn.authenticate(&self.username, self.password.expose())
            .map_err(|e| -> ClientError {
                if e.kind() == io::ErrorKind::PermissionDenied {
                    ConnectionError::AuthFailed(e.to_string()).into()
                } else {
                    ClientError::from_io(e, address, timeout_ms)
                }
            })?;

        conn.set_client_name(&self.client_name)
            .map_err(|e| -> ClientError {
                if e.kind() == io::ErrorKind::Other {
                    ProtocolError::ServerError(e.to_string()).into()
                } else {
                    ClientError::from_io(e, address, timeout_ms)
                }
            })?;

        Ok(())
    }
}
