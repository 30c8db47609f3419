//! Raw TCP/TLS connection to a cluster node
//!
//! Plain TCP splits into a buffered reader and writer over cloned
//! sockets; TLS keeps one buffered stream and writes through it.

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use super::node_connection::{Connector, NodeConnection};
use crate::config::{ConnectionConfig, ServerAddress, TlsConfig};
use crate::utils::{ConnectionError, RespDecoder, RespEncoder, RespValue};

/// Raw connection wrapper (TCP or TLS)
pub enum RawConnection {
    Tcp {
        writer: BufWriter<TcpStream>,
        reader: BufReader<TcpStream>,
    },
    #[cfg(feature = "native-tls-backend")]
    NativeTls {
        stream: BufReader<native_tls::TlsStream<TcpStream>>,
    },
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ConnectionError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| ConnectionError::ConnectFailed {
            host: host.to_string(),
            port,
            source: e,
        })?
        .next()
        .ok_or_else(|| ConnectionError::ConnectFailed {
            host: host.to_string(),
            port,
            source: io::Error::new(io::ErrorKind::NotFound, "No addresses found"),
        })
}

fn open_socket(
    host: &str,
    port: u16,
    connect_timeout: Duration,
    socket_timeout: Duration,
) -> Result<TcpStream, ConnectionError> {
    let addr = resolve(host, port)?;

    let stream = TcpStream::connect_timeout(&addr, connect_timeout).map_err(|e| {
        if e.kind() == io::ErrorKind::TimedOut {
            ConnectionError::Timeout(connect_timeout.as_millis() as u64)
        } else {
            ConnectionError::ConnectFailed {
                host: host.to_string(),
                port,
                source: e,
            }
        }
    })?;

    stream.set_nodelay(true).ok(); // Disable Nagle's algorithm
    stream.set_read_timeout(Some(socket_timeout)).ok();
    stream.set_write_timeout(Some(socket_timeout)).ok();

    Ok(stream)
}

impl RawConnection {
    /// Create new TCP connection
    pub fn connect_tcp(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        socket_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let stream = open_socket(host, port, connect_timeout, socket_timeout)?;

        let writer = BufWriter::with_capacity(
            16 * 1024,
            stream
                .try_clone()
                .map_err(|e| ConnectionError::ConnectFailed {
                    host: host.to_string(),
                    port,
                    source: e,
                })?,
        );
        let reader = BufReader::with_capacity(16 * 1024, stream);

        Ok(RawConnection::Tcp { writer, reader })
    }

    /// Create new TLS connection
    #[cfg(feature = "native-tls-backend")]
    pub fn connect_tls(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        socket_timeout: Duration,
        tls_config: &TlsConfig,
        server_name: &str,
    ) -> Result<Self, ConnectionError> {
        use native_tls::{Certificate, TlsConnector};

        let mut builder = TlsConnector::builder();

        if tls_config.skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }

        if let Some(ref ca_path) = tls_config.ca_cert {
            let ca_data = std::fs::read(ca_path).map_err(|e| {
                ConnectionError::TlsFailed(format!("Failed to read CA cert: {}", e))
            })?;
            let cert = Certificate::from_pem(&ca_data)
                .map_err(|e| ConnectionError::TlsFailed(format!("Invalid CA cert: {}", e)))?;
            builder.add_root_certificate(cert);
        }

        let connector = builder.build().map_err(|e| {
            ConnectionError::TlsFailed(format!("Failed to build TLS connector: {}", e))
        })?;

        let tcp_stream = open_socket(host, port, connect_timeout, socket_timeout)?;

        let tls_stream = connector
            .connect(server_name, tcp_stream)
            .map_err(|e| ConnectionError::TlsFailed(format!("TLS handshake failed: {}", e)))?;

        Ok(RawConnection::NativeTls {
            stream: BufReader::with_capacity(16 * 1024, tls_stream),
        })
    }

    /// Send command and receive response
    pub fn execute_encoded(&mut self, encoder: &RespEncoder) -> io::Result<RespValue> {
        match self {
            RawConnection::Tcp { writer, reader } => {
                writer.write_all(encoder.as_bytes())?;
                writer.flush()?;
                RespDecoder::new(reader).decode()
            }
            #[cfg(feature = "native-tls-backend")]
            RawConnection::NativeTls { stream } => {
                stream.get_mut().write_all(encoder.as_bytes())?;
                stream.get_mut().flush()?;
                RespDecoder::new(stream).decode()
            }
        }
    }
}

impl NodeConnection for RawConnection {
    fn execute(&mut self, args: &[&[u8]]) -> io::Result<RespValue> {
        self.execute_encoded(&RespEncoder::for_command(args))
    }

    fn shutdown(&mut self) {
        match self {
            RawConnection::Tcp { reader, .. } => {
                reader.get_ref().shutdown(Shutdown::Both).ok();
            }
            #[cfg(feature = "native-tls-backend")]
            RawConnection::NativeTls { stream } => {
                stream.get_mut().shutdown().ok();
                stream.get_ref().get_ref().shutdown(Shutdown::Both).ok();
            }
        }
    }
}

/// Connection factory for creating connections with common config
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    pub connect_timeout: Duration,
    pub socket_timeout: Duration,
    pub tls_config: Option<TlsConfig>,
    /// Configured cluster endpoint, the certificate name for IP-addressed nodes
    pub endpoint_host: String,
}

impl ConnectionFactory {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            socket_timeout: config.socket_timeout(),
            tls_config: config.tls().cloned(),
            endpoint_host: config.endpoint().host.clone(),
        }
    }

    /// Certificate name checked when dialling `host`; `None` without TLS
    pub fn tls_server_name<'a>(&'a self, host: &'a str) -> Option<&'a str> {
        self.tls_config
            .as_ref()
            .map(|tls| tls.server_name(host, &self.endpoint_host))
    }

    /// Create a new connection to the specified host:port
    pub fn create(&self, host: &str, port: u16) -> Result<RawConnection, ConnectionError> {
        let conn = match &self.tls_config {
            #[cfg(feature = "native-tls-backend")]
            Some(tls) => RawConnection::connect_tls(
                host,
                port,
                self.connect_timeout,
                self.socket_timeout,
                tls,
                tls.server_name(host, &self.endpoint_host),
            )?,
            #[cfg(not(feature = "native-tls-backend"))]
            Some(_) => {
                return Err(ConnectionError::TlsFailed(
                    "TLS support not compiled in".to_string(),
                ));
            }
            None => RawConnection::connect_tcp(host, port, self.connect_timeout, self.socket_timeout)?,
        };

        debug!(
            "Connected to {}:{} (tls: {})",
            host,
            port,
            self.tls_config.is_some()
        );
        Ok(conn)
    }
}

impl Connector for ConnectionFactory {
    fn connect(&self, address: &ServerAddress) -> Result<Box<dyn NodeConnection>, ConnectionError> {
        Ok(Box::new(self.create(&address.host, address.port)?))
    }
}
