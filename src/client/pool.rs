//! Per-node connection pool
//!
//! One connection per node address, each behind its own mutex. The
//! address map is only write-locked to insert a node or drain the pool,
//! so commands for different nodes never wait on each other.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::node_connection::{Connector, Handshake, NodeConnection, NodeConnectionExt};
use crate::config::ServerAddress;
use crate::utils::{ClientError, ConnectionError, ProtocolError, RespValue, Result};

struct PooledConnection {
    conn: Option<Box<dyn NodeConnection>>,
    last_used: Instant,
}

impl PooledConnection {
    fn discard(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.shutdown();
        }
    }
}

/// Connections keyed by node address
pub struct NodePool {
    connector: Arc<dyn Connector>,
    handshake: Handshake,
    idle_timeout: Duration,
    socket_timeout: Duration,
    nodes: RwLock<HashMap<ServerAddress, Arc<Mutex<PooledConnection>>>>,
    closed: AtomicBool,
}

impl NodePool {
    pub fn new(
        connector: Arc<dyn Connector>,
        handshake: Handshake,
        idle_timeout: Duration,
        socket_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            handshake,
            idle_timeout,
            socket_timeout,
            nodes: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of node entries in the pool
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    fn timeout_ms(&self) -> u64 {
        self.socket_timeout.as_millis() as u64
    }

    fn entry(&self, address: &ServerAddress) -> Result<Arc<Mutex<PooledConnection>>> {
        if let Some(entry) = self.nodes.read().get(address) {
            return Ok(Arc::clone(entry));
        }

        let mut nodes = self.nodes.write();
        // Checked under the write lock so nothing is inserted after close drained the map
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let entry = nodes.entry(address.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(PooledConnection {
                conn: None,
                last_used: Instant::now(),
            }))
        });
        Ok(Arc::clone(entry))
    }

    fn checkout<'a>(
        &self,
        pooled: &'a mut PooledConnection,
        address: &ServerAddress,
    ) -> Result<&'a mut Box<dyn NodeConnection>> {
        if pooled.conn.is_some() && pooled.last_used.elapsed() > self.idle_timeout {
            debug!("Dropping idle connection to {}", address);
            pooled.discard();
        }

        if pooled.conn.is_none() {
            let mut conn = self.connector.connect(address)?;
            if let Err(e) = self.handshake.perform(conn.as_mut(), address, self.timeout_ms()) {
                conn.shutdown();
                return Err(e);
            }
            debug!("Opened connection to {}", address);
            pooled.conn = Some(conn);
        }

        pooled.last_used = Instant::now();
        pooled
            .conn
            .as_mut()
            .ok_or(ClientError::Connection(ConnectionError::Closed))
    }

    /// Execute one command on the node at `address`
    ///
    /// With `asking` set, ASKING is sent first on the same connection.
    /// An I/O failure discards the connection; the next call reconnects.
    pub fn execute(
        &self,
        address: &ServerAddress,
        args: &[&[u8]],
        asking: bool,
    ) -> Result<RespValue> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let entry = self.entry(address)?;
        let mut pooled = entry.lock();
        // close() may have drained this entry while we waited
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let result = {
            let conn = self.checkout(&mut pooled, address)?;
            if asking {
                conn.asking().and_then(|_| conn.execute(args))
            } else {
                conn.execute(args)
            }
        };

        match result {
            Ok(reply) => {
                pooled.last_used = Instant::now();
                Ok(reply)
            }
            Err(e) => {
                warn!("Command to {} failed, discarding connection: {}", address, e);
                pooled.discard();
                Err(ClientError::from_io(e, address, self.timeout_ms()))
            }
        }
    }

    /// Fetch CLUSTER NODES from `address`; `None` if cluster support is disabled
    pub fn cluster_nodes(&self, address: &ServerAddress) -> Result<Option<String>> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let entry = self.entry(address)?;
        let mut pooled = entry.lock();
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let result = self.checkout(&mut pooled, address)?.cluster_nodes();
        result.map_err(|e| -> ClientError {
            if e.kind() == io::ErrorKind::Other {
                ProtocolError::ServerError(e.to_string()).into()
            } else {
                pooled.discard();
                ClientError::from_io(e, address, self.timeout_ms())
            }
        })
    }

    /// Close every connection
    ///
    /// Waits for the in-flight command on each node to finish. Returns
    /// false if the pool was already closed.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Connection pool already closed");
            return false;
        }

        let drained: Vec<(ServerAddress, Arc<Mutex<PooledConnection>>)> =
            self.nodes.write().drain().collect();

        for (address, entry) in &drained {
            let mut pooled = entry.lock();
            pooled.discard();
            debug!("Closed connection to {}", address);
        }

        info!("Closed {} node connection(s)", drained.len());
        true
    }
}
