//! Cluster-aware key-value client
//!
//! Every operation addresses a single key. The key's hash slot selects
//! the owning node from the current topology snapshot and the command
//! runs on that node's pooled connection. MOVED refreshes the topology
//! and retries, ASK retries once on the named node behind ASKING; both
//! count against `max_retry_attempts`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::node_connection::{Connector, Handshake};
use super::pool::NodePool;
use super::raw_connection::ConnectionFactory;
use crate::cluster::{ClusterTopology, RedirectInfo, TopologyManager};
use crate::config::{ConnectionConfig, ServerAddress};
use crate::utils::{ClientError, ClusterError, ProtocolError, RespValue, Result, WriteError};

/// Successful write acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack;

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OK")
    }
}

/// Result of a JSON.GET
#[derive(Debug, Clone, PartialEq)]
pub enum JsonLookup {
    Found(Value),
    /// The key does not exist
    KeyNotFound,
    /// The key exists but the path does not resolve
    PathNotFound,
}

/// Client for a Redis-compatible cluster
pub struct ClusterClient {
    config: ConnectionConfig,
    pool: NodePool,
    topology: TopologyManager,
}

impl ClusterClient {
    /// Connect over TCP/TLS using the settings in `config`
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let factory = ConnectionFactory::from_config(config);
        Self::with_connector(config, Arc::new(factory))
    }

    /// Connect through a caller-supplied connector
    pub fn with_connector(config: &ConnectionConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        info!(
            "Initializing cluster client '{}' for {} (tls: {})",
            config.client_name(),
            config.endpoint(),
            config.use_tls()
        );

        let pool = NodePool::new(
            connector,
            Handshake::from_config(config),
            config.client_idle_timeout(),
            config.socket_timeout(),
        );

        let seeds = vec![config.endpoint().clone()];
        let initial = match TopologyManager::discover(&pool, &seeds) {
            Ok(topology) => topology,
            Err(e) => {
                pool.close();
                return Err(e);
            }
        };

        info!(
            "Cluster client ready: {} primaries, {} nodes",
            initial.num_primaries(),
            initial.num_nodes()
        );

        Ok(Self {
            config: config.clone(),
            pool,
            topology: TopologyManager::new(initial, seeds),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Incremented each time the slot map is replaced
    pub fn topology_version(&self) -> u64 {
        self.topology.version()
    }

    /// Number of nodes in the current topology
    pub fn node_count(&self) -> usize {
        self.topology.snapshot().num_nodes()
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Route one single-key command to the node owning `key`
    fn dispatch(&self, key: &str, args: &[&[u8]]) -> Result<RespValue> {
        if self.pool.is_closed() {
            return Err(ClientError::Closed);
        }

        let slot = ClusterTopology::slot_for_key(key.as_bytes());
        let max_attempts = self.config.max_retry_attempts();
        let mut target = self.topology.address_for_slot(slot)?;
        let mut asking = false;
        let mut redirects: u32 = 0;

        loop {
            let reply = self.pool.execute(&target, args, asking)?;

            let message = match reply.error_message() {
                Some(message) => message,
                None => return Ok(reply),
            };

            if TopologyManager::is_cluster_down(message) {
                return Err(ClusterError::ClusterDown(message.to_string()).into());
            }

            let redirect = match RedirectInfo::parse(message) {
                Some(redirect) => redirect,
                None => return Ok(reply),
            };

            if redirect.is_ask {
                debug!("Slot {} ASK redirect to {}", slot, redirect.target);
                target = redirect.target;
                asking = true;
            } else {
                debug!("Slot {} MOVED to {}", slot, redirect.target);
                target = self.after_moved(slot, redirect.target);
                asking = false;
            }

            if redirects >= max_attempts {
                warn!(
                    "Giving up on slot {} after {} redirect(s)",
                    slot,
                    redirects + 1
                );
                return Err(ClusterError::TopologyExhausted {
                    slot,
                    attempts: redirects + 1,
                }
                .into());
            }
            redirects += 1;
        }
    }

    /// Refresh the slot map and pick the next target for `slot`
    fn after_moved(&self, slot: u16, moved_to: ServerAddress) -> ServerAddress {
        if self.topology.refresh_topology(&self.pool) {
            if let Ok(address) = self.topology.address_for_slot(slot) {
                return address;
            }
        }
        // Another caller is refreshing, or the refresh failed
        moved_to
    }

    /// GET: raw string value, `None` if the key is absent
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let reply = self.dispatch(key, &[b"GET", key.as_bytes()])?;
        match reply {
            RespValue::Null => Ok(None),
            RespValue::BulkString(data) => Ok(Some(utf8(data)?)),
            other => Err(unexpected("GET", other)),
        }
    }

    /// SET: store a raw string value
    pub fn set(&self, key: &str, value: &str) -> Result<Ack> {
        let reply = self.dispatch(key, &[b"SET", key.as_bytes(), value.as_bytes()])?;
        expect_ok("SET", reply)
    }

    /// JSON.SET at the root path, replacing whatever the key held
    pub fn json_set(&self, key: &str, document: &str) -> Result<Ack> {
        serde_json::from_str::<Value>(document)
            .map_err(|e| WriteError::InvalidDocument(e.to_string()))?;

        let args: [&[u8]; 4] = [b"JSON.SET", key.as_bytes(), b"$", document.as_bytes()];
        let reply = self.dispatch(key, &args)?;

        if reply
            .error_message()
            .is_some_and(|m| m.starts_with("WRONGTYPE"))
        {
            debug!("Key '{}' holds another type, replacing it", key);
            self.delete(key)?;
            return expect_ok("JSON.SET", self.dispatch(key, &args)?);
        }

        expect_ok("JSON.SET", reply)
    }

    /// JSON.GET of the whole document or of `path`
    pub fn json_get(&self, key: &str, path: Option<&str>) -> Result<JsonLookup> {
        let reply = match path {
            Some(path) => self.dispatch(key, &[b"JSON.GET", key.as_bytes(), path.as_bytes()])?,
            None => self.dispatch(key, &[b"JSON.GET", key.as_bytes()])?,
        };

        match reply {
            RespValue::Null => Ok(JsonLookup::KeyNotFound),
            RespValue::BulkString(data) => {
                let text = utf8(data)?;
                let value: Value = serde_json::from_str(&text)
                    .map_err(|e| ProtocolError::Parse(format!("JSON.GET reply: {}", e)))?;
                // JSONPath queries ($...) answer with an array of matches
                let is_json_path = path.is_some_and(|p| p.starts_with('$'));
                if is_json_path && value.as_array().is_some_and(|a| a.is_empty()) {
                    Ok(JsonLookup::PathNotFound)
                } else {
                    Ok(JsonLookup::Found(value))
                }
            }
            RespValue::Error(e) if is_missing_path(&e) => Ok(JsonLookup::PathNotFound),
            other => Err(unexpected("JSON.GET", other)),
        }
    }

    /// HSET: merge `fields` into the hash, returning how many were new
    pub fn hash_set(&self, key: &str, fields: &BTreeMap<String, String>) -> Result<u64> {
        if fields.is_empty() {
            return Ok(0);
        }

        let mut args: Vec<&[u8]> = Vec::with_capacity(2 + fields.len() * 2);
        args.push(b"HSET");
        args.push(key.as_bytes());
        for (field, value) in fields {
            args.push(field.as_bytes());
            args.push(value.as_bytes());
        }

        match self.dispatch(key, &args)? {
            RespValue::Integer(n) if n >= 0 => Ok(n as u64),
            other => Err(unexpected("HSET", other)),
        }
    }

    /// HGET: one field, `None` if the key or field is absent
    pub fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        match self.dispatch(key, &[b"HGET", key.as_bytes(), field.as_bytes()])? {
            RespValue::Null => Ok(None),
            RespValue::BulkString(data) => Ok(Some(utf8(data)?)),
            other => Err(unexpected("HGET", other)),
        }
    }

    /// HGETALL: the full mapping, `None` if the key is absent
    pub fn hash_get_all(&self, key: &str) -> Result<Option<BTreeMap<String, String>>> {
        let items = match self.dispatch(key, &[b"HGETALL", key.as_bytes()])? {
            RespValue::Array(items) => items,
            RespValue::Null => return Ok(None),
            other => return Err(unexpected("HGETALL", other)),
        };

        if items.is_empty() {
            return Ok(None);
        }
        if items.len() % 2 != 0 {
            return Err(ProtocolError::Parse(format!(
                "HGETALL returned {} elements",
                items.len()
            ))
            .into());
        }

        let mut map = BTreeMap::new();
        let mut iter = items.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            map.insert(bulk_to_string("HGETALL", field)?, bulk_to_string("HGETALL", value)?);
        }
        Ok(Some(map))
    }

    /// DEL: number of keys removed (0 or 1)
    pub fn delete(&self, key: &str) -> Result<u64> {
        match self.dispatch(key, &[b"DEL", key.as_bytes()])? {
            RespValue::Integer(n) if n >= 0 => Ok(n as u64),
            other => Err(unexpected("DEL", other)),
        }
    }

    /// Release every connection; later calls fail with `Closed`
    pub fn close(&self) {
        if self.pool.is_closed() {
            debug!("Cluster client already closed");
            return;
        }
        info!("Shutting down cluster client '{}'...", self.config.client_name());
        self.pool.close();
        info!("Completed shutting down cluster client.");
    }
}

impl Drop for ClusterClient {
    fn drop(&mut self) {
        self.pool.close();
    }
}

fn is_missing_path(message: &str) -> bool {
    message.starts_with("NONEXISTENT") || message.contains("does not exist")
}

fn utf8(data: Vec<u8>) -> Result<String> {
    String::from_utf8(data).map_err(|e| ProtocolError::Parse(format!("Invalid UTF-8: {}", e)).into())
}

fn bulk_to_string(command: &str, value: RespValue) -> Result<String> {
    match value {
        RespValue::BulkString(data) => utf8(data),
        RespValue::SimpleString(s) => Ok(s),
        other => Err(unexpected(command, other)),
    }
}

fn expect_ok(command: &str, reply: RespValue) -> Result<Ack> {
    match reply {
        RespValue::SimpleString(s) if s == "OK" => Ok(Ack),
        other => Err(unexpected(command, other)),
    }
}

fn unexpected(command: &str, reply: RespValue) -> ClientError {
    match reply {
        RespValue::Error(e) => ProtocolError::ServerError(e).into(),
        other => ProtocolError::UnexpectedResponse {
            command: command.to_string(),
            actual: other.describe(),
        }
        .into(),
    }
}
