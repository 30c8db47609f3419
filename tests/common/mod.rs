//! In-memory cluster used by the integration tests
//!
//! Every node shares one keyspace but only serves the slots it owns;
//! other keys get MOVED (or ASK while a slot is being migrated), the
//! same way a real cluster answers.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use memorydb_records::client::{Connector, NodeConnection};
use memorydb_records::cluster::{ClusterTopology, SLOT_COUNT};
use memorydb_records::config::ServerAddress;
use memorydb_records::utils::{ConnectionError, RespValue};
use memorydb_records::{ClusterClient, ConnectionConfig, PropertySource};

pub const USERNAME: &str = "demo-user";
pub const PASSWORD: &str = "demo-pass";
pub const HOST: &str = "127.0.0.1";
pub const BASE_PORT: u16 = 30001;

#[derive(Debug, Clone)]
enum Stored {
    Text(String),
    Json(Value),
    Hash(BTreeMap<String, String>),
}

struct State {
    nodes: Vec<ServerAddress>,
    owners: Vec<usize>,
    data: HashMap<String, Stored>,
    /// Slot being migrated and the node importing it
    migrating: Option<(u16, usize)>,
}

struct Shared {
    state: Mutex<State>,
    cluster_enabled: bool,
    redirect_storm: AtomicBool,
    connects: AtomicUsize,
    shutdowns: AtomicUsize,
    topology_queries: AtomicUsize,
}

/// Handle to an in-memory cluster; also the `Connector` the client uses
#[derive(Clone)]
pub struct MockCluster {
    shared: Arc<Shared>,
}

impl MockCluster {
    /// Cluster of `primaries` nodes with the slots split evenly
    pub fn new(primaries: usize) -> Self {
        Self::build(primaries, true)
    }

    /// One server with cluster support disabled
    pub fn standalone() -> Self {
        Self::build(1, false)
    }

    fn build(primaries: usize, cluster_enabled: bool) -> Self {
        let nodes: Vec<ServerAddress> = (0..primaries)
            .map(|i| ServerAddress::new(HOST, BASE_PORT + i as u16))
            .collect();
        let per_node = SLOT_COUNT.div_ceil(primaries);
        let owners = (0..SLOT_COUNT).map(|slot| slot / per_node).collect();

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    nodes,
                    owners,
                    data: HashMap::new(),
                    migrating: None,
                }),
                cluster_enabled,
                redirect_storm: AtomicBool::new(false),
                connects: AtomicUsize::new(0),
                shutdowns: AtomicUsize::new(0),
                topology_queries: AtomicUsize::new(0),
            }),
        }
    }

    pub fn seed(&self) -> ServerAddress {
        self.shared.state.lock().nodes[0].clone()
    }

    pub fn node_count(&self) -> usize {
        self.shared.state.lock().nodes.len()
    }

    pub fn owner_of(&self, key: &str) -> ServerAddress {
        let state = self.shared.state.lock();
        let slot = ClusterTopology::slot_for_key(key.as_bytes()) as usize;
        state.nodes[state.owners[slot]].clone()
    }

    /// Move the slot of `key` to the next node; the old owner answers MOVED
    pub fn migrate_slot_of(&self, key: &str) -> ServerAddress {
        let mut state = self.shared.state.lock();
        let slot = ClusterTopology::slot_for_key(key.as_bytes()) as usize;
        let next = (state.owners[slot] + 1) % state.nodes.len();
        state.owners[slot] = next;
        state.nodes[next].clone()
    }

    /// Start migrating the slot of `key`; the owner answers ASK until it ends
    pub fn begin_migration_of(&self, key: &str) -> ServerAddress {
        let mut state = self.shared.state.lock();
        let slot = ClusterTopology::slot_for_key(key.as_bytes());
        let target = (state.owners[slot as usize] + 1) % state.nodes.len();
        state.migrating = Some((slot, target));
        state.nodes[target].clone()
    }

    /// Every keyed command is answered with MOVED to some other node
    pub fn set_redirect_storm(&self, on: bool) {
        self.shared.redirect_storm.store(on, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shared.shutdowns.load(Ordering::SeqCst)
    }

    pub fn topology_queries(&self) -> usize {
        self.shared.topology_queries.load(Ordering::SeqCst)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.state.lock().data.contains_key(key)
    }

    /// Client connected through this cluster with the default test settings
    pub fn client(&self) -> ClusterClient {
        self.client_with(test_config(&self.seed(), PASSWORD, 3))
    }

    pub fn client_with(&self, config: ConnectionConfig) -> ClusterClient {
        ClusterClient::with_connector(&config, Arc::new(self.clone()))
            .expect("mock cluster should accept the client")
    }
}

impl Connector for MockCluster {
    fn connect(&self, address: &ServerAddress) -> Result<Box<dyn NodeConnection>, ConnectionError> {
        let node = self
            .shared
            .state
            .lock()
            .nodes
            .iter()
            .position(|a| a == address)
            .ok_or_else(|| ConnectionError::ConnectFailed {
                host: address.host.clone(),
                port: address.port,
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            })?;

        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            shared: Arc::clone(&self.shared),
            node,
            authenticated: false,
            asking: false,
        }))
    }
}

struct MockConnection {
    shared: Arc<Shared>,
    node: usize,
    authenticated: bool,
    asking: bool,
}

impl NodeConnection for MockConnection {
    fn execute(&mut self, args: &[&[u8]]) -> io::Result<RespValue> {
        let args: Vec<String> = args
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect();
        let command = args.first().map(|c| c.to_ascii_uppercase()).unwrap_or_default();

        if command == "AUTH" {
            return Ok(self.auth(&args));
        }
        if !self.authenticated {
            return Ok(error("NOAUTH Authentication required."));
        }

        let reply = match command.as_str() {
            "PING" => simple("PONG"),
            "CLIENT" => simple("OK"),
            "ASKING" => {
                self.asking = true;
                simple("OK")
            }
            "CLUSTER" => self.cluster_nodes(),
            _ => self.keyed(&command, &args),
        };
        Ok(reply)
    }

    fn shutdown(&mut self) {
        self.shared.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

impl MockConnection {
    fn auth(&mut self, args: &[String]) -> RespValue {
        if args.len() == 3 && args[1] == USERNAME && args[2] == PASSWORD {
            self.authenticated = true;
            simple("OK")
        } else {
            error("WRONGPASS invalid username-password pair or user is disabled.")
        }
    }

    fn cluster_nodes(&self) -> RespValue {
        if !self.shared.cluster_enabled {
            return error("ERR This instance has cluster support disabled");
        }
        self.shared.topology_queries.fetch_add(1, Ordering::SeqCst);

        let state = self.shared.state.lock();
        let mut out = String::new();
        for (idx, address) in state.nodes.iter().enumerate() {
            let flags = if idx == self.node { "myself,master" } else { "master" };
            out.push_str(&format!(
                "node{:040} {}:{}@{} {} - 0 0 {} connected",
                idx,
                address.host,
                address.port,
                address.port + 10000,
                flags,
                idx + 1
            ));
            for slot in owned_slots(&state.owners, idx) {
                out.push(' ');
                out.push_str(&slot);
            }
            out.push('\n');
        }
        RespValue::BulkString(out.into_bytes())
    }

    fn keyed(&mut self, command: &str, args: &[String]) -> RespValue {
        let asking = std::mem::take(&mut self.asking);
        let Some(key) = args.get(1) else {
            return error(&format!("ERR wrong number of arguments for '{}' command", command));
        };
        let slot = ClusterTopology::slot_for_key(key.as_bytes());

        let mut state = self.shared.state.lock();
        let owner = state.owners[slot as usize];

        if self.shared.redirect_storm.load(Ordering::SeqCst) {
            let other = &state.nodes[(self.node + 1) % state.nodes.len()];
            return error(&format!("MOVED {} {}", slot, other));
        }

        match state.migrating {
            Some((migrating, target)) if migrating == slot => {
                if self.node == owner {
                    return error(&format!("ASK {} {}", slot, state.nodes[target]));
                }
                if self.node != target || !asking {
                    return error(&format!("MOVED {} {}", slot, state.nodes[owner]));
                }
            }
            _ => {
                if self.node != owner {
                    return error(&format!("MOVED {} {}", slot, state.nodes[owner]));
                }
            }
        }

        run_keyed(&mut state.data, command, key, &args[2..])
    }
}

fn run_keyed(data: &mut HashMap<String, Stored>, command: &str, key: &str, rest: &[String]) -> RespValue {
    match command {
        "GET" => match data.get(key) {
            None => RespValue::Null,
            Some(Stored::Text(s)) => bulk(s),
            Some(_) => wrong_type(),
        },
        "SET" => match rest.first() {
            Some(value) => {
                data.insert(key.to_string(), Stored::Text(value.clone()));
                simple("OK")
            }
            None => error("ERR wrong number of arguments for 'set' command"),
        },
        "DEL" => RespValue::Integer(i64::from(data.remove(key).is_some())),
        "JSON.SET" => {
            let (Some(path), Some(document)) = (rest.first(), rest.get(1)) else {
                return error("ERR wrong number of arguments for 'JSON.SET' command");
            };
            if path != "$" && path != "." {
                return error("ERR only root paths are supported");
            }
            let value: Value = match serde_json::from_str(document) {
                Ok(value) => value,
                Err(_) => return error("SYNTAXERR Failed to parse JSON string due to syntax error"),
            };
            match data.get(key) {
                Some(Stored::Json(_)) | None => {
                    data.insert(key.to_string(), Stored::Json(value));
                    simple("OK")
                }
                Some(_) => wrong_type(),
            }
        }
        "JSON.GET" => match data.get(key) {
            None => RespValue::Null,
            Some(Stored::Json(doc)) => json_get(doc, rest.first().map(String::as_str)),
            Some(_) => wrong_type(),
        },
        "HSET" => {
            if rest.is_empty() || rest.len() % 2 != 0 {
                return error("ERR wrong number of arguments for 'hset' command");
            }
            let entry = data
                .entry(key.to_string())
                .or_insert_with(|| Stored::Hash(BTreeMap::new()));
            let Stored::Hash(map) = entry else {
                return wrong_type();
            };
            let mut added = 0;
            for pair in rest.chunks(2) {
                if map.insert(pair[0].clone(), pair[1].clone()).is_none() {
                    added += 1;
                }
            }
            RespValue::Integer(added)
        }
        "HGET" => match (data.get(key), rest.first()) {
            (None, _) => RespValue::Null,
            (Some(Stored::Hash(map)), Some(field)) => map.get(field).map(|v| bulk(v)).unwrap_or(RespValue::Null),
            (Some(Stored::Hash(_)), None) => error("ERR wrong number of arguments for 'hget' command"),
            (Some(_), _) => wrong_type(),
        },
        "HGETALL" => match data.get(key) {
            None => RespValue::Array(Vec::new()),
            Some(Stored::Hash(map)) => RespValue::Array(
                map.iter()
                    .flat_map(|(field, value)| [bulk(field), bulk(value)])
                    .collect(),
            ),
            Some(_) => wrong_type(),
        },
        other => error(&format!("ERR unknown command '{}'", other)),
    }
}

/// Legacy paths (`.a.b`) answer with the value, JSONPath (`$.a.b`) with an array of matches
fn json_get(doc: &Value, path: Option<&str>) -> RespValue {
    let Some(path) = path else {
        return bulk(&doc.to_string());
    };

    let (json_path, rest) = match path.strip_prefix('$') {
        Some(rest) => (true, rest),
        None => (false, path),
    };

    let mut current = Some(doc);
    for segment in rest.split('.').filter(|s| !s.is_empty()) {
        current = current.and_then(|v| v.get(segment));
    }

    match (current, json_path) {
        (Some(value), true) => bulk(&Value::Array(vec![value.clone()]).to_string()),
        (None, true) => bulk("[]"),
        (Some(value), false) => bulk(&value.to_string()),
        (None, false) => error(&format!("NONEXISTENT JSON path does not exist: {}", path)),
    }
}

fn owned_slots(owners: &[usize], node: usize) -> Vec<String> {
    let mut ranges = Vec::new();
    let mut start: Option<usize> = None;
    for slot in 0..=owners.len() {
        let owned = slot < owners.len() && owners[slot] == node;
        match (owned, start) {
            (true, None) => start = Some(slot),
            (false, Some(s)) => {
                if s == slot - 1 {
                    ranges.push(s.to_string());
                } else {
                    ranges.push(format!("{}-{}", s, slot - 1));
                }
                start = None;
            }
            _ => {}
        }
    }
    ranges
}

fn simple(s: &str) -> RespValue {
    RespValue::SimpleString(s.to_string())
}

fn bulk(s: &str) -> RespValue {
    RespValue::BulkString(s.as_bytes().to_vec())
}

fn error(s: &str) -> RespValue {
    RespValue::Error(s.to_string())
}

fn wrong_type() -> RespValue {
    error("WRONGTYPE Operation against a key holding the wrong kind of value")
}

/// Settings pointing at `seed`
pub fn test_config(seed: &ServerAddress, password: &str, max_attempts: u32) -> ConnectionConfig {
    let port = seed.port.to_string();
    let attempts = max_attempts.to_string();
    let source = PropertySource::from_pairs([
        ("MEMORYDB_CLUSTER_ENDPOINT_HOSTNAME", seed.host.as_str()),
        ("MEMORYDB_CLUSTER_ENDPOINT_PORT", port.as_str()),
        ("MEMORYDB_CLUSTER_ENDPOINT_USERNAME", USERNAME),
        ("MEMORYDB_CLUSTER_ENDPOINT_PASSWORD", password),
        ("MEMORYDB_CLIENT_NAME", "integration-tests"),
        ("MEMORYDB_CLIENT_USE_SSL", "false"),
        ("MEMORYDB_CLIENT_TIMEOUT_IN_SECS", "60"),
        ("MEMORYDB_CLIENT_CONNECTION_TIMEOUT_IN_SECS", "5"),
        ("MEMORYDB_CLIENT_BLOCKING_SOCKET_TIMEOUT_IN_SECS", "5"),
        ("MEMORYDB_CLIENT_SOCKET_TIMEOUT_IN_SECS", "5"),
        ("MEMORYDB_CLIENT_MAX_ATTEMPTS", attempts.as_str()),
    ]);
    ConnectionConfig::load(&source).expect("test settings are valid")
}
