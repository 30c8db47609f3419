//! Utility modules

pub mod error;
pub mod resp;

pub use error::{
    ClientError, ClusterError, ConfigError, ConnectionError, ProtocolError, Result, WriteError,
};
pub use resp::{RespDecoder, RespEncoder, RespValue};
