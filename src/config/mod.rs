//! Configuration module

pub mod cli;
pub mod connection_config;
pub mod properties;
pub mod tls_config;

pub use cli::CliArgs;
pub use connection_config::{ConnectionConfig, Secret, ServerAddress};
pub use properties::PropertySource;
pub use tls_config::TlsConfig;
