//! Key-value property source
//!
//! Properties are read from a `KEY=VALUE` file (dotenv syntax, `#`
//! comments) and may be overridden from the process environment.
//! Values are taken literally: an unquoted or double-quoted `$` is
//! rejected rather than substituted, so it must be single-quoted.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::utils::ConfigError;

/// Flat set of configuration properties
#[derive(Debug, Clone, Default)]
pub struct PropertySource {
    values: HashMap<String, String>,
}

impl PropertySource {
    /// Read properties from a file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Source(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Read properties from any reader
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, ConfigError> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| ConfigError::Source(e.to_string()))?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> Result<Self, ConfigError> {
        reject_substitutions(text)?;
        Self::collect(dotenvy::from_read_iter(text.as_bytes()))
    }

    /// Build from in-memory pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn collect<I>(iter: I) -> Result<Self, ConfigError>
    where
        I: Iterator<Item = dotenvy::Result<(String, String)>>,
    {
        let mut values = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| ConfigError::Source(e.to_string()))?;
            values.insert(key, value);
        }
        Ok(Self { values })
    }

    /// Replace values for `keys` that are set in the process environment
    pub fn with_env_overrides(mut self, keys: &[&str]) -> Self {
        for key in keys {
            if let Ok(value) = std::env::var(key) {
                self.values.insert((*key).to_string(), value);
            }
        }
        self
    }

    /// Trimmed value for `key`; blank values count as absent
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// dotenvy expands `$NAME` outside single quotes; passwords must not change
fn reject_substitutions(text: &str) -> Result<(), ConfigError> {
    for line in text.lines() {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim_start();
        if value.starts_with('\'') {
            continue;
        }
        let mut escaped = false;
        for c in value.chars() {
            match c {
                '\\' => escaped = !escaped,
                '$' if !escaped => {
                    return Err(ConfigError::UnquotedDollar {
                        key: key.trim().to_string(),
                    })
                }
                _ => escaped = false,
            }
        }
    }
    Ok(())
}
