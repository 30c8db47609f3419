//! Record operations over the cluster client
//!
//! Each operation logs the request, passes it to [`ClusterClient`], logs
//! failures and hands them back unchanged.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{error, info};

use super::outcome::{DeleteOutcome, Missing, RecordOutcome, RecordValue};
use crate::client::{Ack, ClusterClient, JsonLookup};
use crate::utils::{ClientError, Result, WriteError};

/// Domain-level record operations
pub struct RecordService {
    client: ClusterClient,
}

impl RecordService {
    pub fn new(client: ClusterClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ClusterClient {
        &self.client
    }

    /// Read a raw string record
    pub fn get_record(&self, key: &str) -> Result<RecordOutcome> {
        info!("Retrieving record for key '{}'...", key);
        let value = self.client.get(key).inspect_err(|e| log_failure("get", key, e))?;
        Ok(found_or(value.map(RecordValue::Scalar), Missing::Key))
    }

    /// Insert or replace a JSON document
    pub fn upsert_json_record(&self, key: &str, document: &str) -> Result<Ack> {
        info!("Upserting JSON record for key '{}'...", key);
        self.client
            .json_set(key, document)
            .inspect_err(|e| log_failure("JSON upsert", key, e))
    }

    /// Read a JSON document, or the value at `path` inside it
    pub fn get_json_record(&self, key: &str, path: Option<&str>) -> Result<RecordOutcome> {
        match path {
            Some(p) => info!("Retrieving JSON record for key '{}' and path '{}'...", key, p),
            None => info!("Retrieving JSON record for key '{}'...", key),
        }

        let lookup = self
            .client
            .json_get(key, path)
            .inspect_err(|e| log_failure("JSON get", key, e))?;

        let outcome = match lookup {
            JsonLookup::Found(value) => RecordOutcome::Found(RecordValue::Json(value)),
            JsonLookup::KeyNotFound => RecordOutcome::NotFound(Missing::Key),
            JsonLookup::PathNotFound => RecordOutcome::NotFound(Missing::Path),
        };
        log_not_found(&outcome);
        Ok(outcome)
    }

    /// Merge a flat JSON object into the Hash at `key`
    ///
    /// Returns the number of fields that did not exist before.
    pub fn upsert_hash_record(&self, key: &str, document: &str) -> Result<u64> {
        info!("Upserting Hash record for key '{}'...", key);
        let fields = parse_flat_mapping(document).inspect_err(|e| {
            error!("Rejected Hash record for key '{}': {}", key, e);
        })?;
        self.client
            .hash_set(key, &fields)
            .inspect_err(|e| log_failure("Hash upsert", key, e))
    }

    /// Read the whole Hash at `key`, or a single field
    pub fn get_hash_record(&self, key: &str, field: Option<&str>) -> Result<RecordOutcome> {
        let outcome = match field {
            Some(field) => {
                info!(
                    "Retrieving Hash record for key '{}' and field '{}'...",
                    key, field
                );
                let value = self
                    .client
                    .hash_get(key, field)
                    .inspect_err(|e| log_failure("Hash get", key, e))?;
                found_or(value.map(RecordValue::Scalar), Missing::Field)
            }
            None => {
                info!("Retrieving Hash record for key '{}'...", key);
                let map = self
                    .client
                    .hash_get_all(key)
                    .inspect_err(|e| log_failure("Hash get", key, e))?;
                found_or(map.map(RecordValue::Hash), Missing::Key)
            }
        };
        Ok(outcome)
    }

    /// Delete the record at `key`, whatever its type
    pub fn delete_record(&self, key: &str) -> Result<DeleteOutcome> {
        info!("Deleting record for key '{}'...", key);
        let deleted = self
            .client
            .delete(key)
            .inspect_err(|e| log_failure("delete", key, e))?;
        Ok(DeleteOutcome {
            key: key.to_string(),
            deleted,
        })
    }

    /// Close the underlying client
    pub fn shutdown(&self) {
        self.client.close();
    }
}

fn found_or(value: Option<RecordValue>, missing: Missing) -> RecordOutcome {
    let outcome = match value {
        Some(v) => RecordOutcome::Found(v),
        None => RecordOutcome::NotFound(missing),
    };
    log_not_found(&outcome);
    outcome
}

fn log_not_found(outcome: &RecordOutcome) {
    if let RecordOutcome::NotFound(missing) = outcome {
        info!("No record found ({:?} absent).", missing);
    }
}

fn log_failure(operation: &str, key: &str, err: &ClientError) {
    error!("{} for key '{}' failed: {}", operation, key, err);
}

/// Parse a JSON object of scalar values into field → string pairs
///
/// Strings are taken as-is; numbers and booleans use their JSON text.
pub fn parse_flat_mapping(document: &str) -> std::result::Result<BTreeMap<String, String>, WriteError> {
    let value: Value =
        serde_json::from_str(document).map_err(|e| WriteError::InvalidDocument(e.to_string()))?;

    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(WriteError::NotAFlatMapping(format!(
                "expected an object, got {}",
                json_kind(&other)
            )))
        }
    };

    object
        .into_iter()
        .map(|(field, value)| match value {
            Value::String(s) => Ok((field, s)),
            Value::Number(n) => Ok((field, n.to_string())),
            Value::Bool(b) => Ok((field, b.to_string())),
            other => Err(WriteError::NotAFlatMapping(format!(
                "field '{}' holds {}",
                field,
                json_kind(&other)
            ))),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
