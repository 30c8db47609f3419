//! Record values and lookup outcomes

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// A stored record in one of its three representations
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Scalar(String),
    Json(Value),
    Hash(BTreeMap<String, String>),
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Scalar(s) => f.write_str(s),
            RecordValue::Json(Value::String(s)) => f.write_str(s),
            RecordValue::Json(v) => write!(f, "{}", v),
            RecordValue::Hash(map) => {
                f.write_str("{")?;
                for (i, (field, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", field, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// What was missing when a lookup came back empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Key,
    Path,
    Field,
}

/// Outcome of a record read
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Found(RecordValue),
    NotFound(Missing),
}

impl RecordOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, RecordOutcome::Found(_))
    }

    pub fn value(&self) -> Option<&RecordValue> {
        match self {
            RecordOutcome::Found(v) => Some(v),
            RecordOutcome::NotFound(_) => None,
        }
    }
}

impl fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordOutcome::Found(v) => write!(f, "{}", v),
            RecordOutcome::NotFound(_) => f.write_str("No record found."),
        }
    }
}

/// Outcome of a delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub key: String,
    pub deleted: u64,
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.deleted == 0 {
            f.write_str("No record found.")
        } else {
            write!(f, "Record for key '{}' deleted.", self.key)
        }
    }
}
