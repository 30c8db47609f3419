//! Domain-level record operations

pub mod outcome;
pub mod record_service;

pub use outcome::{DeleteOutcome, Missing, RecordOutcome, RecordValue};
pub use record_service::{parse_flat_mapping, RecordService};
