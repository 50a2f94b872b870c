//! Payload parsing and record shaping.
//!
//! Turns a fetched payload into flat [`Record`]s:
//!
//! - JSON payloads are optionally narrowed by a [`FilterExpr`] first, then
//!   arrays of objects (or a single object) become records
//! - CSV payloads use their first row as the header and coerce each cell to a
//!   number, boolean or text
//!
//! [`enrich`] then stamps every record with the source's static attributes and
//! processing metadata.

mod engine;
mod filter;
mod value;

use serde::{Deserialize, Serialize};

pub use engine::{coerce_cell, enrich, transform};
pub use filter::FilterExpr;
pub use value::{AttributeValue, Record};

/// Attribute carrying the name of the source a record came from.
pub const SOURCE_NAME_ATTRIBUTE: &str = "source.name";
/// Attribute carrying the unix time (seconds) the record was processed.
pub const PROCESSED_AT_ATTRIBUTE: &str = "processed.timestamp";
/// Attribute carrying the version of the processor that produced the record.
pub const PROCESSOR_VERSION_ATTRIBUTE: &str = "processor.version";

/// Payload formats a source can declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Json,
    Csv,
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadFormat::Json => write!(f, "json"),
            PayloadFormat::Csv => write!(f, "csv"),
        }
    }
}
