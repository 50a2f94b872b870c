use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{
    AttributeValue, FilterExpr, PayloadFormat, Record, PROCESSED_AT_ATTRIBUTE,
    PROCESSOR_VERSION_ATTRIBUTE, SOURCE_NAME_ATTRIBUTE,
};
use crate::config::SourceSpec;
use crate::error::{FormatError, SourceError};

/// Parse a payload into flat records.
///
/// The filter only applies to JSON payloads. When it produces several values
/// only the first is kept; when it produces none the whole document is
/// converted.
pub fn transform(
    payload: &[u8],
    format: PayloadFormat,
    filter: Option<&FilterExpr>,
) -> Result<Vec<Record>, SourceError> {
    let records = match format {
        PayloadFormat::Json => transform_json(payload, filter)?,
        PayloadFormat::Csv => transform_csv(payload)?,
    };
    Ok(records)
}

fn transform_json(
    payload: &[u8],
    filter: Option<&FilterExpr>,
) -> Result<Vec<Record>, FormatError> {
    let parsed: Value =
        serde_json::from_slice(payload).map_err(|e| FormatError::MalformedJson(e.to_string()))?;

    let value = match filter {
        Some(filter) => match filter.first(&parsed) {
            Some(value) => value,
            None => {
                debug!(
                    filter = filter.as_str(),
                    "filter produced no values, converting whole document"
                );
                parsed
            }
        },
        None => parsed,
    };

    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(fields) => Some(record_from_object(fields)),
                _ => None,
            })
            .collect()),
        Value::Object(fields) => Ok(vec![record_from_object(fields)]),
        other => Err(FormatError::UnexpectedShape {
            found: json_kind(&other),
        }),
    }
}

fn record_from_object(fields: Map<String, Value>) -> Record {
    let mut record = Record::new();
    flatten_into(&mut record, None, fields);
    record
}

fn flatten_into(record: &mut Record, prefix: Option<&str>, fields: Map<String, Value>) {
    for (key, value) in fields {
        let name = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key,
        };
        match value {
            Value::Null => {}
            Value::Bool(b) => record.insert(name, b),
            Value::String(s) => record.insert(name, s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    record.insert(name, i);
                } else if let Some(f) = n.as_f64() {
                    record.insert(name, f);
                }
            }
            Value::Array(_) => record.insert(name, value.to_string()),
            Value::Object(nested) => flatten_into(record, Some(&name), nested),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn transform_csv(payload: &[u8]) -> Result<Vec<Record>, FormatError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(payload);
    let mut rows = reader.records();

    let headers = match rows.next() {
        None => return Ok(Vec::new()),
        Some(Ok(headers)) => headers,
        Some(Err(e)) => return Err(FormatError::MalformedCsv(e.to_string())),
    };

    let mut records = Vec::new();
    for row in rows {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(error = %e, "skipping unreadable CSV row");
                continue;
            }
        };
        if row.len() != headers.len() {
            warn!(
                line = row.position().map(|p| p.line()),
                expected = headers.len(),
                found = row.len(),
                "skipping CSV row with mismatched column count"
            );
            continue;
        }
        records.push(
            headers
                .iter()
                .zip(row.iter())
                .map(|(header, cell)| (header.to_string(), coerce_cell(cell)))
                .collect(),
        );
    }

    Ok(records)
}

/// Coerce a raw CSV cell: number first, then boolean, else text.
///
/// Integer literals stay exact; anything else that parses as a finite float
/// becomes a float.
pub fn coerce_cell(raw: &str) -> AttributeValue {
    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() {
            return match raw.parse::<i64>() {
                Ok(integer) => AttributeValue::Integer(integer),
                Err(_) => AttributeValue::Float(float),
            };
        }
    }
    if let Some(b) = parse_bool(raw) {
        return AttributeValue::Bool(b);
    }
    AttributeValue::Text(raw.to_string())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Stamp records with the source's static attributes and processing metadata.
///
/// Precedence, lowest first: payload fields, static attributes, metadata.
pub fn enrich(records: &mut [Record], spec: &SourceSpec, processed_at: DateTime<Utc>) {
    let timestamp = processed_at.timestamp();
    for record in records.iter_mut() {
        for (name, value) in &spec.attributes {
            record.insert(name.clone(), value.clone());
        }
        record.insert(SOURCE_NAME_ATTRIBUTE, spec.name.as_str());
        record.insert(PROCESSED_AT_ATTRIBUTE, timestamp);
        record.insert(PROCESSOR_VERSION_ATTRIBUTE, env!("CARGO_PKG_VERSION"));
    }
}
