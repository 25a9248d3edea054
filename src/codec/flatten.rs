//! Value tree → flat field list

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{Field, FieldValue};

/// Separator between path segments of nested objects
pub const PATH_SEPARATOR: char = '.';

/// Flatten a JSON object into an ordered sequence of typed fields.
///
/// Nested objects contribute fields named by their dotted path; arrays
/// contribute one field per element under the same name, in array order.
/// `null` leaves carry no value and are skipped.
pub fn flatten(document: &Map<String, Value>) -> Vec<Field> {
    let mut fields = Vec::new();
    for (name, value) in document {
        flatten_value(name, value, &mut fields);
    }
    fields
}

fn flatten_value(path: &str, value: &Value, out: &mut Vec<Field>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push(Field::new(path, FieldValue::Text(b.to_string()))),
        Value::Number(n) => out.push(Field::new(path, FieldValue::Number(n.clone()))),
        Value::String(s) => out.push(Field::new(path, classify_string(s))),
        Value::Array(items) => {
            for item in items {
                flatten_value(path, item, out);
            }
        }
        Value::Object(map) => {
            for (name, child) in map {
                let child_path = format!("{}{}{}", path, PATH_SEPARATOR, name);
                flatten_value(&child_path, child, out);
            }
        }
    }
}

/// RFC3339 strings that fit the nanosecond range are date-times, the rest text
fn classify_string(s: &str) -> FieldValue {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) if dt.timestamp_nanos_opt().is_some() => {
            FieldValue::DateTime(dt.with_timezone(&Utc))
        }
        _ => FieldValue::Text(s.to_string()),
    }
}
