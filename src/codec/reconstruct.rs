//! Stored field list → client-facing field mapping

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::config::ReconstructPolicy;
use crate::error::{IndexError, Result};
use crate::models::{rfc3339_nano, FieldValue, StoredField};

/// Group stored fields by name and convert them back to JSON values.
///
/// Groups appear in first-seen order and values keep their archive order.
/// A name seen once maps to its bare value, a repeated name maps to an array.
pub fn reconstruct(stored: &[StoredField], policy: ReconstructPolicy) -> Result<Map<String, Value>> {
    let mut groups: Vec<(String, Vec<Value>)> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for field in stored {
        let Some(value) = decode_value(field, policy)? else {
            continue;
        };
        match slots.get(field.name.as_str()) {
            Some(&slot) => groups[slot].1.push(value),
            None => {
                slots.insert(field.name.as_str(), groups.len());
                groups.push((field.name.clone(), vec![value]));
            }
        }
    }

    let mut out = Map::with_capacity(groups.len());
    for (name, mut values) in groups {
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        };
        out.insert(name, value);
    }
    Ok(out)
}

fn decode_value(field: &StoredField, policy: ReconstructPolicy) -> Result<Option<Value>> {
    let Some(decoded) = field.decode() else {
        return match policy {
            ReconstructPolicy::DropInvalid => {
                warn!(
                    field = %field.name,
                    kind = ?field.kind,
                    "dropping stored value that no longer decodes"
                );
                Ok(None)
            }
            ReconstructPolicy::Strict => Err(IndexError::StorageUnavailable(format!(
                "stored {:?} value of field '{}' is malformed",
                field.kind, field.name
            ))),
        };
    };

    let value = match decoded.value {
        FieldValue::Text(s) => Value::String(s),
        FieldValue::Number(n) => Value::Number(n),
        FieldValue::DateTime(dt) => Value::String(rfc3339_nano(&dt)),
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::flatten;
    use crate::models::FieldKind;
    use serde_json::json;

    fn stored_of(value: Value) -> Vec<StoredField> {
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        flatten(&map).iter().map(|f| f.to_stored()).collect()
    }

    #[test]
    fn test_single_values_map_directly() {
        let stored = stored_of(json!({"title": "red fox", "views": 3}));
        let fields = reconstruct(&stored, ReconstructPolicy::DropInvalid).unwrap();
        assert_eq!(Value::Object(fields), json!({"title": "red fox", "views": 3}));
    }

    #[test]
    fn test_repeated_names_become_ordered_arrays() {
        let stored = stored_of(json!({"tags": ["x", "y"], "n": [1, 2.5]}));
        let fields = reconstruct(&stored, ReconstructPolicy::DropInvalid).unwrap();
        assert_eq!(fields["tags"], json!(["x", "y"]));
        assert_eq!(fields["n"], json!([1, 2.5]));
    }

    #[test]
    fn test_groups_keep_first_seen_order() {
        let stored = vec![
            StoredField { name: "b".into(), kind: FieldKind::Text, encoded: "1".into() },
            StoredField { name: "a".into(), kind: FieldKind::Text, encoded: "2".into() },
            StoredField { name: "b".into(), kind: FieldKind::Text, encoded: "3".into() },
        ];
        let fields = reconstruct(&stored, ReconstructPolicy::DropInvalid).unwrap();
        let names: Vec<&String> = fields.keys().collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(fields["b"], json!(["1", "3"]));
    }

    #[test]
    fn test_datetimes_render_as_rfc3339_utc() {
        let stored = stored_of(json!({"at": "2024-01-02T05:04:05.250+02:00"}));
        let fields = reconstruct(&stored, ReconstructPolicy::DropInvalid).unwrap();
        assert_eq!(fields["at"], json!("2024-01-02T03:04:05.25Z"));
    }

    #[test]
    fn test_malformed_number_is_dropped_by_default() {
        let stored = vec![
            StoredField { name: "n".into(), kind: FieldKind::Number, encoded: "1".into() },
            StoredField { name: "n".into(), kind: FieldKind::Number, encoded: "not-a-number".into() },
            StoredField { name: "t".into(), kind: FieldKind::Text, encoded: "kept".into() },
        ];
        let fields = reconstruct(&stored, ReconstructPolicy::DropInvalid).unwrap();
        assert_eq!(Value::Object(fields), json!({"n": 1, "t": "kept"}));
    }

    #[test]
    fn test_malformed_number_fails_under_strict_policy() {
        let stored = vec![StoredField {
            name: "n".into(),
            kind: FieldKind::Number,
            encoded: "1e".into(),
        }];
        let err = reconstruct(&stored, ReconstructPolicy::Strict).unwrap_err();
        assert!(matches!(err, IndexError::StorageUnavailable(_)));
    }
}
