//! JSON documents.
//!
//! A top-level object is one record, a top-level array holds one record
//! per element. Nested objects flatten to dotted names
//! (`{"deaths": {"total": 3}}` gives `deaths.total = "3"`).

use crate::models::{Origin, RawRecord};
use serde_json::Value;
use std::collections::BTreeMap;

pub(super) fn parse_documents(text: &str, source: &str) -> Vec<RawRecord> {
    let document: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            return vec![RawRecord::malformed(
                Origin::new(source, 1),
                format!("invalid JSON: {}", e),
            )]
        }
    };

    match document {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| to_record(item, Origin::new(source, idx + 1)))
            .collect(),
        other => vec![to_record(other, Origin::new(source, 1))],
    }
}

fn to_record(value: Value, origin: Origin) -> RawRecord {
    if !value.is_object() {
        return RawRecord::malformed(origin, format!("expected an object, found {}", kind(&value)));
    }
    let mut fields = BTreeMap::new();
    flatten("", &value, &mut fields);
    RawRecord::fields(origin, fields)
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let name = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&name, child, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        // Null and arrays carry no scalar value
        Value::Null | Value::Array(_) => {}
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
