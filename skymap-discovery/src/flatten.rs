//! Property flattening applied before every upsert.
//!
//! Rules:
//! - nested objects flatten into `_`-joined keys (`Logging_Bucket`)
//! - arrays of scalars stay arrays
//! - arrays holding objects, arrays or nulls become JSON text
//! - `null` becomes `""`, so the key is always present
//!
//! The output depends only on the input, which keeps re-projection idempotent.

use crate::record::ResourceRecord;
use serde_json::{Map, Value};
use skymap_graph::{Properties, PropertyValue};

/// Flatten a raw property map into graph properties.
pub fn flatten_properties(properties: &Map<String, Value>) -> Properties {
    let mut out = Properties::new();
    for (key, value) in properties {
        flatten_into(&mut out, key, value);
    }
    out
}

fn flatten_into(out: &mut Properties, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(out, &format!("{prefix}_{key}"), nested);
            }
        }
        Value::Array(items) => {
            let scalars: Option<Vec<PropertyValue>> = items.iter().map(scalar).collect();
            let flattened = match scalars {
                Some(list) => PropertyValue::List(list),
                None => PropertyValue::String(value.to_string()),
            };
            out.insert(prefix.to_string(), flattened);
        }
        Value::Null => {
            out.insert(prefix.to_string(), PropertyValue::String(String::new()));
        }
        other => {
            if let Some(v) = scalar(other) {
                out.insert(prefix.to_string(), v);
            }
        }
    }
}

fn scalar(value: &Value) -> Option<PropertyValue> {
    match value {
        Value::String(s) => Some(PropertyValue::String(s.clone())),
        Value::Bool(b) => Some(PropertyValue::Boolean(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(PropertyValue::Integer(i)),
            None => n.as_f64().map(PropertyValue::Float),
        },
        _ => None,
    }
}

/// Full node property map for a record.
///
/// Flattened provider properties come first; the canonical fields
/// (`arn`, `identifier`, `resource_type`, `service`, `account_id`, `region`)
/// are written last and win on collision. Records of global services never
/// carry `region`; region-scoped records always do, even when empty.
pub fn node_properties(record: &ResourceRecord, account: &str) -> Properties {
    let mut props = flatten_properties(&record.properties);

    if !record.global_ref.is_empty() {
        props.insert("arn".into(), record.global_ref.as_str().into());
    }
    props.insert("identifier".into(), record.id.as_str().into());
    props.insert("resource_type".into(), record.resource_type.as_str().into());
    props.insert("service".into(), record.service().into());
    props.insert("account_id".into(), account.into());

    if record.is_global_service() {
        props.remove("region");
    } else {
        props.insert("region".into(), record.region.as_str().into());
    }
    props
}
