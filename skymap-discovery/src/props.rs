//! Typed accessors over raw JSON-shaped provider properties.
//!
//! Resource properties are never modeled per type. Code that needs a field
//! asks for it at the point of use and gets an empty value when it is absent.

use serde_json::{Map, Value};

/// String at `key`, or `""` when missing or not a string.
pub fn str_at<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// String at a nested path, or `""`.
pub fn nested_str<'a>(value: &'a Value, path: &[&str]) -> &'a str {
    let mut current = value;
    for key in path {
        match current.get(*key) {
            Some(next) => current = next,
            None => return "",
        }
    }
    current.as_str().unwrap_or("")
}

/// Array at `key`, or an empty slice.
pub fn array_at<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Render a scalar as a string: strings as-is, numbers and booleans via
/// their JSON text. Anything else yields `None`.
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Builds a property map from selected fields, skipping empty ones.
#[derive(Debug, Default, Clone)]
pub struct FieldMap {
    inner: Map<String, Value>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` unless `value` is null, an empty string or an empty container.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !is_empty(&value) {
            self.inner.insert(name.to_string(), value);
        }
        self
    }

    /// Copy `source[key]` into `name`, skipping empty values.
    pub fn copy(self, name: &str, source: &Value, key: &str) -> Self {
        match source.get(key) {
            Some(v) => self.set(name, v.clone()),
            None => self,
        }
    }

    /// Copy the value at a nested path into `name`, skipping empty values.
    pub fn copy_nested(self, name: &str, source: &Value, path: &[&str]) -> Self {
        let mut current = source;
        for key in path {
            match current.get(*key) {
                Some(next) => current = next,
                None => return self,
            }
        }
        self.set(name, current.clone())
    }

    pub fn build(self) -> Map<String, Value> {
        self.inner
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
