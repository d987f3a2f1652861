//! The data side of a render: a JSON tree with a `header` object and an
//! `items` array, addressed by dotted paths.

use std::borrow::Cow;

use serde_json::{Map, Value};

use crate::error::PayloadError;

/// Validated render payload. Immutable for the duration of a render.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    root: Value,
}

impl Payload {
    pub fn from_json_str(input: &str) -> Result<Self, PayloadError> {
        let root: Value = serde_json::from_str(input).map_err(|e| PayloadError::Json(e.to_string()))?;
        Self::from_value(root)
    }

    /// Check the shape: an object with a `header` object and, if present,
    /// an `items` array of objects. `items: null` counts as no items.
    pub fn from_value(root: Value) -> Result<Self, PayloadError> {
        let obj = root.as_object().ok_or(PayloadError::NotAnObject)?;
        match obj.get("header") {
            None => return Err(PayloadError::MissingHeader),
            Some(Value::Object(_)) => {}
            Some(_) => return Err(PayloadError::HeaderNotObject),
        }
        match obj.get("items") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                if let Some(index) = items.iter().position(|item| !item.is_object()) {
                    return Err(PayloadError::ItemNotObject { index });
                }
            }
            Some(_) => return Err(PayloadError::ItemsNotArray),
        }
        Ok(Self { root })
    }

    pub fn header(&self) -> &Map<String, Value> {
        static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
        self.root
            .get("header")
            .and_then(Value::as_object)
            .unwrap_or_else(|| EMPTY.get_or_init(Map::new))
    }

    /// Line items in order; empty when `items` is absent
    pub fn items(&self) -> &[Value] {
        self.root
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve a dotted path (`header.client`, `items.0.title`) from the root
    pub fn resolve_path(&self, path: &str) -> Option<&Value> {
        resolve_in(&self.root, path)
    }
}

/// Walk `path` one `.`-separated segment at a time. Objects look segments up
/// as keys, arrays accept a numeric index. Any miss is `None`.
pub fn resolve_in<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Text a value renders as inside a cell.
///
/// Strings verbatim, integral numbers without a decimal point, booleans in
/// lowercase, `null` as nothing, arrays and objects as compact JSON.
pub fn value_to_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cow::Owned(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Cow::Owned(u.to_string())
            } else {
                let f = n.as_f64().unwrap_or(0.0);
                Cow::Owned(fillgrid_engine::cell::format_number(f))
            }
        }
        Value::Array(_) | Value::Object(_) => Cow::Owned(value.to_string()),
    }
}

/// Numeric reading of an item field: numbers as-is, numeric strings parsed
/// (thousands separators allowed), anything else `None`
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}
