//! Metadata values attached to vectors
//!
//! Metadata is an opaque string-keyed map whose values are scalars. The
//! variant is part of the value: an `Integer(7)` written to disk comes back
//! as `Integer(7)`, never as `Float(7.0)` or `String("7")`.

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};
use std::collections::BTreeMap;

/// One metadata record, parallel to one vector
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    /// UTF-8 string
    String(String),
    /// Signed integer
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Boolean
    Bool(bool),
}

impl MetadataValue {
    /// Get the string value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the numeric value as f64, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Integer(n) => Some(*n as f64),
            MetadataValue::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Convert a JSON scalar
    ///
    /// Returns `None` for null, arrays, objects and unsigned integers that
    /// do not fit in an i64.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) => Some(MetadataValue::String(s.clone())),
            JsonValue::Bool(b) => Some(MetadataValue::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(MetadataValue::Integer(i))
                } else if n.is_u64() {
                    None
                } else {
                    n.as_f64().map(MetadataValue::Float)
                }
            }
            JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }

    /// Convert to a JSON value
    ///
    /// Non-finite floats have no JSON representation and become null.
    pub fn to_json(&self) -> JsonValue {
        match self {
            MetadataValue::String(s) => JsonValue::String(s.clone()),
            MetadataValue::Integer(n) => JsonValue::Number((*n).into()),
            MetadataValue::Float(n) => JsonNumber::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            MetadataValue::Bool(b) => JsonValue::Bool(*b),
        }
    }
}

/// Convert a JSON object into a metadata record
///
/// Returns `None` if the value is not an object or any field is not a
/// supported scalar.
pub fn metadata_from_json(value: &JsonValue) -> Option<Metadata> {
    let obj = value.as_object()?;
    obj.iter()
        .map(|(k, v)| MetadataValue::from_json(v).map(|mv| (k.clone(), mv)))
        .collect()
}

/// Convert a metadata record into a JSON object
pub fn metadata_to_json(metadata: &Metadata) -> JsonValue {
    let obj: JsonMap<String, JsonValue> = metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    JsonValue::Object(obj)
}

// Convenience conversions
impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        MetadataValue::Integer(n)
    }
}

impl From<i32> for MetadataValue {
    fn from(n: i32) -> Self {
        MetadataValue::Integer(n as i64)
    }
}

impl From<f64> for MetadataValue {
    fn from(n: f64) -> Self {
        MetadataValue::Float(n)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}
