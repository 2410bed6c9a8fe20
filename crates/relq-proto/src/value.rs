//! Runtime scalar values used in filters and result rows.

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use crate::error::Error;

/// A scalar value that can appear in a predicate or a result row.
///
/// Only scalars are representable: relationships are never stored as values,
/// they are attached to result rows separately.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// UUID as 16 bytes.
    Uuid([u8; 16]),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64, widening 32-bit integers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            Value::Int32(i) => Some(*i as i64),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(f) => Some(*f),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as UUID.
    pub fn as_uuid(&self) -> Option<&[u8; 16]> {
        match self {
            Value::Uuid(u) => Some(u),
            _ => None,
        }
    }

    /// Exact integer value of an integer, or of an integral float in `i64` range.
    pub fn as_exact_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(_) | Value::Int64(_) => self.as_i64(),
            Value::Float64(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(*f as i64),
            _ => None,
        }
    }

    /// Equality as used by filter predicates and joins.
    ///
    /// Numbers compare exactly: integers across widths, and a float equals an
    /// integer only when it is integral. A UUID matches its lowercase hex
    /// rendering so that identifiers arriving as JSON strings still match.
    /// `Null` only matches `Null`.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (
                Value::Int32(_) | Value::Int64(_) | Value::Float64(_),
                Value::Int32(_) | Value::Int64(_) | Value::Float64(_),
            ) => self
                .as_exact_i64()
                .is_some_and(|a| other.as_exact_i64() == Some(a)),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Uuid(u), Value::String(s)) | (Value::String(s), Value::Uuid(u)) => {
                hex::encode(u) == *s
            }
            _ => false,
        }
    }

    /// Convert a JSON scalar into a value.
    ///
    /// Integral numbers become `Int64`, other numbers `Float64`. Arrays and
    /// objects are rejected; `field` only names the culprit in the error.
    pub fn from_json(field: &str, json: &serde_json::Value) -> Result<Self, Error> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Int64(i)),
                None => n.as_f64().map(Value::Float64).ok_or(Error::UnsupportedValue {
                    field: field.to_string(),
                    found: "number",
                }),
            },
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Array(_) => Err(Error::UnsupportedValue {
                field: field.to_string(),
                found: "array",
            }),
            serde_json::Value::Object(_) => Err(Error::UnsupportedValue {
                field: field.to_string(),
                found: "object",
            }),
        }
    }

    /// Render this value as JSON.
    ///
    /// Bytes and UUIDs are rendered as lowercase hex strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int32(i) => serde_json::json!(i),
            Value::Int64(i) => serde_json::json!(i),
            Value::Float64(f) => serde_json::json!(f),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(hex::encode(b)),
            Value::Timestamp(t) => serde_json::json!(t),
            Value::Uuid(u) => serde_json::Value::String(hex::encode(u)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<[u8; 16]> for Value {
    fn from(v: [u8; 16]) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        let v: Value = true.into();
        assert_eq!(v, Value::Bool(true));

        let v: Value = "hello".into();
        assert_eq!(v, Value::String("hello".into()));

        let v: Value = None::<i32>.into();
        assert_eq!(v, Value::Null);

        let v: Value = Some(42i32).into();
        assert_eq!(v, Value::Int32(42));
    }

    #[test]
    fn test_matches_widens_integers() {
        assert!(Value::Int32(7).matches(&Value::Int64(7)));
        assert!(Value::Int64(7).matches(&Value::Int32(7)));
        assert!(Value::Float64(2.0).matches(&Value::Int64(2)));
        assert!(!Value::Int32(7).matches(&Value::String("7".into())));
    }

    #[test]
    fn test_matches_compares_numbers_exactly() {
        let big = (1i64 << 53) + 1;
        assert!(!Value::Int64(big).matches(&Value::Float64((1i64 << 53) as f64)));
        assert!(!Value::Float64(2.5).matches(&Value::Int64(2)));
        assert!(Value::Float64(-0.0).matches(&Value::Int32(0)));
        assert!(!Value::Float64(f64::NAN).matches(&Value::Float64(f64::NAN)));
    }

    #[test]
    fn test_matches_uuid_against_hex() {
        let id = [0xabu8; 16];
        let hex = "ab".repeat(16);
        assert!(Value::Uuid(id).matches(&Value::String(hex.clone())));
        assert!(Value::String(hex.clone()).matches(&Value::Uuid(id)));
        assert!(!Value::String(hex.to_uppercase()).matches(&Value::Uuid(id)));
    }

    #[test]
    fn test_null_only_matches_null() {
        assert!(Value::Null.matches(&Value::Null));
        assert!(!Value::Null.matches(&Value::Int32(0)));
        assert!(!Value::String(String::new()).matches(&Value::Null));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Value::from_json("a", &serde_json::json!(5)).unwrap(), Value::Int64(5));
        assert_eq!(
            Value::from_json("a", &serde_json::json!(1.5)).unwrap(),
            Value::Float64(1.5)
        );
        assert_eq!(
            Value::from_json("a", &serde_json::json!("alice")).unwrap(),
            Value::String("alice".into())
        );

        let err = Value::from_json("tags", &serde_json::json!(["x"])).unwrap_err();
        assert!(err.to_string().contains("tags"));
    }

    #[test]
    fn test_value_archive_roundtrip() {
        let value = Value::Uuid([3u8; 16]);
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&value).unwrap();
        let archived = rkyv::access::<ArchivedValue, rkyv::rancor::Error>(&bytes).unwrap();
        let deserialized: Value =
            rkyv::deserialize::<Value, rkyv::rancor::Error>(archived).unwrap();
        assert_eq!(value, deserialized);
    }
}
