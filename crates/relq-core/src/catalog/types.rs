//! Core type definitions for the catalog.

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// Scalar data types a field may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// UUID (128-bit identifier).
    Uuid,
    /// Opaque JSON document, stored as a string.
    Json,
}

impl ScalarType {
    /// Map a model-spec column type name to a scalar type.
    ///
    /// Names are matched case-insensitively; `None` for unknown names.
    pub fn from_model_name(name: &str) -> Option<Self> {
        let scalar = match name.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => ScalarType::Bool,
            "smallinteger" | "int32" => ScalarType::Int32,
            "integer" | "biginteger" | "int" | "int64" => ScalarType::Int64,
            "float" | "numeric" | "double" | "float64" => ScalarType::Float64,
            "string" | "text" | "unicode" | "unicodetext" => ScalarType::String,
            "largebinary" | "binary" | "bytes" => ScalarType::Bytes,
            "datetime" | "timestamp" | "date" => ScalarType::Timestamp,
            "uuid" => ScalarType::Uuid,
            "json" | "jsonb" => ScalarType::Json,
            _ => return None,
        };
        Some(scalar)
    }

    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int32 | ScalarType::Int64 | ScalarType::Float64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_names() {
        assert_eq!(ScalarType::from_model_name("Integer"), Some(ScalarType::Int64));
        assert_eq!(ScalarType::from_model_name("String"), Some(ScalarType::String));
        assert_eq!(ScalarType::from_model_name("JSON"), Some(ScalarType::Json));
        assert_eq!(ScalarType::from_model_name("Float"), Some(ScalarType::Float64));
        assert_eq!(ScalarType::from_model_name("Geometry"), None);
    }

    #[test]
    fn test_numeric() {
        assert!(ScalarType::Int64.is_numeric());
        assert!(!ScalarType::String.is_numeric());
    }
}
