//! Field definitions for entities.

use super::types::ScalarType;
use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// A scalar field within an entity.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Field data type.
    pub scalar: ScalarType,
    /// Whether the field accepts null.
    pub nullable: bool,
    /// Maximum length for string fields, if bounded.
    pub max_length: Option<u32>,
    /// Entity and field this field references, if it is a foreign key.
    pub references: Option<ForeignKey>,
}

/// Target of a foreign-key field.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct ForeignKey {
    /// Referenced entity name.
    pub entity: String,
    /// Referenced field name.
    pub field: String,
}

impl FieldDef {
    /// Create a new non-nullable field.
    pub fn new(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar,
            nullable: false,
            max_length: None,
            references: None,
        }
    }

    /// Create a nullable field.
    pub fn optional(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, scalar)
        }
    }

    /// Bound the length of a string field.
    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Mark this field as a foreign key to `entity.field`.
    pub fn references(mut self, entity: impl Into<String>, field: impl Into<String>) -> Self {
        self.references = Some(ForeignKey {
            entity: entity.into(),
            field: field.into(),
        });
        self
    }

    /// Check if this field is a foreign key.
    pub fn is_foreign_key(&self) -> bool {
        self.references.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_def_builder() {
        let field = FieldDef::new("user_id", ScalarType::Int64).references("User", "id");

        assert_eq!(field.name, "user_id");
        assert!(!field.nullable);
        assert!(field.is_foreign_key());
        assert_eq!(field.references.as_ref().map(|fk| fk.entity.as_str()), Some("User"));
    }

    #[test]
    fn test_optional_field() {
        let field = FieldDef::optional("bio", ScalarType::String).with_max_length(280);

        assert!(field.nullable);
        assert_eq!(field.max_length, Some(280));
        assert!(!field.is_foreign_key());
    }
}
