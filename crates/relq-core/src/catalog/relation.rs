//! Relationship definitions between entities.

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

/// Cardinality of a relationship, seen from its source entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub enum Cardinality {
    /// Each source row relates to many target rows (foreign key on the target).
    OneToMany,
    /// Each source row relates to at most one target row (foreign key on the source).
    ManyToOne,
}

/// A named, directed relationship from one entity to another.
///
/// A target row is related to a source row when
/// `target.to_field == source.from_field`.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct RelationDef {
    /// Relationship name (unique within its source entity).
    pub name: String,
    /// Source entity name.
    pub from_entity: String,
    /// Target entity name.
    pub to_entity: String,
    /// Relationship cardinality.
    pub cardinality: Cardinality,
    /// Linking field on the source entity.
    pub from_field: String,
    /// Linking field on the target entity.
    pub to_field: String,
    /// Name of the inverse relationship on the target entity, if any.
    pub back_reference: Option<String>,
}

impl RelationDef {
    /// Create a one-to-many relationship.
    pub fn one_to_many(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            cardinality: Cardinality::OneToMany,
            from_field: from_field.into(),
            to_field: to_field.into(),
            back_reference: None,
        }
    }

    /// Create a many-to-one relationship.
    pub fn many_to_one(
        name: impl Into<String>,
        from_entity: impl Into<String>,
        from_field: impl Into<String>,
        to_entity: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            cardinality: Cardinality::ManyToOne,
            from_field: from_field.into(),
            to_field: to_field.into(),
            back_reference: None,
        }
    }

    /// Name the inverse relationship on the target entity.
    pub fn with_back_reference(mut self, back_reference: impl Into<String>) -> Self {
        self.back_reference = Some(back_reference.into());
        self
    }

    /// Check if each source row relates to many target rows.
    pub fn is_collection(&self) -> bool {
        self.cardinality == Cardinality::OneToMany
    }

    /// Get the inverse relationship (swapping source and target).
    pub fn inverse(&self, name: impl Into<String>) -> Self {
        let cardinality = match self.cardinality {
            Cardinality::OneToMany => Cardinality::ManyToOne,
            Cardinality::ManyToOne => Cardinality::OneToMany,
        };
        Self {
            name: name.into(),
            from_entity: self.to_entity.clone(),
            to_entity: self.from_entity.clone(),
            cardinality,
            from_field: self.to_field.clone(),
            to_field: self.from_field.clone(),
            back_reference: Some(self.name.clone()),
        }
    }
}
