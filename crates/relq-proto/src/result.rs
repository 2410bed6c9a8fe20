//! Row and result types.

use rkyv::{Archive, Deserialize, Serialize};
use serde::{Deserialize as SerdeDeserialize, Serialize as SerdeSerialize};

use crate::error::Error;
use crate::value::Value;

/// A field name and value pair.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct FieldValue {
    /// Field name.
    pub field: String,
    /// Field value.
    pub value: Value,
}

impl FieldValue {
    /// Create a new field-value pair.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// A flat record of scalar fields, as stored by a data source.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize, SerdeSerialize, SerdeDeserialize)]
pub struct Row {
    /// Field values in storage order.
    pub fields: Vec<FieldValue>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, builder style.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Set a field, replacing any existing value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|fv| fv.field == field) {
            Some(existing) => existing.value = value,
            None => self.fields.push(FieldValue { field, value }),
        }
    }

    /// Get a field value by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|fv| fv.field == field)
            .map(|fv| &fv.value)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the row has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the named fields, in the given order.
    ///
    /// Names absent from the row are skipped rather than filled with nulls.
    pub fn project(&self, fields: &[String]) -> Row {
        let fields = fields
            .iter()
            .filter_map(|name| self.get(name).map(|v| FieldValue::new(name.clone(), v.clone())))
            .collect();
        Row { fields }
    }

    /// Serialize the row to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a row from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (field, value) in iter {
            row.set(field, value);
        }
        row
    }
}

/// Related data attached to a result row.
#[derive(Debug, Clone, PartialEq, SerdeSerialize, SerdeDeserialize)]
pub enum Related {
    /// A many-to-one relationship: the parent row, if any.
    One(Option<Box<ResultRow>>),
    /// A one-to-many relationship: every related row.
    Many(Vec<ResultRow>),
}

impl Related {
    /// The single related row, for many-to-one relationships.
    pub fn as_one(&self) -> Option<&ResultRow> {
        match self {
            Related::One(row) => row.as_deref(),
            Related::Many(_) => None,
        }
    }

    /// The related rows, for one-to-many relationships.
    pub fn as_many(&self) -> Option<&[ResultRow]> {
        match self {
            Related::Many(rows) => Some(rows),
            Related::One(_) => None,
        }
    }
}

/// A materialized entity with its eager-loaded relationships.
#[derive(Debug, Clone, PartialEq, SerdeSerialize, SerdeDeserialize)]
pub struct ResultRow {
    /// Entity type of this row.
    pub entity: String,
    /// Projected scalar fields.
    pub fields: Row,
    /// Loaded relationships in load order.
    pub relations: Vec<(String, Related)>,
}

impl ResultRow {
    /// Create a row with no relationships attached.
    pub fn new(entity: impl Into<String>, fields: Row) -> Self {
        Self {
            entity: entity.into(),
            fields,
            relations: Vec::new(),
        }
    }

    /// Get a scalar field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a loaded relationship.
    pub fn related(&self, relation: &str) -> Option<&Related> {
        self.relations
            .iter()
            .find(|(name, _)| name == relation)
            .map(|(_, related)| related)
    }

    /// Shorthand for a loaded many-to-one relationship.
    pub fn one(&self, relation: &str) -> Option<&ResultRow> {
        self.related(relation).and_then(Related::as_one)
    }

    /// Shorthand for a loaded one-to-many relationship.
    pub fn many(&self, relation: &str) -> Option<&[ResultRow]> {
        self.related(relation).and_then(Related::as_many)
    }

    /// Attach or replace a relationship.
    pub fn attach(&mut self, relation: impl Into<String>, related: Related) {
        let relation = relation.into();
        match self.relations.iter_mut().find(|(name, _)| *name == relation) {
            Some((_, existing)) => *existing = related,
            None => self.relations.push((relation, related)),
        }
    }

    /// Render as a nested JSON object: scalars first, then relationships as
    /// nested objects (or `null`) and arrays.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for fv in &self.fields.fields {
            object.insert(fv.field.clone(), fv.value.to_json());
        }
        for (name, related) in &self.relations {
            let rendered = match related {
                Related::One(Some(row)) => row.to_json(),
                Related::One(None) => serde_json::Value::Null,
                Related::Many(rows) => {
                    serde_json::Value::Array(rows.iter().map(ResultRow::to_json).collect())
                }
            };
            object.insert(name.clone(), rendered);
        }
        serde_json::Value::Object(object)
    }
}

/// The result of executing a query plan.
#[derive(Debug, Clone, PartialEq, Default, SerdeSerialize, SerdeDeserialize)]
pub struct QueryResult {
    /// Root entity type.
    pub entity: String,
    /// One row per distinct matching root entity.
    pub rows: Vec<ResultRow>,
}

impl QueryResult {
    /// Create a result.
    pub fn new(entity: impl Into<String>, rows: Vec<ResultRow>) -> Self {
        Self {
            entity: entity.into(),
            rows,
        }
    }

    /// Number of root rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no root matched.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render every root row as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.rows.iter().map(ResultRow::to_json).collect())
    }
}
