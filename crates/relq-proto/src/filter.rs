//! Equality predicates keyed by field name.

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;

use crate::value::Value;

/// A single `field = value` predicate.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Predicate {
    /// Field the predicate constrains.
    pub field: String,
    /// Value the field must equal.
    pub value: Value,
}

impl Predicate {
    /// Create an equality predicate.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Evaluate the predicate against a looked-up field value.
    ///
    /// A missing field never matches.
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        actual.map(|v| v.matches(&self.value)).unwrap_or(false)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.field, self.value.to_json())
    }
}

/// A conjunction of equality predicates in caller-supplied order.
///
/// Behaves like an insertion-ordered map: inserting a field that is already
/// present replaces its value but keeps its original position.
#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize)]
pub struct FieldFilters {
    predicates: Vec<Predicate>,
}

impl FieldFilters {
    /// Create an empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate, replacing any existing one on the same field.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.predicates.iter_mut().find(|p| p.field == field) {
            Some(existing) => existing.value = value,
            None => self.predicates.push(Predicate { field, value }),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Number of predicates.
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// True when there are no predicates.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Iterate over predicates in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Predicate> {
        self.predicates.iter()
    }

    /// Field names referenced, in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.predicates.iter().map(|p| p.field.as_str())
    }

    /// Look up the value required for a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.predicates
            .iter()
            .find(|p| p.field == field)
            .map(|p| &p.value)
    }

    /// Evaluate every predicate against a row lookup. Empty filters match.
    pub fn matches<'a, F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<&'a Value>,
    {
        self.predicates.iter().all(|p| p.matches(lookup(&p.field)))
    }
}

impl<'a> IntoIterator for &'a FieldFilters {
    type Item = &'a Predicate;
    type IntoIter = std::slice::Iter<'a, Predicate>;

    fn into_iter(self) -> Self::IntoIter {
        self.predicates.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FieldFilters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut filters = FieldFilters::new();
        for (field, value) in iter {
            filters.insert(field, value);
        }
        filters
    }
}

impl serde::Serialize for FieldFilters {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.predicates.len()))?;
        for predicate in &self.predicates {
            map.serialize_entry(&predicate.field, &predicate.value.to_json())?;
        }
        map.end()
    }
}

impl<'de> serde::Deserialize<'de> for FieldFilters {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FieldFiltersVisitor)
    }
}

struct FieldFiltersVisitor;

impl<'de> Visitor<'de> for FieldFiltersVisitor {
    type Value = FieldFilters;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object mapping field names to scalar values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut filters = FieldFilters::new();
        while let Some((field, json)) = access.next_entry::<String, serde_json::Value>()? {
            let value = Value::from_json(&field, &json).map_err(serde::de::Error::custom)?;
            filters.insert(field, value);
        }
        Ok(filters)
    }
}
