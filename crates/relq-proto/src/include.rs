//! Nested include specifications.
//!
//! An include specification is a finite tree keyed by relationship name.
//! Every node may constrain the related entities with equality filters,
//! project them to a field subset, and include further relationships.
//!
//! ```json
//! {
//!   "posts": {
//!     "fields": ["title"],
//!     "include": { "comments": { "filters": { "approved": true } } }
//!   }
//! }
//! ```
//!
//! Entry order is significant: it determines the order of flattened paths and
//! therefore the order in which related collections are loaded.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};

use crate::filter::FieldFilters;

/// An insertion-ordered mapping from relationship name to [`IncludeNode`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IncludeSpec {
    entries: Vec<(String, IncludeNode)>,
}

/// One relationship to include, with its own filters, projection and children.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IncludeNode {
    /// Equality filters on the related entity.
    #[serde(skip_serializing_if = "FieldFilters::is_empty")]
    pub filters: FieldFilters,
    /// Fields to project from the related entity (empty = all).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// Relationships to include from the related entity.
    #[serde(skip_serializing_if = "IncludeSpec::is_empty")]
    pub include: IncludeSpec,
}

impl IncludeSpec {
    /// Create an empty specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a relationship, replacing an existing entry with the same name
    /// while keeping its position.
    pub fn insert(&mut self, relation: impl Into<String>, node: IncludeNode) {
        let relation = relation.into();
        match self.entries.iter_mut().find(|(name, _)| *name == relation) {
            Some((_, existing)) => *existing = node,
            None => self.entries.push((relation, node)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, relation: impl Into<String>, node: IncludeNode) -> Self {
        self.insert(relation, node);
        self
    }

    /// Number of top-level entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is included.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a top-level entry.
    pub fn get(&self, relation: &str) -> Option<&IncludeNode> {
        self.entries
            .iter()
            .find(|(name, _)| name == relation)
            .map(|(_, node)| node)
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IncludeNode)> {
        self.entries.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Total number of relationship nodes in the tree, nested ones included.
    pub fn node_count(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, node)| 1 + node.include.node_count())
            .sum()
    }

    /// Depth of the deepest relationship node (0 for an empty spec).
    pub fn depth(&self) -> usize {
        self.entries
            .iter()
            .map(|(_, node)| 1 + node.include.depth())
            .max()
            .unwrap_or(0)
    }
}

impl IncludeNode {
    /// Create a node with no filters, projection or children.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the equality filters.
    pub fn with_filters(mut self, filters: FieldFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Add a single equality filter.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<crate::Value>) -> Self {
        self.filters.insert(field, value);
        self
    }

    /// Set the projected fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Include a nested relationship.
    pub fn include(mut self, relation: impl Into<String>, node: IncludeNode) -> Self {
        self.include.insert(relation, node);
        self
    }
}

impl Serialize for IncludeSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, node) in &self.entries {
            map.serialize_entry(name, node)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for IncludeSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(IncludeSpecVisitor)
    }
}

struct IncludeSpecVisitor;

impl<'de> Visitor<'de> for IncludeSpecVisitor {
    type Value = IncludeSpec;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object mapping relationship names to include nodes")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut spec = IncludeSpec::new();
        while let Some((name, node)) = access.next_entry::<String, IncludeNode>()? {
            if name.is_empty() || name.contains('.') {
                return Err(serde::de::Error::custom(format!(
                    "invalid relationship name '{name}'"
                )));
            }
            spec.insert(name, node);
        }
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_counts() {
        let spec = IncludeSpec::new()
            .with(
                "posts",
                IncludeNode::new()
                    .with_fields(["title"])
                    .include("comments", IncludeNode::new().filter("approved", true)),
            )
            .with("profile", IncludeNode::new());

        assert_eq!(spec.len(), 2);
        assert_eq!(spec.node_count(), 3);
        assert_eq!(spec.depth(), 2);
        assert_eq!(spec.get("posts").map(|n| n.fields.len()), Some(1));
    }

    #[test]
    fn test_deserialize_nested_spec_in_order() {
        let spec: IncludeSpec = serde_json::from_str(
            r#"{
                "user": {"filters": {"username": "alice"}, "fields": ["username"]},
                "comments": {"include": {"author": {}}}
            }"#,
        )
        .unwrap();

        let names: Vec<&str> = spec.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["user", "comments"]);

        let user = spec.get("user").unwrap();
        assert_eq!(user.fields, vec!["username".to_string()]);
        assert_eq!(user.filters.len(), 1);
        assert!(spec.get("comments").unwrap().include.get("author").is_some());
    }

    #[test]
    fn test_deserialize_rejects_unknown_node_keys() {
        let result: Result<IncludeSpec, _> =
            serde_json::from_str(r#"{"user": {"filter": {"username": "alice"}}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_dotted_names() {
        let result: Result<IncludeSpec, _> = serde_json::from_str(r#"{"user.posts": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_skips_empty_parts() {
        let spec = IncludeSpec::new().with("user", IncludeNode::new().with_fields(["username"]));
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, r#"{"user":{"fields":["username"]}}"#);
    }
}
