//! Graph requests and raw request-parameter decoding.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::filter::FieldFilters;
use crate::include::{IncludeNode, IncludeSpec};

/// A request for root entities plus related data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphRequest {
    /// Root entity type to query.
    pub entity: String,
    /// Equality filters on the root entity.
    #[serde(default, skip_serializing_if = "FieldFilters::is_empty")]
    pub filters: FieldFilters,
    /// Fields to project from the root entity (empty = all).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// Related entities to load.
    #[serde(default, skip_serializing_if = "IncludeSpec::is_empty")]
    pub include: IncludeSpec,
}

impl GraphRequest {
    /// Create a request for every row of an entity.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }

    /// Add a root equality filter.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<crate::Value>) -> Self {
        self.filters.insert(field, value);
        self
    }

    /// Set the root filters.
    pub fn with_filters(mut self, filters: FieldFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Set the root projection.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Include a relationship of the root entity.
    pub fn include(mut self, relation: impl Into<String>, node: IncludeNode) -> Self {
        self.include.insert(relation, node);
        self
    }

    /// Set the whole include specification.
    pub fn with_include(mut self, include: IncludeSpec) -> Self {
        self.include = include;
        self
    }

    /// Build a request from raw handler parameters.
    ///
    /// `filters` and `include` are JSON objects. `fields` is either a JSON
    /// array of names or a comma-separated list. Blank parameters are treated
    /// as absent.
    pub fn from_params(
        entity: impl Into<String>,
        filters: Option<&str>,
        fields: Option<&str>,
        include: Option<&str>,
    ) -> Result<Self, Error> {
        let entity = entity.into();
        if entity.is_empty() {
            return Err(Error::InvalidRequest("entity name is empty".into()));
        }

        let filters = match non_blank(filters) {
            Some(raw) => serde_json::from_str(raw).map_err(|source| Error::Json {
                param: "filters",
                source,
            })?,
            None => FieldFilters::new(),
        };

        let fields = match non_blank(fields) {
            Some(raw) => parse_field_list(raw)?,
            None => Vec::new(),
        };

        let include = match non_blank(include) {
            Some(raw) => serde_json::from_str(raw).map_err(|source| Error::Json {
                param: "include",
                source,
            })?,
            None => IncludeSpec::new(),
        };

        Ok(Self {
            entity,
            filters,
            fields,
            include,
        })
    }
}

/// Raw query-string parameters as an HTTP handler receives them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestParams {
    /// JSON object of root equality filters.
    #[serde(default)]
    pub filters: Option<String>,
    /// JSON array or comma-separated list of root fields.
    #[serde(default)]
    pub fields: Option<String>,
    /// JSON include specification.
    #[serde(default)]
    pub include: Option<String>,
}

impl RequestParams {
    /// Decode the parameters into a request for `entity`.
    pub fn into_request(self, entity: impl Into<String>) -> Result<GraphRequest, Error> {
        GraphRequest::from_params(
            entity,
            self.filters.as_deref(),
            self.fields.as_deref(),
            self.include.as_deref(),
        )
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_field_list(raw: &str) -> Result<Vec<String>, Error> {
    if raw.starts_with('[') {
        return serde_json::from_str(raw).map_err(|source| Error::Json {
            param: "fields",
            source,
        });
    }

    let fields: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(String::from)
        .collect();
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    #[test]
    fn test_from_params_full() {
        let request = GraphRequest::from_params(
            "Post",
            Some(r#"{"title": "Hello"}"#),
            Some("title, content"),
            Some(r#"{"user": {"fields": ["username"]}}"#),
        )
        .unwrap();

        assert_eq!(request.entity, "Post");
        assert_eq!(request.filters.get("title"), Some(&Value::String("Hello".into())));
        assert_eq!(request.fields, vec!["title", "content"]);
        assert!(request.include.get("user").is_some());
    }

    #[test]
    fn test_from_params_blank_is_absent() {
        let request = GraphRequest::from_params("User", Some("  "), None, Some("")).unwrap();
        assert!(request.filters.is_empty());
        assert!(request.fields.is_empty());
        assert!(request.include.is_empty());
    }

    #[test]
    fn test_fields_as_json_array() {
        let request = GraphRequest::from_params("User", None, Some(r#"["id","email"]"#), None)
            .unwrap();
        assert_eq!(request.fields, vec!["id", "email"]);
    }

    #[test]
    fn test_invalid_json_names_param() {
        let err = GraphRequest::from_params("User", None, None, Some("{posts")).unwrap_err();
        assert!(matches!(err, Error::Json { param: "include", .. }));
    }

    #[test]
    fn test_request_params_into_request() {
        let params = RequestParams {
            filters: Some(r#"{"username": "testuser1"}"#.into()),
            fields: None,
            include: Some(r#"{"posts": {}}"#.into()),
        };
        let request = params.into_request("User").unwrap();
        assert_eq!(request.include.len(), 1);
        assert_eq!(request.filters.len(), 1);
    }

    #[test]
    fn test_request_json_roundtrip() {
        let request = GraphRequest::new("Post")
            .filter("title", "x")
            .include("user", IncludeNode::new().with_fields(["username"]));
        let json = serde_json::to_string(&request).unwrap();
        let decoded: GraphRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request, decoded);
    }
}
