//! Core error types.

use std::time::Duration;

use thiserror::Error;

use crate::source::SourceError;

/// Location reported for errors on the root entity rather than an include path.
pub const ROOT_LOCATION: &str = "<root>";

/// A request that does not fit the entity graph.
///
/// Raised while building a plan, before any data source is touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The entity is not registered.
    #[error("unknown entity '{entity}'")]
    UnknownEntity { entity: String },

    /// The entity has no relationship with this name.
    #[error("unknown relationship '{relation}' on entity '{entity}'")]
    UnknownRelationship { entity: String, relation: String },

    /// The entity has no scalar field with this name.
    #[error("unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },

    /// The include path nests deeper than the budget allows.
    #[error("include depth {depth} exceeds maximum allowed depth {max_depth}")]
    DepthExceeded { depth: usize, max_depth: usize },
}

/// Core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The request failed validation at `location` (`<root>` or a dotted path).
    #[error("validation failed at {location}: {source}")]
    Validation {
        location: String,
        #[source]
        source: ValidationError,
    },

    /// The data source failed; no partial result is returned.
    #[error("execution error: {0}")]
    Execution(#[from] SourceError),

    /// Execution was cancelled by the caller.
    #[error("query cancelled")]
    Cancelled,

    /// Execution ran past its deadline.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// Execution would exceed the fanout budget.
    #[error("budget exceeded: {0}")]
    Budget(String),

    /// Entity metadata is inconsistent or malformed.
    #[error("schema error: {0}")]
    Schema(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] relq_proto::Error),
}

impl Error {
    /// Wrap a validation error raised at `location`.
    pub fn validation(location: impl Into<String>, source: ValidationError) -> Self {
        Error::Validation {
            location: location.into(),
            source,
        }
    }

    /// Wrap a validation error raised on the root entity.
    pub fn at_root(source: ValidationError) -> Self {
        Self::validation(ROOT_LOCATION, source)
    }

    /// The underlying validation error, if this is one.
    pub fn validation_error(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Where validation failed, if this is a validation error.
    pub fn location(&self) -> Option<&str> {
        match self {
            Error::Validation { location, .. } => Some(location),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_location_and_field() {
        let err = Error::validation(
            "user",
            ValidationError::UnknownField {
                entity: "User".into(),
                field: "nickname".into(),
            },
        );
        assert_eq!(
            err.to_string(),
            "validation failed at user: unknown field 'nickname' on entity 'User'"
        );
        assert_eq!(err.location(), Some("user"));
        assert!(err.validation_error().is_some());
    }

    #[test]
    fn test_non_validation_errors_have_no_location() {
        assert!(Error::Cancelled.location().is_none());
        assert!(Error::Budget("x".into()).validation_error().is_none());
    }
}
