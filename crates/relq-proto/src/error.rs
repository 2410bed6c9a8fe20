//! Protocol error types.

use thiserror::Error;

/// Errors raised while decoding requests or converting values.
#[derive(Debug, Error)]
pub enum Error {
    /// A request parameter was not valid JSON.
    #[error("invalid JSON in '{param}': {source}")]
    Json {
        /// Name of the offending parameter.
        param: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A request parameter had the wrong shape.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A JSON value cannot be used as a scalar.
    #[error("unsupported value for field '{field}': {found}")]
    UnsupportedValue {
        /// Field the value was supplied for.
        field: String,
        /// Short description of the JSON type found.
        found: &'static str,
    },

    /// Archiving or unarchiving a value failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}
