//! Facade error types.

use thiserror::Error;

/// Errors returned by the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Planning or execution error.
    #[error("{0}")]
    Core(#[from] relq_core::Error),

    /// Malformed request parameters.
    #[error("invalid request: {0}")]
    Protocol(#[from] relq_proto::Error),

    /// The async runtime failed to run the query.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// The validation error, if the request did not fit the entity graph.
    pub fn validation_error(&self) -> Option<&relq_core::ValidationError> {
        match self {
            Error::Core(err) => err.validation_error(),
            _ => None,
        }
    }

    /// Check if the query ran past its timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Core(relq_core::Error::Timeout(_)))
    }

    /// Check if the query was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Core(relq_core::Error::Cancelled))
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
