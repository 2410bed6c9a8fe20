//! Data sources the executor reads rows from.
//!
//! A [`DataSource`] answers two questions: "every row of this entity" and
//! "rows of this entity whose field is one of these values". The executor
//! only ever issues those two calls, batching the second per nesting level.

mod embedded;
mod memory;

pub use embedded::{SledConfig, SledSource};
pub use memory::MemorySource;

use relq_proto::{Row, Value};
use thiserror::Error;

/// A data-source failure, surfaced unchanged by the executor.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// A stored row could not be decoded.
    #[error("corrupt row in '{entity}': {message}")]
    Corrupt { entity: String, message: String },

    /// The source cannot serve requests.
    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

/// Read access to stored rows, keyed by entity name.
///
/// Entities with no stored rows yield an empty result rather than an error.
pub trait DataSource: Send + Sync {
    /// All rows of `entity`, in storage order.
    fn scan(&self, entity: &str) -> Result<Vec<Row>, SourceError>;

    /// Rows of `entity` whose `field` equals any of `values`, in storage order.
    fn fetch_where_in(
        &self,
        entity: &str,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Row>, SourceError> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.scan(entity)?;
        Ok(rows
            .into_iter()
            .filter(|row| {
                row.get(field)
                    .is_some_and(|actual| values.iter().any(|v| v.matches(actual)))
            })
            .collect())
    }
}

impl<S: DataSource + ?Sized> DataSource for std::sync::Arc<S> {
    fn scan(&self, entity: &str) -> Result<Vec<Row>, SourceError> {
        (**self).scan(entity)
    }

    fn fetch_where_in(
        &self,
        entity: &str,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Row>, SourceError> {
        (**self).fetch_where_in(entity, field, values)
    }
}
