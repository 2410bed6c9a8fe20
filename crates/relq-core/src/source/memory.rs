//! In-memory data source.

use std::collections::HashMap;

use parking_lot::RwLock;
use relq_proto::Row;

use super::{DataSource, SourceError};

/// Rows held in memory, grouped by entity in insertion order.
#[derive(Debug, Default)]
pub struct MemorySource {
    rows: RwLock<HashMap<String, Vec<Row>>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row for `entity`.
    pub fn insert(&self, entity: impl Into<String>, row: Row) {
        self.rows.write().entry(entity.into()).or_default().push(row);
    }

    /// Append several rows for `entity`.
    pub fn insert_many(&self, entity: impl Into<String>, rows: impl IntoIterator<Item = Row>) {
        self.rows.write().entry(entity.into()).or_default().extend(rows);
    }

    /// Builder form of [`insert_many`](Self::insert_many).
    pub fn with_rows(self, entity: impl Into<String>, rows: impl IntoIterator<Item = Row>) -> Self {
        self.insert_many(entity, rows);
        self
    }

    /// Number of rows stored for `entity`.
    pub fn count(&self, entity: &str) -> usize {
        self.rows.read().get(entity).map_or(0, Vec::len)
    }
}

impl DataSource for MemorySource {
    fn scan(&self, entity: &str) -> Result<Vec<Row>, SourceError> {
        Ok(self.rows.read().get(entity).cloned().unwrap_or_default())
    }
}
