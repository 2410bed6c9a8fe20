//! Embedded sled-backed data source.

use std::path::PathBuf;

use relq_proto::{Row, Value};
use sled::{Db, Tree};
use tracing::trace;

use super::{DataSource, SourceError};

/// Prefix for per-entity row trees.
const ROWS_TREE_PREFIX: &str = "rows:";

/// Configuration for a [`SledSource`].
#[derive(Debug, Clone)]
pub struct SledConfig {
    /// Path to the database directory.
    pub path: PathBuf,
    /// Page cache capacity in bytes.
    pub cache_capacity: u64,
    /// Flush interval in milliseconds. None means flush on every write.
    pub flush_every_ms: Option<u64>,
    /// Enable zstd compression.
    pub compression: bool,
    /// Temporary database (deleted on drop).
    pub temporary: bool,
}

impl Default for SledConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./relq_data"),
            cache_capacity: 256 * 1024 * 1024, // 256MB
            flush_every_ms: Some(1000),
            compression: true,
            temporary: false,
        }
    }
}

impl SledConfig {
    /// Create a new configuration with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a temporary configuration for testing.
    pub fn temporary() -> Self {
        Self {
            path: PathBuf::from(""),
            temporary: true,
            ..Default::default()
        }
    }

    /// Set the page cache capacity.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    fn to_sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .use_compression(self.compression);

        if self.temporary {
            config = config.temporary(true);
        } else {
            config = config.path(&self.path);
        }

        if let Some(ms) = self.flush_every_ms {
            config = config.flush_every_ms(Some(ms));
        }

        config
    }
}

/// Rows stored in sled, one tree per entity.
///
/// Rows are archived with rkyv and keyed by a monotonically increasing id,
/// so scans return rows in insertion order.
pub struct SledSource {
    db: Db,
}

impl SledSource {
    /// Open or create a source with the given configuration.
    pub fn open(config: SledConfig) -> Result<Self, SourceError> {
        let db = config.to_sled_config().open()?;
        Ok(Self { db })
    }

    /// Open a temporary source that is deleted on drop.
    pub fn temporary() -> Result<Self, SourceError> {
        Self::open(SledConfig::temporary())
    }

    /// Store a row for `entity`.
    pub fn insert(&self, entity: &str, row: &Row) -> Result<(), SourceError> {
        let bytes = row.to_bytes().map_err(|e| SourceError::Corrupt {
            entity: entity.to_string(),
            message: e.to_string(),
        })?;
        let key = self.db.generate_id()?.to_be_bytes();
        self.tree(entity)?.insert(key, bytes)?;
        Ok(())
    }

    /// Store several rows for `entity`.
    pub fn insert_many<'a>(
        &self,
        entity: &str,
        rows: impl IntoIterator<Item = &'a Row>,
    ) -> Result<(), SourceError> {
        for row in rows {
            self.insert(entity, row)?;
        }
        Ok(())
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), SourceError> {
        self.db.flush()?;
        Ok(())
    }

    fn tree(&self, entity: &str) -> Result<Tree, SourceError> {
        Ok(self.db.open_tree(tree_name(entity))?)
    }

    /// The entity's tree if rows were ever stored for it. Never creates one.
    fn existing_tree(&self, entity: &str) -> Result<Option<Tree>, SourceError> {
        let name = tree_name(entity);
        if !self.db.tree_names().iter().any(|n| n.as_ref() == name.as_bytes()) {
            return Ok(None);
        }
        Ok(Some(self.db.open_tree(name)?))
    }
}

fn tree_name(entity: &str) -> String {
    format!("{ROWS_TREE_PREFIX}{entity}")
}

impl DataSource for SledSource {
    fn scan(&self, entity: &str) -> Result<Vec<Row>, SourceError> {
        let Some(tree) = self.existing_tree(entity)? else {
            return Ok(Vec::new());
        };
        let mut rows = Vec::with_capacity(tree.len());
        for item in tree.iter() {
            let (_, bytes) = item?;
            let row = Row::from_bytes(&bytes).map_err(|e| SourceError::Corrupt {
                entity: entity.to_string(),
                message: e.to_string(),
            })?;
            rows.push(row);
        }
        trace!(entity, rows = rows.len(), "sled scan");
        Ok(rows)
    }

    fn fetch_where_in(
        &self,
        entity: &str,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Row>, SourceError> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let mut rows = self.scan(entity)?;
        rows.retain(|row| {
            row.get(field)
                .is_some_and(|actual| values.iter().any(|v| v.matches(actual)))
        });
        Ok(rows)
    }
}
