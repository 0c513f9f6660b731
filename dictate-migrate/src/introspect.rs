//! Live schema discovery and the discovered-schema cache.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use smol_str::SmolStr;
use tracing::{debug, warn};

use dictate_schema::TableSchema;

use crate::error::MigrateResult;

/// Reads table schemas from a live database.
#[async_trait::async_trait]
pub trait SchemaExplorer: Send + Sync {
    /// Names of the tables that exist in the database.
    async fn table_names(&self) -> MigrateResult<Vec<String>>;

    /// Discover a table's columns, primary key and indexes.
    ///
    /// Returns `None` when the table does not exist.
    async fn discover(&self, table: &str) -> MigrateResult<Option<TableSchema>>;

    /// Probe the connection. Any error reads as `false`.
    async fn database_exists(&self) -> bool {
        match self.table_names().await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "Database probe failed");
                false
            }
        }
    }
}

/// Cache of discovered schemas, keyed by table name.
///
/// Absence is cached as well, so each table is discovered at most once until
/// it is invalidated.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: Mutex<HashMap<SmolStr, Option<Arc<TableSchema>>>>,
}

impl SchemaCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached entry for a table: `None` if not cached, `Some(None)` if the
    /// table is known to be absent.
    pub fn get(&self, table: &str) -> Option<Option<Arc<TableSchema>>> {
        self.entries.lock().get(table).cloned()
    }

    /// Store a discovery result.
    pub fn insert(&self, table: &str, schema: Option<TableSchema>) -> Option<Arc<TableSchema>> {
        let schema = schema.map(Arc::new);
        self.entries.lock().insert(SmolStr::new(table), schema.clone());
        schema
    }

    /// Cached schema, discovering it on a miss.
    pub async fn get_or_discover<E>(
        &self,
        explorer: &E,
        table: &str,
    ) -> MigrateResult<Option<Arc<TableSchema>>>
    where
        E: SchemaExplorer + ?Sized,
    {
        if let Some(cached) = self.get(table) {
            return Ok(cached);
        }
        debug!(table = %table, "Discovering table schema");
        let discovered = explorer.discover(table).await?;
        Ok(self.insert(table, discovered))
    }

    /// Forget a table.
    pub fn invalidate(&self, table: &str) {
        self.entries.lock().remove(table);
    }

    /// Forget every table.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Whether a table is cached, present or absent.
    pub fn contains(&self, table: &str) -> bool {
        self.entries.lock().contains_key(table)
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
