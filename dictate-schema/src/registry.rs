//! Registry of declared table schemas.

use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::catalog::TypeCatalog;
use crate::error::SchemaResult;
use crate::table::{TableBuilder, TableSchema};
use crate::types::AdapterId;

/// Declared table schemas for one database, in declaration order.
///
/// Built once at startup and then passed by reference to the migrator.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    adapter: AdapterId,
    catalog: Arc<TypeCatalog>,
    tables: IndexMap<SmolStr, TableSchema>,
}

impl SchemaRegistry {
    /// Create a registry using the standard type catalog.
    pub fn new(adapter: AdapterId) -> Self {
        Self::with_catalog(adapter, TypeCatalog::standard())
    }

    /// Create a registry using a custom type catalog.
    pub fn with_catalog(adapter: AdapterId, catalog: Arc<TypeCatalog>) -> Self {
        Self {
            adapter,
            catalog,
            tables: IndexMap::new(),
        }
    }

    /// Adapter the schemas are declared for.
    pub fn adapter(&self) -> AdapterId {
        self.adapter
    }

    /// Type catalog used to resolve declared fields.
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Builder for a table, created on first use.
    ///
    /// Declaring against an existing table extends it.
    pub fn table(&mut self, name: &str) -> TableBuilder<'_> {
        let schema = self
            .tables
            .entry(SmolStr::new(name))
            .or_insert_with(|| TableSchema::new(name));
        TableBuilder::new(schema, self.adapter, &self.catalog)
    }

    /// Declare a table with a closure.
    pub fn define<F>(&mut self, name: &str, f: F) -> SchemaResult<&TableSchema>
    where
        F: FnOnce(&mut TableBuilder<'_>) -> SchemaResult<()>,
    {
        f(&mut self.table(name))?;
        Ok(&self.tables[name])
    }

    /// Insert a table schema, replacing any existing one with the same name.
    pub fn insert(&mut self, schema: TableSchema) -> Option<TableSchema> {
        self.tables.insert(schema.name.clone(), schema)
    }

    /// Get a declared table.
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Whether a table is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Declared table names in declaration order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(SmolStr::as_str)
    }

    /// Iterate over declared tables.
    pub fn iter(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    /// Number of declared tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table is declared.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
