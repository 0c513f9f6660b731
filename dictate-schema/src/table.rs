//! Table schemas and the declaration builder.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::trace;

use crate::catalog::TypeCatalog;
use crate::column::{Column, FieldOptions};
use crate::error::{SchemaError, SchemaResult};
use crate::index::{Index, IndexColumns, IndexOptions};
use crate::types::{AdapterId, DefaultGenerator};

/// A table: ordered columns, indexes and an optional primary key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: SmolStr,
    columns: IndexMap<SmolStr, Column>,
    #[serde(default)]
    indexes: Vec<Index>,
    #[serde(skip)]
    generated_defaults: IndexMap<SmolStr, DefaultGenerator>,
}

impl PartialEq for TableSchema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.columns == other.columns && self.indexes == other.indexes
    }
}

impl TableSchema {
    /// Create an empty table schema.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Declare a table with the builder.
    ///
    /// ```rust
    /// use dictate_schema::{AdapterId, FieldOptions, IndexOptions, TableSchema, TypeCatalog};
    ///
    /// let users = TableSchema::declare("users", AdapterId::Postgres, &TypeCatalog::standard(), |t| {
    ///     t.field("id", FieldOptions::primary_key())?
    ///         .field("email", FieldOptions::string().size(128).not_null())?
    ///         .index("email", IndexOptions::new().unique())?;
    ///     Ok(())
    /// })?;
    /// assert_eq!(users.primary_key().map(|c| c.name.as_str()), Some("id"));
    /// # Ok::<(), dictate_schema::SchemaError>(())
    /// ```
    pub fn declare<F>(
        name: impl Into<SmolStr>,
        adapter: AdapterId,
        catalog: &TypeCatalog,
        f: F,
    ) -> SchemaResult<Self>
    where
        F: FnOnce(&mut TableBuilder<'_>) -> SchemaResult<()>,
    {
        let mut schema = Self::new(name);
        f(&mut TableBuilder::new(&mut schema, adapter, catalog))?;
        Ok(schema)
    }

    /// Get the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterate over columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(SmolStr::as_str)
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// The primary-key column, if any.
    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.values().find(|c| c.primary_key)
    }

    /// Indexes in declaration order.
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// Find the index on exactly these columns.
    pub fn index_on(&self, columns: &[SmolStr]) -> Option<&Index> {
        self.indexes.iter().find(|i| i.columns == columns)
    }

    /// Generators that must run before a new row is first saved, by column.
    pub fn generated_defaults(&self) -> &IndexMap<SmolStr, DefaultGenerator> {
        &self.generated_defaults
    }

    /// Add a column.
    ///
    /// Fails on a duplicate name or a second primary key.
    pub fn add_column(&mut self, column: Column) -> SchemaResult<()> {
        if self.columns.contains_key(&column.name) {
            return Err(SchemaError::duplicate_field(self.name.as_str(), column.name.as_str()));
        }
        if column.primary_key {
            if let Some(existing) = self.primary_key() {
                return Err(SchemaError::PrimaryKeyConflict {
                    table: self.name.to_string(),
                    existing: existing.name.to_string(),
                    field: column.name.to_string(),
                });
            }
        }
        self.columns.insert(column.name.clone(), column);
        Ok(())
    }

    /// Replace an existing column in place, or append it.
    pub fn put_column(&mut self, column: Column) {
        self.columns.insert(column.name.clone(), column);
    }

    /// Remove a column, keeping the order of the others.
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        self.generated_defaults.shift_remove(name);
        self.columns.shift_remove(name)
    }

    /// Add an index.
    pub fn add_index(&mut self, index: Index) -> SchemaResult<()> {
        IndexColumns(index.columns.iter().map(|c| c.to_string()).collect())
            .validate()
            .map_err(|msg| SchemaError::invalid_index_columns(self.name.as_str(), msg))?;
        self.indexes.push(index);
        Ok(())
    }

    /// Keep only the indexes matching `f`.
    pub fn retain_indexes<F>(&mut self, f: F)
    where
        F: FnMut(&Index) -> bool,
    {
        self.indexes.retain(f);
    }

    /// Remove every index on exactly these columns.
    pub fn remove_index(&mut self, columns: &[SmolStr]) -> usize {
        let before = self.indexes.len();
        self.indexes.retain(|i| i.columns != columns);
        before - self.indexes.len()
    }
}

/// Builder used to declare fields and indexes on a table.
#[derive(Debug)]
pub struct TableBuilder<'a> {
    schema: &'a mut TableSchema,
    adapter: AdapterId,
    catalog: &'a TypeCatalog,
}

impl<'a> TableBuilder<'a> {
    pub(crate) fn new(
        schema: &'a mut TableSchema,
        adapter: AdapterId,
        catalog: &'a TypeCatalog,
    ) -> Self {
        Self {
            schema,
            adapter,
            catalog,
        }
    }

    /// Declare a field.
    pub fn field(&mut self, name: &str, opts: FieldOptions) -> SchemaResult<&mut Self> {
        if self.schema.has_column(name) {
            return Err(SchemaError::duplicate_field(self.schema.name.as_str(), name));
        }
        let (column, generator) = opts.into_column(&self.schema.name, name, self.adapter, self.catalog);
        trace!(table = %self.schema.name, column = %column, "Declared field");
        self.schema.add_column(column)?;
        if let Some(generator) = generator {
            self.schema.generated_defaults.insert(SmolStr::new(name), generator);
        }
        Ok(self)
    }

    /// Declare an index on one or more columns.
    pub fn index(
        &mut self,
        columns: impl Into<IndexColumns>,
        opts: IndexOptions,
    ) -> SchemaResult<&mut Self> {
        let columns = columns.into();
        columns
            .validate()
            .map_err(|msg| SchemaError::invalid_index_columns(self.schema.name.as_str(), msg))?;
        let index = Index {
            columns: columns.0.into_iter().map(SmolStr::from).collect(),
            name: opts.name,
            unique: opts.unique,
        };
        trace!(table = %self.schema.name, index = %index, "Declared index");
        self.schema.indexes.push(index);
        Ok(self)
    }

    /// Declare a `bigint` foreign-key field and index it.
    pub fn foreign_key(&mut self, name: &str) -> SchemaResult<&mut Self> {
        self.field(name, FieldOptions::bigint())?
            .index(name, IndexOptions::new())
    }

    /// The primary-key column declared so far.
    pub fn primary_key(&self) -> Option<&Column> {
        self.schema.primary_key()
    }

    /// The table being declared.
    pub fn schema(&self) -> &TableSchema {
        self.schema
    }
}
