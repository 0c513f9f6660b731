//! Structural diff between a discovered and a declared table schema.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use smol_str::SmolStr;

use dictate_schema::{Column, ColumnType, Index, TableSchema};

/// A change to one entry, from the discovered side to the declared side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change<T> {
    /// Only present on the declared side.
    Added {
        /// Declared value.
        to: T,
    },
    /// Only present on the discovered side.
    Removed {
        /// Discovered value.
        from: T,
    },
    /// Present on both sides but not equivalent.
    Changed {
        /// Discovered value.
        from: T,
        /// Declared value.
        to: T,
    },
}

impl<T> Change<T> {
    /// The discovered value, if any.
    pub fn discovered(&self) -> Option<&T> {
        match self {
            Self::Added { .. } => None,
            Self::Removed { from } | Self::Changed { from, .. } => Some(from),
        }
    }

    /// The declared value, if any.
    pub fn declared(&self) -> Option<&T> {
        match self {
            Self::Removed { .. } => None,
            Self::Added { to } | Self::Changed { to, .. } => Some(to),
        }
    }
}

/// A change to the set of indexes.
///
/// Indexes are keyed by column list, so an index present on both sides with
/// different attributes is never a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", content = "index", rename_all = "snake_case")]
pub enum IndexChange {
    /// Index to create.
    Added(Index),
    /// Index to drop.
    Removed(Index),
}

impl IndexChange {
    /// The index being added or removed.
    pub fn index(&self) -> &Index {
        match self {
            Self::Added(index) | Self::Removed(index) => index,
        }
    }
}

/// Options for [`diff_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Report changes to columns declared with the `primary_key` type.
    ///
    /// When `false`, such columns are never reported as changed.
    pub force_primary_key: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            force_primary_key: true,
        }
    }
}

/// Delta between two versions of one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDelta {
    /// Table name.
    pub table: SmolStr,
    /// Column changes, by column name.
    pub columns: IndexMap<SmolStr, Change<Column>>,
    /// Index changes.
    pub indexes: Vec<IndexChange>,
}

impl TableDelta {
    /// Create an empty delta.
    pub fn new(table: impl Into<SmolStr>) -> Self {
        Self {
            table: table.into(),
            columns: IndexMap::new(),
            indexes: Vec::new(),
        }
    }

    /// Check if there are any differences.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.indexes.is_empty()
    }

    /// Columns only present on the declared side.
    pub fn added_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values().filter_map(|change| match change {
            Change::Added { to } => Some(to),
            _ => None,
        })
    }

    /// Columns only present on the discovered side.
    pub fn removed_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values().filter_map(|change| match change {
            Change::Removed { from } => Some(from),
            _ => None,
        })
    }

    /// Columns present on both sides that differ, as `(from, to)`.
    pub fn changed_columns(&self) -> impl Iterator<Item = (&Column, &Column)> {
        self.columns.values().filter_map(|change| match change {
            Change::Changed { from, to } => Some((from, to)),
            _ => None,
        })
    }

    /// Indexes to create.
    pub fn added_indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.iter().filter_map(|change| match change {
            IndexChange::Added(index) => Some(index),
            IndexChange::Removed(_) => None,
        })
    }

    /// Indexes to drop.
    pub fn removed_indexes(&self) -> impl Iterator<Item = &Index> {
        self.indexes.iter().filter_map(|change| match change {
            IndexChange::Removed(index) => Some(index),
            IndexChange::Added(_) => None,
        })
    }

    /// Get a human-readable summary of the delta.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        let added = self.added_columns().count();
        let removed = self.removed_columns().count();
        let changed = self.changed_columns().count();
        if added > 0 {
            parts.push(format!("Add {} columns", added));
        }
        if changed > 0 {
            parts.push(format!("Alter {} columns", changed));
        }
        if removed > 0 {
            parts.push(format!("Drop {} columns", removed));
        }

        let added = self.added_indexes().count();
        let removed = self.removed_indexes().count();
        if added > 0 {
            parts.push(format!("Create {} indexes", added));
        }
        if removed > 0 {
            parts.push(format!("Drop {} indexes", removed));
        }

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Compute the delta from `from` (discovered) to `to` (declared).
pub fn diff(from: &TableSchema, to: &TableSchema) -> TableDelta {
    diff_with(from, to, &DiffOptions::default())
}

/// Compute the delta with explicit options.
pub fn diff_with(from: &TableSchema, to: &TableSchema, options: &DiffOptions) -> TableDelta {
    let mut delta = TableDelta::new(to.name.clone());

    for old in from.columns() {
        match to.column(&old.name) {
            None => {
                delta
                    .columns
                    .insert(old.name.clone(), Change::Removed { from: old.clone() });
            }
            Some(new) => {
                let locked = !options.force_primary_key && new.column_type == ColumnType::PrimaryKey;
                if !locked && !old.is_equivalent(new) {
                    delta.columns.insert(
                        old.name.clone(),
                        Change::Changed {
                            from: old.clone(),
                            to: new.clone(),
                        },
                    );
                }
            }
        }
    }
    for new in to.columns() {
        if !from.has_column(&new.name) {
            delta
                .columns
                .insert(new.name.clone(), Change::Added { to: new.clone() });
        }
    }

    let old_indexes = keyed_indexes(from);
    let new_indexes = keyed_indexes(to);
    for (columns, indexes) in &old_indexes {
        if !new_indexes.contains_key(columns) {
            delta
                .indexes
                .extend(indexes.iter().map(|i| IndexChange::Removed((*i).clone())));
        }
    }
    for (columns, indexes) in &new_indexes {
        if !old_indexes.contains_key(columns) {
            delta
                .indexes
                .extend(indexes.iter().map(|i| IndexChange::Added((*i).clone())));
        }
    }

    delta
}

/// Indexes grouped by column list, leaving out the primary-key index.
fn keyed_indexes(table: &TableSchema) -> IndexMap<&[SmolStr], Vec<&Index>> {
    let primary_key = table.primary_key().map(|c| c.name.as_str());
    let mut keyed: IndexMap<&[SmolStr], Vec<&Index>> = IndexMap::new();
    for index in table.indexes() {
        if primary_key.is_some_and(|pk| index.is_on_column(pk)) {
            continue;
        }
        keyed.entry(index.columns.as_slice()).or_default().push(index);
    }
    keyed
}

/// Delta across every table of a database.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaDelta {
    /// Declared tables missing from the database.
    pub add_tables: IndexMap<SmolStr, TableSchema>,
    /// Tables present on both sides that differ.
    pub change_tables: IndexMap<SmolStr, TableDelta>,
    /// Live tables that are not declared.
    pub drop_tables: IndexMap<SmolStr, TableSchema>,
}

impl SchemaDelta {
    /// Check if there are any differences.
    pub fn is_empty(&self) -> bool {
        self.add_tables.is_empty() && self.change_tables.is_empty() && self.drop_tables.is_empty()
    }

    /// Names of every table with a pending change.
    pub fn table_names(&self) -> IndexSet<&str> {
        self.add_tables
            .keys()
            .chain(self.change_tables.keys())
            .chain(self.drop_tables.keys())
            .map(SmolStr::as_str)
            .collect()
    }

    /// Get a human-readable summary of the delta.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if !self.add_tables.is_empty() {
            parts.push(format!("Create {} tables", self.add_tables.len()));
        }
        if !self.change_tables.is_empty() {
            parts.push(format!("Alter {} tables", self.change_tables.len()));
        }
        if !self.drop_tables.is_empty() {
            parts.push(format!("Drop {} tables", self.drop_tables.len()));
        }

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dictate_schema::{AdapterId, FieldOptions, IndexOptions, TableBuilder, TypeCatalog};
    use pretty_assertions::assert_eq;

    fn table<F>(f: F) -> TableSchema
    where
        F: FnOnce(&mut TableBuilder<'_>) -> dictate_schema::SchemaResult<()>,
    {
        TableSchema::declare("users", AdapterId::Postgres, &TypeCatalog::standard(), f).unwrap()
    }

    fn users() -> TableSchema {
        table(|t| {
            t.field("id", FieldOptions::primary_key())?
                .field("name", FieldOptions::string().size(64))?
                .field("legacy", FieldOptions::text())?
                .index("name", IndexOptions::new())?;
            Ok(())
        })
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let schema = users();
        let delta = diff(&schema, &schema);
        assert!(delta.is_empty());
        assert_eq!(delta.summary(), "No changes");
    }

    #[test]
    fn test_changed_column() {
        let from = table(|t| {
            t.field("id", FieldOptions::primary_key())?
                .field("name", FieldOptions::string().size(32).not_null())?;
            Ok(())
        });
        let to = table(|t| {
            t.field("id", FieldOptions::primary_key())?
                .field("name", FieldOptions::string().size(64))?;
            Ok(())
        });

        let delta = diff(&from, &to);
        assert_eq!(delta.columns.len(), 1);
        let (old, new) = delta.changed_columns().next().unwrap();
        assert_eq!(old.native_type, "character varying(32)");
        assert_eq!(new.native_type, "character varying(64)");
    }

    #[test]
    fn test_added_and_removed_columns() {
        let from = users();
        let to = table(|t| {
            t.field("id", FieldOptions::primary_key())?
                .field("name", FieldOptions::string().size(64))?
                .field("email", FieldOptions::string())?
                .index("name", IndexOptions::new())?;
            Ok(())
        });

        let delta = diff(&from, &to);
        assert_eq!(
            delta.columns.keys().map(SmolStr::as_str).collect::<Vec<_>>(),
            vec!["legacy", "email"]
        );
        assert!(matches!(delta.columns["legacy"], Change::Removed { .. }));
        assert!(matches!(delta.columns["email"], Change::Added { .. }));
        assert_eq!(delta.summary(), "Add 1 columns, Drop 1 columns");
    }

    #[test]
    fn test_auto_increment_is_ignored() {
        let from = users();
        let mut to = users();
        let id = to.column("id").unwrap().clone().with_auto_increment(false);
        to.put_column(id);
        assert!(diff(&from, &to).is_empty());
    }

    #[test]
    fn test_primary_key_index_is_excluded() {
        let mut from = users();
        from.add_index(Index::new(["id"]).unique().with_name("users_pkey"))
            .unwrap();
        let delta = diff(&from, &users());
        assert!(delta.indexes.is_empty());

        let delta = diff(&users(), &from);
        assert!(delta.indexes.is_empty());
    }

    #[test]
    fn test_index_added_and_removed() {
        let from = users();
        let to = table(|t| {
            t.field("id", FieldOptions::primary_key())?
                .field("name", FieldOptions::string().size(64))?
                .field("legacy", FieldOptions::text())?
                .index(["name", "legacy"], IndexOptions::new().unique())?;
            Ok(())
        });

        let delta = diff(&from, &to);
        assert_eq!(
            delta.indexes,
            vec![
                IndexChange::Removed(Index::new(["name"])),
                IndexChange::Added(Index::new(["name", "legacy"]).unique()),
            ]
        );
    }

    #[test]
    fn test_every_index_on_removed_columns_is_dropped() {
        let mut from = users();
        from.add_index(Index::new(["legacy"]).with_name("a_idx")).unwrap();
        from.add_index(Index::new(["legacy"]).unique().with_name("b_key"))
            .unwrap();

        let delta = diff(&from, &users());
        assert_eq!(
            delta.indexes,
            vec![
                IndexChange::Removed(Index::new(["legacy"]).with_name("a_idx")),
                IndexChange::Removed(Index::new(["legacy"]).unique().with_name("b_key")),
            ]
        );
    }

    #[test]
    fn test_index_attribute_change_is_not_reported() {
        let from = users();
        let to = table(|t| {
            t.field("id", FieldOptions::primary_key())?
                .field("name", FieldOptions::string().size(64))?
                .field("legacy", FieldOptions::text())?
                .index("name", IndexOptions::new().unique().name("users_name_unique"))?;
            Ok(())
        });
        assert!(diff(&from, &to).indexes.is_empty());
    }

    #[test]
    fn test_force_primary_key_option() {
        let from = users();
        let mut to = users();
        let id = to.column("id").unwrap().clone().with_native_default("unique_rowid()");
        to.put_column(id);

        assert_eq!(diff(&from, &to).columns.len(), 1);
        let options = DiffOptions {
            force_primary_key: false,
        };
        assert!(diff_with(&from, &to, &options).is_empty());
    }

    #[test]
    fn test_serialize_delta() {
        let from = users();
        let mut to = users();
        to.remove_column("legacy");
        let json = serde_json::to_value(diff(&from, &to)).unwrap();
        assert_eq!(json["columns"]["legacy"]["change"], "removed");
        assert_eq!(json["columns"]["legacy"]["from"]["native_type"], "text");
    }

    #[test]
    fn test_schema_delta_summary() {
        let mut delta = SchemaDelta::default();
        assert!(delta.is_empty());
        delta.add_tables.insert("users".into(), users());
        delta.drop_tables.insert("old".into(), TableSchema::new("old"));
        assert_eq!(delta.summary(), "Create 1 tables, Drop 1 tables");
        assert_eq!(delta.table_names().len(), 2);
    }
}
