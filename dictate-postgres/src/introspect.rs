//! Live schema discovery through `information_schema`, `pg_index` and
//! CockroachDB's `SHOW INDEXES`.

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::{debug, warn};

use dictate_migrate::{MigrateResult, SchemaExplorer};
use dictate_schema::{Column, ColumnType, Index, TableSchema};

use crate::connection::PgConnection;
use crate::error::{PgError, PgResult};
use crate::types::{column_size, is_identity_default, native_type, normalize_default};

const TABLES_QUERY: &str = "
SELECT table_name::text AS table_name
FROM information_schema.tables
WHERE table_schema = current_schema()
  AND table_type = 'BASE TABLE'
ORDER BY table_name";

const TABLE_EXISTS_QUERY: &str = "
SELECT 1
FROM information_schema.tables
WHERE table_schema = current_schema()
  AND table_type = 'BASE TABLE'
  AND table_name = $1";

const COLUMNS_QUERY: &str = "
SELECT column_name::text AS column_name,
       data_type::text AS data_type,
       character_maximum_length::int4 AS char_length,
       numeric_precision::int4 AS numeric_precision,
       numeric_scale::int4 AS numeric_scale,
       is_nullable::text AS is_nullable,
       column_default::text AS column_default
FROM information_schema.columns
WHERE table_schema = current_schema()
  AND table_name = $1
ORDER BY ordinal_position";

const PRIMARY_KEY_QUERY: &str = "
SELECT kcu.column_name::text AS column_name
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON tc.constraint_name = kcu.constraint_name
 AND tc.table_schema = kcu.table_schema
 AND tc.table_name = kcu.table_name
WHERE tc.constraint_type = 'PRIMARY KEY'
  AND tc.table_schema = current_schema()
  AND tc.table_name = $1
ORDER BY kcu.ordinal_position";

const INDEXES_QUERY: &str = "
SELECT i.relname::text AS index_name,
       ix.indisunique AS is_unique,
       array_agg(a.attname::text ORDER BY k.ord) AS columns
FROM pg_class t
JOIN pg_namespace n ON n.oid = t.relnamespace
JOIN pg_index ix ON t.oid = ix.indrelid
JOIN pg_class i ON i.oid = ix.indexrelid
CROSS JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
WHERE n.nspname = current_schema()
  AND t.relname = $1
  AND NOT ix.indisprimary
GROUP BY i.relname, ix.indisunique
ORDER BY i.relname";

/// One row of CockroachDB's `SHOW INDEXES FROM <table>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShowIndexRow {
    /// Index name.
    pub index_name: String,
    /// Column name.
    pub column_name: String,
    /// Whether the index is unique.
    pub unique: bool,
    /// Column added implicitly by the database.
    pub implicit: bool,
    /// Column stored in the index without being part of the key.
    pub storing: bool,
}

/// Group `SHOW INDEXES` rows into indexes.
///
/// The primary index and implicit or stored columns are skipped.
pub fn group_show_indexes(rows: impl IntoIterator<Item = ShowIndexRow>) -> Vec<Index> {
    let mut grouped: IndexMap<String, (bool, Vec<SmolStr>)> = IndexMap::new();
    for row in rows {
        if row.index_name == "primary" || row.index_name.ends_with("_pkey") {
            continue;
        }
        let entry = grouped
            .entry(row.index_name)
            .or_insert_with(|| (row.unique, Vec::new()));
        if !row.implicit && !row.storing {
            entry.1.push(SmolStr::new(&row.column_name));
        }
    }

    grouped
        .into_iter()
        .filter(|(_, (_, columns))| !columns.is_empty())
        .map(|(name, (unique, columns))| {
            let index = Index::new(columns).with_name(name);
            if unique { index.unique() } else { index }
        })
        .collect()
}

impl PgConnection {
    async fn discover_table(&self, table: &str) -> PgResult<Option<TableSchema>> {
        if self.query(TABLE_EXISTS_QUERY, &[&table]).await?.is_empty() {
            debug!(table = %table, "Table not found");
            return Ok(None);
        }

        let primary_key: Vec<String> = self
            .query(PRIMARY_KEY_QUERY, &[&table])
            .await?
            .iter()
            .map(|row| row.try_get("column_name"))
            .collect::<Result<_, _>>()?;
        if primary_key.len() > 1 {
            return Err(PgError::discovery(
                table,
                format!("composite primary key ({}) is not supported", primary_key.join(", ")),
            ));
        }

        let mut schema = TableSchema::new(table);
        for row in self.query(COLUMNS_QUERY, &[&table]).await? {
            let name: String = row.try_get("column_name")?;
            let data_type: String = row.try_get("data_type")?;
            let char_length: Option<i32> = row.try_get("char_length")?;
            let precision: Option<i32> = row.try_get("numeric_precision")?;
            let scale: Option<i32> = row.try_get("numeric_scale")?;
            let is_nullable: String = row.try_get("is_nullable")?;
            let default: Option<String> = row.try_get("column_default")?;

            let native_default = default.as_deref().map(normalize_default);
            let mut column = Column::new(
                name.as_str(),
                ColumnType::from(data_type.as_str()),
                native_type(&data_type, char_length, precision, scale),
            )
            .with_primary_key(primary_key.contains(&name))
            .with_auto_increment(native_default.as_deref().is_some_and(is_identity_default))
            .with_not_null(is_nullable == "NO");
            if let Some(size) = column_size(&data_type, char_length, precision, scale) {
                column = column.with_size(size);
            }
            if let Some(native_default) = native_default {
                column = column.with_native_default(native_default);
            }

            schema
                .add_column(column)
                .map_err(|e| PgError::discovery(table, e.to_string()))?;
        }

        for index in self.discover_indexes(table).await? {
            if let Err(e) = schema.add_index(index) {
                warn!(table = %table, error = %e, "Skipping discovered index");
            }
        }

        Ok(Some(schema))
    }

    async fn discover_indexes(&self, table: &str) -> PgResult<Vec<Index>> {
        if self.is_cockroach() {
            let sql = format!("SHOW INDEXES FROM \"{}\"", table.replace('"', "\"\""));
            let rows = self
                .query(&sql, &[])
                .await?
                .iter()
                .map(|row| -> PgResult<ShowIndexRow> {
                    Ok(ShowIndexRow {
                        index_name: row.try_get("index_name")?,
                        column_name: row.try_get("column_name")?,
                        unique: !row.try_get::<_, bool>("non_unique")?,
                        implicit: row.try_get("implicit")?,
                        storing: row.try_get("storing")?,
                    })
                })
                .collect::<PgResult<Vec<_>>>()?;
            return Ok(group_show_indexes(rows));
        }

        self.query(INDEXES_QUERY, &[&table])
            .await?
            .iter()
            .map(|row| -> PgResult<Index> {
                let name: String = row.try_get("index_name")?;
                let unique: bool = row.try_get("is_unique")?;
                let columns: Vec<String> = row.try_get("columns")?;
                let index = Index::new(columns).with_name(name);
                Ok(if unique { index.unique() } else { index })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl SchemaExplorer for PgConnection {
    async fn table_names(&self) -> MigrateResult<Vec<String>> {
        let names = self
            .query(TABLES_QUERY, &[])
            .await?
            .iter()
            .map(|row| row.try_get("table_name"))
            .collect::<Result<Vec<String>, _>>()
            .map_err(PgError::from)?;
        Ok(names)
    }

    async fn discover(&self, table: &str) -> MigrateResult<Option<TableSchema>> {
        Ok(self.discover_table(table).await?)
    }

    async fn database_exists(&self) -> bool {
        match self.query("SELECT 1", &[]).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Database is not reachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(index: &str, column: &str, unique: bool, implicit: bool) -> ShowIndexRow {
        ShowIndexRow {
            index_name: index.to_string(),
            column_name: column.to_string(),
            unique,
            implicit,
            storing: false,
        }
    }

    #[test]
    fn test_group_show_indexes() {
        let indexes = group_show_indexes(vec![
            row("primary", "id", true, false),
            row("users_email_key", "email", true, false),
            row("users_email_key", "id", true, true),
            row("users_name_org_idx", "name", false, false),
            row("users_name_org_idx", "org_id", false, false),
            row("users_name_org_idx", "id", false, true),
        ]);

        assert_eq!(
            indexes,
            vec![
                Index::new(["email"]).with_name("users_email_key").unique(),
                Index::new(["name", "org_id"]).with_name("users_name_org_idx"),
            ]
        );
    }

    #[test]
    fn test_group_show_indexes_skips_pkey_and_storing() {
        let mut stored = row("users_name_idx", "bio", false, false);
        stored.storing = true;
        let indexes = group_show_indexes(vec![
            row("users_pkey", "id", true, false),
            row("users_name_idx", "name", false, false),
            stored,
        ]);
        assert_eq!(indexes, vec![Index::new(["name"]).with_name("users_name_idx")]);
    }
}
