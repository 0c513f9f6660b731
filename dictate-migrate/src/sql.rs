//! DDL statement rendering per adapter.

use dictate_schema::{AdapterId, Column, Index};

use crate::error::{MigrateResult, MigrationError};

/// Renders DDL statements in one adapter's dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdlRenderer {
    adapter: AdapterId,
}

impl DdlRenderer {
    /// Create a renderer for an adapter.
    pub fn new(adapter: AdapterId) -> Self {
        Self { adapter }
    }

    /// The adapter this renderer targets.
    pub fn adapter(&self) -> AdapterId {
        self.adapter
    }

    /// Quote an identifier.
    pub fn quote(&self, ident: &str) -> String {
        match self.adapter {
            AdapterId::Mysql => format!("`{}`", ident.replace('`', "``")),
            _ => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// PostgreSQL serial type standing in for a sequence-backed column.
    fn serial_type(&self, column: &Column) -> Option<&'static str> {
        if self.adapter != AdapterId::Postgres || !column.auto_increment {
            return None;
        }
        if !column
            .native_default
            .as_deref()
            .is_some_and(|d| d.starts_with("nextval("))
        {
            return None;
        }
        match column.native_type.as_str() {
            "integer" => Some("serial"),
            "bigint" => Some("bigserial"),
            "smallint" => Some("smallserial"),
            _ => None,
        }
    }

    /// Generate a column definition.
    pub fn column_definition(&self, column: &Column) -> String {
        self.definition(column, column.primary_key)
    }

    fn definition(&self, column: &Column, primary_key: bool) -> String {
        let serial = self.serial_type(column);
        let mut parts = vec![
            self.quote(&column.name),
            serial.map_or_else(|| column.native_type.clone(), str::to_string),
        ];

        if primary_key {
            parts.push("PRIMARY KEY".to_string());
        }
        if column.auto_increment {
            match self.adapter {
                AdapterId::Sqlite if column.primary_key => parts.push("AUTOINCREMENT".to_string()),
                AdapterId::Mysql => parts.push("AUTO_INCREMENT".to_string()),
                _ => {}
            }
        }
        if column.not_null {
            parts.push("NOT NULL".to_string());
        }
        if serial.is_none() {
            if let Some(default) = &column.native_default {
                parts.push(format!("DEFAULT {}", default));
            }
        }

        parts.join(" ")
    }

    /// Generate a CREATE TABLE statement holding a single column.
    pub fn create_table(&self, table: &str, column: &Column) -> String {
        format!(
            "CREATE TABLE {} (\n    {}\n);",
            self.quote(table),
            self.column_definition(column)
        )
    }

    /// Generate a DROP TABLE statement.
    pub fn drop_table(&self, table: &str) -> String {
        match self.adapter {
            AdapterId::Postgres | AdapterId::CockroachDb => {
                format!("DROP TABLE IF EXISTS {} CASCADE;", self.quote(table))
            }
            _ => format!("DROP TABLE IF EXISTS {};", self.quote(table)),
        }
    }

    /// Generate an ADD COLUMN statement.
    pub fn add_column(&self, table: &str, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {};",
            self.quote(table),
            self.column_definition(column)
        )
    }

    /// Generate a DROP COLUMN statement.
    pub fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {};",
            self.quote(table),
            self.quote(column)
        )
    }

    /// Generate the statements turning column `from` into `to`.
    ///
    /// Covers every attribute compared by [`Column::is_equivalent`]. Changes
    /// the dialect cannot express fail before anything is executed.
    pub fn alter_column(&self, table: &str, from: &Column, to: &Column) -> MigrateResult<Vec<String>> {
        match self.adapter {
            AdapterId::Postgres | AdapterId::CockroachDb => self.alter_column_pg(table, from, to),
            AdapterId::Mysql => Ok(vec![self.alter_column_mysql(table, from, to)]),
            AdapterId::Sqlite => Err(MigrationError::database(format!(
                "sqlite cannot alter column {}.{}",
                table, to.name
            ))),
        }
    }

    fn alter_column_mysql(&self, table: &str, from: &Column, to: &Column) -> String {
        // MODIFY never restates PRIMARY KEY on a column that already has it.
        let modify = format!("MODIFY COLUMN {}", self.definition(to, false));
        let clauses = match (from.primary_key, to.primary_key) {
            (false, true) => format!("{}, ADD PRIMARY KEY ({})", modify, self.quote(&to.name)),
            (true, false) => format!("DROP PRIMARY KEY, {}", modify),
            _ => modify,
        };
        format!("ALTER TABLE {} {};", self.quote(table), clauses)
    }

    fn alter_column_pg(&self, table: &str, from: &Column, to: &Column) -> MigrateResult<Vec<String>> {
        let mut stmts = Vec::new();
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.quote(table),
            self.quote(&to.name)
        );

        if from.primary_key && !to.primary_key {
            if self.adapter == AdapterId::CockroachDb {
                return Err(MigrationError::database(format!(
                    "cockroachdb cannot drop the primary key of {} without replacing it",
                    table
                )));
            }
            stmts.push(format!(
                "ALTER TABLE {} DROP CONSTRAINT {};",
                self.quote(table),
                self.quote(&format!("{}_pkey", table))
            ));
        }

        if from.native_type != to.native_type {
            if self.adapter == AdapterId::Postgres {
                stmts.push(format!(
                    "{} TYPE {} USING {}::{};",
                    prefix,
                    to.native_type,
                    self.quote(&to.name),
                    to.native_type
                ));
            } else {
                stmts.push(format!("{} TYPE {};", prefix, to.native_type));
            }
        }

        if from.not_null != to.not_null {
            if to.not_null {
                stmts.push(format!("{} SET NOT NULL;", prefix));
            } else {
                stmts.push(format!("{} DROP NOT NULL;", prefix));
            }
        }

        let from_default = from.native_default.as_deref().filter(|d| !d.is_empty());
        let to_default = to.native_default.as_deref().filter(|d| !d.is_empty());
        if from_default != to_default {
            match to_default {
                Some(default) => stmts.push(format!("{} SET DEFAULT {};", prefix, default)),
                None => stmts.push(format!("{} DROP DEFAULT;", prefix)),
            }
        }

        if !from.primary_key && to.primary_key {
            stmts.push(match self.adapter {
                AdapterId::CockroachDb => format!(
                    "ALTER TABLE {} ALTER PRIMARY KEY USING COLUMNS ({});",
                    self.quote(table),
                    self.quote(&to.name)
                ),
                _ => format!(
                    "ALTER TABLE {} ADD PRIMARY KEY ({});",
                    self.quote(table),
                    self.quote(&to.name)
                ),
            });
        }

        Ok(stmts)
    }

    /// Generate a CREATE INDEX statement.
    pub fn create_index(&self, table: &str, index: &Index) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let cols: Vec<String> = index.columns.iter().map(|c| self.quote(c)).collect();
        format!(
            "CREATE {}INDEX {} ON {}({});",
            unique,
            self.quote(&index.name_for(table)),
            self.quote(table),
            cols.join(", ")
        )
    }

    /// Generate a DROP INDEX statement.
    pub fn drop_index(&self, table: &str, index: &Index) -> String {
        let name = self.quote(&index.name_for(table));
        match self.adapter {
            AdapterId::Mysql => format!("DROP INDEX {} ON {};", name, self.quote(table)),
            AdapterId::CockroachDb => format!(
                "DROP INDEX IF EXISTS {}@{} CASCADE;",
                self.quote(table),
                name
            ),
            _ => format!("DROP INDEX IF EXISTS {};", name),
        }
    }
}
