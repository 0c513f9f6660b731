//! In-process database backend.
//!
//! Keeps table schemas in memory, records every statement it is asked to run
//! and applies the effect of each DDL operation to its tables, so a
//! reconcile followed by discovery can be checked for convergence.

use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smol_str::SmolStr;

use dictate_schema::{AdapterId, Column, Index, TableSchema};

use crate::error::{MigrateResult, MigrationError};
use crate::executor::DdlExecutor;
use crate::introspect::SchemaExplorer;
use crate::sql::DdlRenderer;

#[derive(Debug, Default)]
struct MemoryState {
    tables: IndexMap<SmolStr, TableSchema>,
    snapshot: Option<IndexMap<SmolStr, TableSchema>>,
    statements: Vec<String>,
}

/// In-memory database implementing [`SchemaExplorer`] and [`DdlExecutor`].
#[derive(Debug)]
pub struct MemoryDatabase {
    renderer: DdlRenderer,
    transactional: bool,
    fail_on: Option<String>,
    offline: bool,
    discoveries: AtomicUsize,
    state: Mutex<MemoryState>,
}

impl MemoryDatabase {
    /// Create an empty database speaking an adapter's dialect.
    pub fn new(adapter: AdapterId) -> Self {
        Self {
            renderer: DdlRenderer::new(adapter),
            transactional: adapter.supports_transactional_ddl(),
            fail_on: None,
            offline: false,
            discoveries: AtomicUsize::new(0),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Override whether transactional DDL is advertised.
    pub fn with_transactional_ddl(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }

    /// Fail any statement containing `fragment`, e.g. `"DROP COLUMN"`.
    pub fn fail_on(mut self, fragment: impl Into<String>) -> Self {
        self.fail_on = Some(fragment.into());
        self
    }

    /// Make every discovery call fail.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// Add a live table.
    pub fn with_table(self, table: TableSchema) -> Self {
        self.state.lock().tables.insert(table.name.clone(), table);
        self
    }

    /// Current schema of a live table.
    pub fn table(&self, name: &str) -> Option<TableSchema> {
        self.state.lock().tables.get(name).cloned()
    }

    /// Statements executed so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.state.lock().statements.clone()
    }

    /// Forget the recorded statements.
    pub fn clear_statements(&self) {
        self.state.lock().statements.clear();
    }

    /// Number of discovery calls served.
    pub fn discoveries(&self) -> usize {
        self.discoveries.load(Ordering::SeqCst)
    }

    /// Record a statement and apply its effect, unless it is configured to fail.
    fn apply<F>(&self, sql: String, f: F) -> MigrateResult<()>
    where
        F: FnOnce(&mut IndexMap<SmolStr, TableSchema>) -> MigrateResult<()>,
    {
        if let Some(fragment) = &self.fail_on {
            if sql.contains(fragment.as_str()) {
                return Err(MigrationError::database(format!("statement rejected: {}", sql)));
            }
        }
        let mut state = self.state.lock();
        f(&mut state.tables)?;
        state.statements.push(sql);
        Ok(())
    }

    fn check_online(&self) -> MigrateResult<()> {
        if self.offline {
            Err(MigrationError::database("connection refused"))
        } else {
            Ok(())
        }
    }
}

fn table_mut<'a>(
    tables: &'a mut IndexMap<SmolStr, TableSchema>,
    name: &str,
) -> MigrateResult<&'a mut TableSchema> {
    tables
        .get_mut(name)
        .ok_or_else(|| MigrationError::database(format!("relation \"{}\" does not exist", name)))
}

#[async_trait::async_trait]
impl SchemaExplorer for MemoryDatabase {
    async fn table_names(&self) -> MigrateResult<Vec<String>> {
        self.check_online()?;
        Ok(self.state.lock().tables.keys().map(|k| k.to_string()).collect())
    }

    async fn discover(&self, table: &str) -> MigrateResult<Option<TableSchema>> {
        self.check_online()?;
        self.discoveries.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lock().tables.get(table).cloned())
    }
}

#[async_trait::async_trait]
impl DdlExecutor for MemoryDatabase {
    fn supports_transactional_ddl(&self) -> bool {
        self.transactional
    }

    async fn create_table(&self, table: &str, column: &Column) -> MigrateResult<()> {
        self.apply(self.renderer.create_table(table, column), |tables| {
            if tables.contains_key(table) {
                return Err(MigrationError::database(format!(
                    "relation \"{}\" already exists",
                    table
                )));
            }
            let mut schema = TableSchema::new(table);
            schema.add_column(column.clone())?;
            tables.insert(SmolStr::new(table), schema);
            Ok(())
        })
    }

    async fn add_column(&self, table: &str, column: &Column) -> MigrateResult<()> {
        self.apply(self.renderer.add_column(table, column), |tables| {
            table_mut(tables, table)?
                .add_column(column.clone())
                .map_err(|err| MigrationError::database(err.to_string()))
        })
    }

    async fn alter_column(&self, table: &str, from: &Column, to: &Column) -> MigrateResult<()> {
        let sql = self.renderer.alter_column(table, from, to)?.join("\n");
        self.apply(sql, |tables| {
            let schema = table_mut(tables, table)?;
            if !schema.has_column(&to.name) {
                return Err(MigrationError::database(format!(
                    "column \"{}\" does not exist",
                    to.name
                )));
            }
            schema.put_column(to.clone());
            Ok(())
        })
    }

    async fn drop_column(&self, table: &str, column: &str) -> MigrateResult<()> {
        self.apply(self.renderer.drop_column(table, column), |tables| {
            let schema = table_mut(tables, table)?;
            schema
                .remove_column(column)
                .ok_or_else(|| MigrationError::database(format!("column \"{}\" does not exist", column)))?;
            let stale: Vec<Vec<SmolStr>> = schema
                .indexes()
                .iter()
                .filter(|i| i.columns.iter().any(|c| c == column))
                .map(|i| i.columns.clone())
                .collect();
            for columns in stale {
                schema.remove_index(&columns);
            }
            Ok(())
        })
    }

    async fn add_index(&self, table: &str, index: &Index) -> MigrateResult<()> {
        self.apply(self.renderer.create_index(table, index), |tables| {
            let named = index.clone().with_name(index.name_for(table));
            table_mut(tables, table)?.add_index(named)?;
            Ok(())
        })
    }

    async fn drop_index(&self, table: &str, index: &Index) -> MigrateResult<()> {
        self.apply(self.renderer.drop_index(table, index), |tables| {
            let name = index.name_for(table);
            table_mut(tables, table)?
                .retain_indexes(|i| i.columns != index.columns || i.name_for(table) != name);
            Ok(())
        })
    }

    async fn drop_table(&self, table: &str) -> MigrateResult<()> {
        self.apply(self.renderer.drop_table(table), |tables| {
            tables.shift_remove(table);
            Ok(())
        })
    }

    async fn begin(&self) -> MigrateResult<()> {
        let mut state = self.state.lock();
        state.snapshot = Some(state.tables.clone());
        state.statements.push("BEGIN".to_string());
        Ok(())
    }

    async fn commit(&self) -> MigrateResult<()> {
        let mut state = self.state.lock();
        state.snapshot = None;
        state.statements.push("COMMIT".to_string());
        Ok(())
    }

    async fn rollback(&self) -> MigrateResult<()> {
        let mut state = self.state.lock();
        if let Some(snapshot) = state.snapshot.take() {
            state.tables = snapshot;
        }
        state.statements.push("ROLLBACK".to_string());
        Ok(())
    }
}
