//! Per-table migration: discovery, planning and gated DDL application.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use smol_str::SmolStr;
use tracing::{Instrument, error, info, info_span, warn};

use dictate_schema::{Column, Index, TableSchema};

use crate::config::{DestructiveKind, MigrateOptions};
use crate::diff::{DiffOptions, TableDelta, diff_with};
use crate::error::{MigrateResult, MigrationError};
use crate::executor::DdlExecutor;
use crate::introspect::{SchemaCache, SchemaExplorer};

/// What a migration does to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableAction {
    /// The table is declared but missing.
    Create,
    /// The table is declared and present.
    Reconcile,
    /// The table is present but not declared.
    Drop,
}

impl fmt::Display for TableAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Reconcile => "reconcile",
            Self::Drop => "drop",
        })
    }
}

/// A single DDL operation on a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DdlOperation {
    /// Create the table with its leading column.
    CreateTable { column: Column },
    /// Add a column.
    AddColumn { column: Column },
    /// Change a column definition.
    AlterColumn { from: Column, to: Column },
    /// Drop a column.
    DropColumn { column: Column },
    /// Create an index.
    AddIndex { index: Index },
    /// Drop an index.
    DropIndex { index: Index },
    /// Drop the whole table.
    DropTable,
}

impl DdlOperation {
    /// Destructive permission required to execute this operation.
    ///
    /// Index drops, column additions and alterations are always permitted.
    pub fn destructive_kind(&self) -> Option<DestructiveKind> {
        match self {
            Self::DropTable => Some(DestructiveKind::Tables),
            Self::DropColumn { .. } => Some(DestructiveKind::Columns),
            _ => None,
        }
    }
}

impl fmt::Display for DdlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { column } => write!(f, "create table with {}", column),
            Self::AddColumn { column } => write!(f, "add column {}", column),
            Self::AlterColumn { from, to } => write!(f, "alter column {} -> {}", from, to),
            Self::DropColumn { column } => write!(f, "drop column {}", column.name),
            Self::AddIndex { index } => write!(f, "add index {}", index),
            Self::DropIndex { index } => write!(f, "drop index {}", index),
            Self::DropTable => f.write_str("drop table"),
        }
    }
}

/// Why a planned operation was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The run is a dry run.
    DryRun,
    /// The destructive options do not allow it.
    NotPermitted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DryRun => "dry run",
            Self::NotPermitted => "not permitted",
        })
    }
}

/// Outcome of one planned operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationRecord {
    /// The operation.
    pub operation: DdlOperation,
    /// Whether it ran.
    pub executed: bool,
    /// Why it did not run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

/// Everything computed for one table before execution.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Table name.
    pub table: SmolStr,
    /// Action to take.
    pub action: TableAction,
    /// Discovered schema, when the table exists.
    pub discovered: Option<Arc<TableSchema>>,
    /// Column and index delta, for reconciled tables.
    pub delta: Option<TableDelta>,
    /// Operations in execution order.
    pub operations: Vec<DdlOperation>,
}

impl MigrationPlan {
    /// Whether there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Result of migrating one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    /// Table name.
    pub table: SmolStr,
    /// Action taken.
    pub action: TableAction,
    /// Planned operations and what happened to each.
    pub operations: Vec<OperationRecord>,
}

impl TableReport {
    /// Operations that ran.
    pub fn executed(&self) -> impl Iterator<Item = &DdlOperation> {
        self.operations
            .iter()
            .filter(|r| r.executed)
            .map(|r| &r.operation)
    }

    /// Operations that did not run, with the reason.
    pub fn skipped(&self) -> impl Iterator<Item = (&DdlOperation, SkipReason)> {
        self.operations
            .iter()
            .filter_map(|r| r.skipped.map(|reason| (&r.operation, reason)))
    }

    /// Whether nothing was planned.
    pub fn is_noop(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Migrates one table from its discovered to its declared schema.
pub struct TableMigrator<'a> {
    table: &'a str,
    declared: Option<&'a TableSchema>,
    explorer: &'a dyn SchemaExplorer,
    executor: &'a dyn DdlExecutor,
    cache: &'a SchemaCache,
    options: MigrateOptions,
    diff_options: DiffOptions,
}

impl<'a> TableMigrator<'a> {
    /// Create a migrator for `table`. `declared` is `None` for undeclared tables.
    pub fn new(
        table: &'a str,
        declared: Option<&'a TableSchema>,
        explorer: &'a dyn SchemaExplorer,
        executor: &'a dyn DdlExecutor,
        cache: &'a SchemaCache,
    ) -> Self {
        Self {
            table,
            declared,
            explorer,
            executor,
            cache,
            options: MigrateOptions::default(),
            diff_options: DiffOptions::default(),
        }
    }

    /// Set the run options.
    pub fn options(mut self, options: MigrateOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the diff options.
    pub fn diff_options(mut self, diff_options: DiffOptions) -> Self {
        self.diff_options = diff_options;
        self
    }

    /// Discover the live table and plan the operations.
    pub async fn plan(&self) -> MigrateResult<MigrationPlan> {
        let discovered = self.cache.get_or_discover(self.explorer, self.table).await?;

        let (action, delta, operations) = match (discovered.as_deref(), self.declared) {
            (None, None) => return Err(MigrationError::no_schema_found(self.table)),
            (None, Some(to)) => (TableAction::Create, None, self.plan_create(to)?),
            (Some(_), None) => (TableAction::Drop, None, vec![DdlOperation::DropTable]),
            (Some(from), Some(to)) => {
                let delta = diff_with(from, to, &self.diff_options);
                let operations = plan_reconcile(&delta);
                (TableAction::Reconcile, Some(delta), operations)
            }
        };

        Ok(MigrationPlan {
            table: SmolStr::new(self.table),
            action,
            discovered,
            delta,
            operations,
        })
    }

    fn plan_create(&self, to: &TableSchema) -> MigrateResult<Vec<DdlOperation>> {
        let lead = to
            .primary_key()
            .or_else(|| to.columns().next())
            .ok_or_else(|| MigrationError::EmptyTable {
                table: self.table.to_string(),
            })?;

        let mut operations = vec![DdlOperation::CreateTable {
            column: lead.clone(),
        }];
        operations.extend(
            to.columns()
                .filter(|c| c.name != lead.name)
                .map(|c| DdlOperation::AddColumn { column: c.clone() }),
        );
        operations.extend(
            to.indexes()
                .iter()
                .map(|i| DdlOperation::AddIndex { index: i.clone() }),
        );
        Ok(operations)
    }

    /// Plan and apply the operations.
    pub async fn run(&self) -> MigrateResult<TableReport> {
        let span = info_span!("migrate_table", table = %self.table);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> MigrateResult<TableReport> {
        let plan = self.plan().await?;
        info!(action = %plan.action, "Migrating table");

        let mut records: Vec<OperationRecord> = plan
            .operations
            .into_iter()
            .map(|operation| {
                let skipped = if self.options.dry_run {
                    Some(SkipReason::DryRun)
                } else if operation
                    .destructive_kind()
                    .is_some_and(|kind| !self.options.allows(kind))
                {
                    Some(SkipReason::NotPermitted)
                } else {
                    None
                };
                OperationRecord {
                    operation,
                    executed: false,
                    skipped,
                }
            })
            .collect();

        if records.is_empty() {
            info!("No changes");
        } else if records.iter().any(|r| r.skipped.is_none())
            && self.executor.supports_transactional_ddl()
        {
            self.apply_in_transaction(&mut records).await?;
        } else {
            self.apply(&mut records).await?;
        }

        self.cache.invalidate(self.table);

        Ok(TableReport {
            table: SmolStr::new(self.table),
            action: plan.action,
            operations: records,
        })
    }

    async fn apply_in_transaction(&self, records: &mut [OperationRecord]) -> MigrateResult<()> {
        self.executor.begin().await?;

        match AssertUnwindSafe(self.apply(records)).catch_unwind().await {
            Ok(Ok(())) => self.executor.commit().await,
            Ok(Err(err)) => {
                if let Err(rollback_err) = self.executor.rollback().await {
                    error!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
            Err(panic) => {
                if let Err(rollback_err) = self.executor.rollback().await {
                    error!(error = %rollback_err, "Rollback failed");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn apply(&self, records: &mut [OperationRecord]) -> MigrateResult<()> {
        for record in records.iter_mut() {
            match record.skipped {
                Some(SkipReason::DryRun) => {
                    info!(operation = %record.operation, "Planned (dry run)");
                }
                Some(SkipReason::NotPermitted) => {
                    warn!(operation = %record.operation, "Skipped: destructive operation not permitted");
                }
                None => {
                    info!(operation = %record.operation, "Executing");
                    self.execute(&record.operation)
                        .await
                        .map_err(|err| MigrationError::failure(self.table, &record.operation, err))?;
                    record.executed = true;
                }
            }
        }
        Ok(())
    }

    async fn execute(&self, operation: &DdlOperation) -> MigrateResult<()> {
        let table = self.table;
        match operation {
            DdlOperation::CreateTable { column } => self.executor.create_table(table, column).await,
            DdlOperation::AddColumn { column } => self.executor.add_column(table, column).await,
            DdlOperation::AlterColumn { from, to } => self.executor.alter_column(table, from, to).await,
            DdlOperation::DropColumn { column } => self.executor.drop_column(table, &column.name).await,
            DdlOperation::AddIndex { index } => self.executor.add_index(table, index).await,
            DdlOperation::DropIndex { index } => self.executor.drop_index(table, index).await,
            DdlOperation::DropTable => self.executor.drop_table(table).await,
        }
    }
}

/// Reconcile order: drop columns, alter, add columns, drop indexes, add indexes.
fn plan_reconcile(delta: &TableDelta) -> Vec<DdlOperation> {
    let mut operations: Vec<DdlOperation> = delta
        .removed_columns()
        .map(|c| DdlOperation::DropColumn { column: c.clone() })
        .collect();
    operations.extend(delta.changed_columns().map(|(from, to)| DdlOperation::AlterColumn {
        from: from.clone(),
        to: to.clone(),
    }));
    operations.extend(
        delta
            .added_columns()
            .map(|c| DdlOperation::AddColumn { column: c.clone() }),
    );
    operations.extend(
        delta
            .removed_indexes()
            .map(|i| DdlOperation::DropIndex { index: i.clone() }),
    );
    operations.extend(
        delta
            .added_indexes()
            .map(|i| DdlOperation::AddIndex { index: i.clone() }),
    );
    operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatabase;
    use dictate_schema::{AdapterId, FieldOptions, IndexOptions, SchemaRegistry};
    use pretty_assertions::assert_eq;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new(AdapterId::Postgres);
        registry
            .define("users", |t| {
                t.field("id", FieldOptions::primary_key())?
                    .field("name", FieldOptions::string().size(64))?
                    .field("email", FieldOptions::string())?
                    .index("email", IndexOptions::new().unique())?;
                Ok(())
            })
            .unwrap();
        registry
    }

    fn names(report: &TableReport) -> Vec<String> {
        report.operations.iter().map(|r| r.operation.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_puts_primary_key_first() {
        let registry = registry();
        let db = MemoryDatabase::new(AdapterId::Postgres);
        let cache = SchemaCache::new();

        let report = TableMigrator::new("users", registry.get("users"), &db, &db, &cache)
            .run()
            .await
            .unwrap();

        assert_eq!(report.action, TableAction::Create);
        assert!(matches!(
            &report.operations[0].operation,
            DdlOperation::CreateTable { column } if column.name == "id"
        ));
        assert!(matches!(report.operations[1].operation, DdlOperation::AddColumn { .. }));
        assert!(matches!(report.operations[3].operation, DdlOperation::AddIndex { .. }));
        assert_eq!(report.executed().count(), 4);
        assert_eq!(db.statements()[0], "BEGIN");
        assert!(db.statements()[1].starts_with("CREATE TABLE \"users\""));
        assert_eq!(db.statements().last().unwrap(), "COMMIT");
    }

    #[tokio::test]
    async fn test_create_without_primary_key_leads_with_first_column() {
        let mut registry = SchemaRegistry::new(AdapterId::Postgres);
        registry
            .define("events", |t| {
                t.field("kind", FieldOptions::string())?
                    .field("payload", FieldOptions::json())?;
                Ok(())
            })
            .unwrap();
        let db = MemoryDatabase::new(AdapterId::Postgres);
        let cache = SchemaCache::new();

        let report = TableMigrator::new("events", registry.get("events"), &db, &db, &cache)
            .run()
            .await
            .unwrap();
        assert!(matches!(
            &report.operations[0].operation,
            DdlOperation::CreateTable { column } if column.name == "kind"
        ));
    }

    #[tokio::test]
    async fn test_empty_table_is_an_error() {
        let empty = TableSchema::new("empty");
        let db = MemoryDatabase::new(AdapterId::Postgres);
        let cache = SchemaCache::new();
        let err = TableMigrator::new("empty", Some(&empty), &db, &db, &cache)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::EmptyTable { .. }));
    }

    #[tokio::test]
    async fn test_no_schema_found() {
        let db = MemoryDatabase::new(AdapterId::Postgres);
        let cache = SchemaCache::new();
        let err = TableMigrator::new("ghosts", None, &db, &db, &cache)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::NoSchemaFound { .. }));
    }

    #[tokio::test]
    async fn test_reconcile_order() {
        let registry = registry();
        let mut live = registry.get("users").unwrap().clone();
        live.remove_column("email");
        live.remove_index(&[SmolStr::new("email")]);
        live.put_column(
            FieldOptions::string()
                .size(32)
                .into_column("users", "name", AdapterId::Postgres, registry.catalog())
                .0,
        );
        live.add_column(Column::new("legacy", "text", "text")).unwrap();
        live.add_index(Index::new(["legacy"])).unwrap();

        let db = MemoryDatabase::new(AdapterId::Postgres).with_table(live);
        let cache = SchemaCache::new();
        let report = TableMigrator::new("users", registry.get("users"), &db, &db, &cache)
            .options(MigrateOptions::new().allow_drop_columns(true))
            .run()
            .await
            .unwrap();

        let ops: Vec<&str> = report
            .operations
            .iter()
            .map(|r| match r.operation {
                DdlOperation::DropColumn { .. } => "drop_column",
                DdlOperation::AlterColumn { .. } => "alter_column",
                DdlOperation::AddColumn { .. } => "add_column",
                DdlOperation::DropIndex { .. } => "drop_index",
                DdlOperation::AddIndex { .. } => "add_index",
                _ => "other",
            })
            .collect();
        assert_eq!(
            ops,
            vec!["drop_column", "alter_column", "add_column", "drop_index", "add_index"]
        );
        assert_eq!(report.skipped().count(), 0);
    }

    #[tokio::test]
    async fn test_column_drop_is_gated() {
        let registry = registry();
        let mut live = registry.get("users").unwrap().clone();
        live.add_column(Column::new("legacy", "text", "text")).unwrap();
        let db = MemoryDatabase::new(AdapterId::Postgres).with_table(live);
        let cache = SchemaCache::new();

        let report = TableMigrator::new("users", registry.get("users"), &db, &db, &cache)
            .run()
            .await
            .unwrap();

        assert_eq!(names(&report), vec!["drop column legacy".to_string()]);
        assert_eq!(
            report.operations[0].skipped,
            Some(SkipReason::NotPermitted)
        );
        assert!(db.table("users").unwrap().has_column("legacy"));
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let registry = registry();
        let db = MemoryDatabase::new(AdapterId::Postgres);
        let cache = SchemaCache::new();

        let report = TableMigrator::new("users", registry.get("users"), &db, &db, &cache)
            .options(MigrateOptions::new().dry_run(true))
            .run()
            .await
            .unwrap();

        assert_eq!(report.operations.len(), 4);
        assert!(report.skipped().all(|(_, reason)| reason == SkipReason::DryRun));
        assert!(db.statements().is_empty());
        assert!(db.table("users").is_none());
    }

    #[tokio::test]
    async fn test_drop_table_requires_permission() {
        let db = MemoryDatabase::new(AdapterId::CockroachDb).with_table(TableSchema::new("old"));
        let cache = SchemaCache::new();

        let report = TableMigrator::new("old", None, &db, &db, &cache)
            .run()
            .await
            .unwrap();
        assert_eq!(report.action, TableAction::Drop);
        assert_eq!(report.executed().count(), 0);

        let report = TableMigrator::new("old", None, &db, &db, &cache)
            .options(MigrateOptions::new().allow_drop_tables(true))
            .run()
            .await
            .unwrap();
        assert_eq!(report.executed().count(), 1);
        assert!(db.table("old").is_none());
        assert_eq!(db.statements(), vec!["DROP TABLE IF EXISTS \"old\" CASCADE;".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_rolls_back() {
        let registry = registry();
        let db = MemoryDatabase::new(AdapterId::Postgres).fail_on("CREATE UNIQUE INDEX");
        let cache = SchemaCache::new();

        let err = TableMigrator::new("users", registry.get("users"), &db, &db, &cache)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            MigrationError::MigrationFailure { table, .. } if table == "users"
        ));
        assert!(db.table("users").is_none());
        assert_eq!(db.statements().last().map(String::as_str), Some("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_failure_without_transactional_ddl_keeps_partial_work() {
        let registry = registry();
        let db = MemoryDatabase::new(AdapterId::Mysql).fail_on("CREATE UNIQUE INDEX");
        let cache = SchemaCache::new();

        TableMigrator::new("users", registry.get("users"), &db, &db, &cache)
            .run()
            .await
            .unwrap_err();

        assert_eq!(db.table("users").unwrap().column_count(), 3);
        assert!(!db.statements().iter().any(|s| s == "BEGIN"));
    }

    fn tokens(adapter: AdapterId, key: FieldOptions) -> TableSchema {
        let mut registry = SchemaRegistry::new(adapter);
        registry
            .define("tokens", |t| {
                t.field("uuid", key)?.field("label", FieldOptions::text())?;
                Ok(())
            })
            .unwrap();
        registry.get("tokens").unwrap().clone()
    }

    #[tokio::test]
    async fn test_primary_key_change_converges() {
        let live = tokens(AdapterId::Postgres, FieldOptions::string().size(36).not_null());
        let declared = tokens(AdapterId::Postgres, FieldOptions::string().size(36).primary());
        let db = MemoryDatabase::new(AdapterId::Postgres).with_table(live);
        let cache = SchemaCache::new();

        let migrator = TableMigrator::new("tokens", Some(&declared), &db, &db, &cache);
        let report = migrator.run().await.unwrap();
        assert_eq!(report.executed().count(), 1);
        assert!(
            db.statements()
                .contains(&"ALTER TABLE \"tokens\" ADD PRIMARY KEY (\"uuid\");".to_string())
        );

        let report = migrator.run().await.unwrap();
        assert!(report.is_noop());
    }

    #[tokio::test]
    async fn test_unsupported_primary_key_drop_fails() {
        let live = tokens(AdapterId::CockroachDb, FieldOptions::string().primary());
        let declared = tokens(AdapterId::CockroachDb, FieldOptions::string().not_null());
        let db = MemoryDatabase::new(AdapterId::CockroachDb).with_table(live);
        let cache = SchemaCache::new();

        let err = TableMigrator::new("tokens", Some(&declared), &db, &db, &cache)
            .run()
            .await
            .unwrap_err();
        assert!(matches!(
            &err,
            MigrationError::MigrationFailure { operation, .. } if operation.starts_with("alter column uuid")
        ));
        assert!(db.table("tokens").unwrap().column("uuid").unwrap().primary_key);
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn test_indexes_sharing_columns_are_all_dropped() {
        let declared = tokens(AdapterId::Postgres, FieldOptions::string().size(36).primary());
        let mut live = declared.clone();
        live.add_index(Index::new(["label"]).with_name("a_idx")).unwrap();
        live.add_index(Index::new(["label"]).unique().with_name("b_key"))
            .unwrap();
        let db = MemoryDatabase::new(AdapterId::Postgres).with_table(live);
        let cache = SchemaCache::new();

        let migrator = TableMigrator::new("tokens", Some(&declared), &db, &db, &cache);
        let report = migrator.run().await.unwrap();
        assert_eq!(
            names(&report),
            vec![
                "drop index [label] name: a_idx".to_string(),
                "drop index [label] unique name: b_key".to_string(),
            ]
        );
        assert_eq!(
            db.statements(),
            vec![
                "BEGIN".to_string(),
                "DROP INDEX IF EXISTS \"a_idx\";".to_string(),
                "DROP INDEX IF EXISTS \"b_key\";".to_string(),
                "COMMIT".to_string(),
            ]
        );
        assert!(db.table("tokens").unwrap().indexes().is_empty());
        assert!(migrator.run().await.unwrap().is_noop());
    }

    #[tokio::test]
    async fn test_cache_invalidated_after_run() {
        let registry = registry();
        let db = MemoryDatabase::new(AdapterId::Postgres);
        let cache = SchemaCache::new();

        let migrator = TableMigrator::new("users", registry.get("users"), &db, &db, &cache);
        migrator.run().await.unwrap();
        assert!(!cache.contains("users"));

        let report = migrator.run().await.unwrap();
        assert_eq!(report.action, TableAction::Reconcile);
        assert!(report.is_noop());
        assert_eq!(db.discoveries(), 2);
    }
}
