//! Batch schema update and diff across every table.

use std::time::Instant;

use indexmap::IndexSet;
use serde::Serialize;
use tracing::{error, info};

use dictate_schema::SchemaRegistry;

use crate::config::MigrateOptions;
use crate::diff::{DiffOptions, SchemaDelta};
use crate::error::MigrateResult;
use crate::executor::DdlExecutor;
use crate::introspect::{SchemaCache, SchemaExplorer};
use crate::migrator::{TableAction, TableMigrator, TableReport};

/// Result of a batch schema update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// Per-table reports, in processing order.
    pub tables: Vec<TableReport>,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl BatchReport {
    /// Report for one table.
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Number of operations that ran.
    pub fn executed_count(&self) -> usize {
        self.tables.iter().map(|t| t.executed().count()).sum()
    }

    /// Number of operations that were planned but not run.
    pub fn skipped_count(&self) -> usize {
        self.tables.iter().map(|t| t.skipped().count()).sum()
    }

    /// Check if any operation ran.
    pub fn has_changes(&self) -> bool {
        self.executed_count() > 0
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        let executed = self.executed_count();
        let skipped = self.skipped_count();
        if executed == 0 && skipped == 0 {
            return "No changes".to_string();
        }
        let mut parts = vec![format!("{} operations executed", executed)];
        if skipped > 0 {
            parts.push(format!("{} skipped", skipped));
        }
        format!(
            "{} across {} tables in {}ms",
            parts.join(", "),
            self.tables.len(),
            self.duration_ms
        )
    }
}

/// Reconciles every declared and live table.
///
/// ```rust,ignore
/// use dictate_migrate::{MigrateOptions, SchemaMigrator};
///
/// let migrator = SchemaMigrator::new(&registry, &db, &db);
/// let delta = migrator.diff_schema().await?;
/// println!("{}", delta.summary());
///
/// let report = migrator
///     .update_schema(MigrateOptions::new().allow_drop_columns(true))
///     .await?;
/// println!("{}", report.summary());
/// ```
pub struct SchemaMigrator<'a> {
    registry: &'a SchemaRegistry,
    explorer: &'a dyn SchemaExplorer,
    executor: &'a dyn DdlExecutor,
    cache: SchemaCache,
    diff_options: DiffOptions,
}

impl<'a> SchemaMigrator<'a> {
    /// Create a migrator over a registry and a backend.
    pub fn new(
        registry: &'a SchemaRegistry,
        explorer: &'a dyn SchemaExplorer,
        executor: &'a dyn DdlExecutor,
    ) -> Self {
        Self {
            registry,
            explorer,
            executor,
            cache: SchemaCache::new(),
            diff_options: DiffOptions::default(),
        }
    }

    /// Set the diff options.
    pub fn diff_options(mut self, diff_options: DiffOptions) -> Self {
        self.diff_options = diff_options;
        self
    }

    /// The discovered-schema cache.
    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Declared table names first, then live tables that are not declared.
    pub async fn table_names(&self) -> MigrateResult<Vec<String>> {
        let mut names: IndexSet<String> = self.registry.table_names().map(str::to_string).collect();
        names.extend(self.explorer.table_names().await?);
        Ok(names.into_iter().collect())
    }

    fn table_migrator<'b>(&'b self, table: &'b str) -> TableMigrator<'b> {
        TableMigrator::new(
            table,
            self.registry.get(table),
            self.explorer,
            self.executor,
            &self.cache,
        )
        .diff_options(self.diff_options)
    }

    /// Migrate a single table.
    pub async fn migrate_table(&self, table: &str, options: MigrateOptions) -> MigrateResult<TableReport> {
        self.table_migrator(table).options(options).run().await
    }

    /// Bring every table in line with its declaration.
    ///
    /// Tables are processed one after another; the first error aborts the batch.
    pub async fn update_schema(&self, options: MigrateOptions) -> MigrateResult<BatchReport> {
        let started = Instant::now();
        info!(dry_run = options.dry_run, "Updating schema");

        let mut tables = Vec::new();
        for name in self.table_names().await? {
            match self.migrate_table(&name, options).await {
                Ok(report) => tables.push(report),
                Err(err) => {
                    error!(table = %name, error = %err, "Schema update failed");
                    return Err(err);
                }
            }
        }

        let report = BatchReport {
            tables,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(duration_ms = report.duration_ms, "Schema updated: {}", report.summary());
        Ok(report)
    }

    /// Compute the pending changes without executing anything.
    pub async fn diff_schema(&self) -> MigrateResult<SchemaDelta> {
        let mut delta = SchemaDelta::default();

        for name in self.table_names().await? {
            let plan = self
                .table_migrator(&name)
                .plan()
                .await
                .inspect_err(|err| error!(table = %name, error = %err, "Schema diff failed"))?;

            match plan.action {
                TableAction::Create => {
                    if let Some(declared) = self.registry.get(&name) {
                        delta.add_tables.insert(plan.table, declared.clone());
                    }
                }
                TableAction::Drop => {
                    if let Some(discovered) = plan.discovered {
                        delta.drop_tables.insert(plan.table, (*discovered).clone());
                    }
                }
                TableAction::Reconcile => {
                    if let Some(table_delta) = plan.delta.filter(|d| !d.is_empty()) {
                        delta.change_tables.insert(plan.table, table_delta);
                    }
                }
            }
        }

        info!("Schema diff: {}", delta.summary());
        Ok(delta)
    }
}
