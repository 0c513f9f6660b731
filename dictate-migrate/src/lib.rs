//! # dictate-migrate
//!
//! Schema reconciliation engine for Dictate.
//!
//! This crate provides functionality for:
//! - Discovering live table schemas through a [`SchemaExplorer`], with a per-table cache
//! - Diffing a discovered schema against its declaration
//! - Planning and applying DDL per table, with destructive-operation gating and dry runs
//! - Wrapping each table's DDL in a transaction where the backend supports it
//! - Batch update and diff over every declared and live table
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐     ┌────────────────┐     ┌─────────────┐
//! │ SchemaRegistry │────▶│  SchemaDiff    │────▶│ DDL plan    │
//! └────────────────┘     └────────────────┘     └─────────────┘
//!                              ▲                     │
//!                              │                     ▼
//!                      ┌────────────────┐     ┌─────────────┐
//!                      │ SchemaExplorer │     │ DdlExecutor │
//!                      │  + SchemaCache │     └─────────────┘
//!                      └────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use dictate_migrate::{MemoryDatabase, MigrateOptions, SchemaMigrator};
//! use dictate_schema::{AdapterId, FieldOptions, SchemaRegistry};
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = SchemaRegistry::new(AdapterId::Postgres);
//!     registry.define("users", |t| {
//!         t.field("id", FieldOptions::primary_key())?
//!             .field("email", FieldOptions::string().size(128).not_null())?
//!             .index("email", Default::default())?;
//!         Ok(())
//!     })?;
//!
//!     let db = MemoryDatabase::new(AdapterId::Postgres);
//!     let migrator = SchemaMigrator::new(&registry, &db, &db);
//!
//!     let delta = migrator.diff_schema().await?;
//!     println!("Pending: {}", delta.summary());
//!
//!     let report = migrator.update_schema(MigrateOptions::new()).await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Options
//!
//! Options can be loaded from TOML, either at the top level or under a
//! `[migrate]` table:
//!
//! ```toml
//! [migrate]
//! dry_run = false
//! destructive = { tables = false, columns = true }
//! ```

pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod memory;
pub mod migrator;
pub mod sql;

// Re-exports
pub use config::{Destructive, DestructiveFlags, DestructiveKind, MigrateOptions};
pub use diff::{diff, diff_with, Change, DiffOptions, IndexChange, SchemaDelta, TableDelta};
pub use engine::{BatchReport, SchemaMigrator};
pub use error::{MigrateResult, MigrationError};
pub use executor::{DdlExecutor, SqlConnection, SqlDdlExecutor};
pub use introspect::{SchemaCache, SchemaExplorer};
pub use memory::MemoryDatabase;
pub use migrator::{
    DdlOperation, MigrationPlan, OperationRecord, SkipReason, TableAction, TableMigrator,
    TableReport,
};
pub use sql::DdlRenderer;
