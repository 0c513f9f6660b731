//! Shared fixtures for integration tests.

#![allow(dead_code)]

use dictate::migrate::MemoryDatabase;
use dictate::schema::{AdapterId, SchemaRegistry, SchemaResult, TableBuilder, TableSchema};

/// Install a test subscriber; `RUST_LOG` controls the output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Declare a single table in a fresh registry.
pub fn declare<F>(adapter: AdapterId, table: &str, f: F) -> SchemaRegistry
where
    F: FnOnce(&mut TableBuilder<'_>) -> SchemaResult<()>,
{
    let mut registry = SchemaRegistry::new(adapter);
    registry.define(table, f).unwrap();
    registry
}

/// A database already holding the given declared tables.
pub fn database_with(adapter: AdapterId, registry: &SchemaRegistry) -> MemoryDatabase {
    registry
        .iter()
        .fold(MemoryDatabase::new(adapter), |db, table: &TableSchema| {
            db.with_table(table.clone())
        })
}
