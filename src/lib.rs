//! # Dictate
//!
//! Declarative database schema reconciliation.
//!
//! Tables are declared in code; Dictate discovers the live schema, diffs it
//! against the declaration and applies the DDL needed to converge, on
//! PostgreSQL, CockroachDB, SQLite and MySQL.
//!
//! Dictate provides:
//! - A per-adapter type catalog mapping semantic column types to native types
//! - A declaration builder and registry of target table schemas
//! - A structural diff between discovered and declared schemas
//! - A per-table migrator with destructive-operation gating, dry runs and
//!   transactional DDL where the backend supports it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dictate::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = SchemaRegistry::new(AdapterId::Postgres);
//!     registry.define("users", |t| {
//!         t.field("id", FieldOptions::primary_key())?
//!             .field("email", FieldOptions::string().size(128).not_null())?
//!             .field("visits", FieldOptions::integer().default(0))?
//!             .index("email", IndexOptions::new().unique())?;
//!         Ok(())
//!     })?;
//!
//!     let conn = PgConnection::connect("postgresql://localhost/mydb", AdapterId::Postgres).await?;
//!     let executor = conn.executor();
//!     let migrator = SchemaMigrator::new(&registry, &conn, &executor);
//!
//!     println!("{}", migrator.diff_schema().await?.summary());
//!     migrator
//!         .update_schema(MigrateOptions::new().allow_drop_columns(true))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Table schemas, declaration builder and type catalog.
pub mod schema {
    pub use dictate_schema::*;
}

/// Discovery, diffing and DDL application.
pub mod migrate {
    pub use dictate_migrate::*;
}

/// PostgreSQL and CockroachDB support.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use dictate_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        BatchReport, DdlExecutor, MemoryDatabase, MigrateOptions, MigrationError, SchemaDelta,
        SchemaExplorer, SchemaMigrator, SqlDdlExecutor, TableMigrator, TableReport,
    };
    #[cfg(feature = "postgres")]
    pub use crate::postgres::PgConnection;
    pub use crate::schema::{
        AdapterId, ColumnType, FieldOptions, IndexOptions, SchemaError, SchemaRegistry,
        TableSchema, TypeCatalog,
    };
}

// Re-export key types at the crate root
pub use migrate::{MigrateOptions, MigrationError, SchemaMigrator};
pub use schema::{SchemaError, SchemaRegistry, TableSchema};
