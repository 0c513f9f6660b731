//! # dictate-schema
//!
//! Table schema model and type catalog for Dictate.
//!
//! This crate provides:
//! - [`TableSchema`], [`Column`] and [`Index`]: the normalized representation
//!   shared by declared and discovered schemas
//! - [`TableBuilder`] and [`SchemaRegistry`] for declaring target schemas
//! - [`TypeCatalog`], mapping semantic column types to each adapter's native types
//!
//! ## Example
//!
//! ```rust
//! use dictate_schema::{AdapterId, FieldOptions, IndexOptions, SchemaRegistry};
//!
//! let mut registry = SchemaRegistry::new(AdapterId::Postgres);
//! registry.define("accounts", |t| {
//!     t.field("id", FieldOptions::primary_key())?
//!         .field("customer_id", FieldOptions::integer().not_null())?
//!         .field("name", FieldOptions::string().size(64))?
//!         .index(["customer_id", "name"], IndexOptions::new().unique())?;
//!     Ok(())
//! })?;
//!
//! let accounts = registry.get("accounts").unwrap();
//! assert_eq!(accounts.column("name").unwrap().native_type, "character varying(64)");
//! # Ok::<(), dictate_schema::SchemaError>(())
//! ```

pub mod catalog;
pub mod column;
pub mod error;
pub mod index;
pub mod registry;
pub mod table;
pub mod types;

pub use catalog::{CatalogEntry, NativeType, TypeCatalog, TypeOverrides, TypeRequest};
pub use column::{Column, FieldDefault, FieldOptions};
pub use error::{SchemaError, SchemaResult};
pub use index::{Index, IndexColumns, IndexOptions};
pub use registry::SchemaRegistry;
pub use table::{TableBuilder, TableSchema};
pub use types::{AdapterId, ColumnDefault, ColumnSize, ColumnType, DefaultGenerator, LiteralValue};
