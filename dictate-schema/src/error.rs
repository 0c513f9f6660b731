//! Error types for schema declaration and type resolution.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors raised while declaring a table schema.
///
/// Declaration errors are fatal: they surface while models are being loaded,
/// before any database work starts.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A field with the same name was already declared on the table.
    #[error("cannot redefine field `{table}.{field}`")]
    #[diagnostic(code(dictate::schema::duplicate_field))]
    DuplicateField { table: String, field: String },

    /// A second primary key was declared on the table.
    #[error("cannot redefine primary key `{table}.{existing}` with `{field}`")]
    #[diagnostic(
        code(dictate::schema::primary_key_conflict),
        help("a table supports at most one primary-key column")
    )]
    PrimaryKeyConflict {
        table: String,
        existing: String,
        field: String,
    },

    /// An index was declared with an unusable column list.
    #[error("invalid column reference in index definition on `{table}`: {message}")]
    #[diagnostic(code(dictate::schema::invalid_index_columns))]
    InvalidIndexColumns { table: String, message: String },

    /// Strict type resolution found no catalog entry.
    #[error("no native type for `{column_type}` on adapter `{adapter}`")]
    #[diagnostic(code(dictate::schema::unresolved_adapter_type))]
    UnresolvedAdapterType { adapter: String, column_type: String },

    /// The adapter name is not one of the supported backends.
    #[error("unknown database adapter `{0}`")]
    #[diagnostic(
        code(dictate::schema::unknown_adapter),
        help("expected one of: postgres, cockroachdb, sqlite, mysql")
    )]
    UnknownAdapter(String),
}

impl SchemaError {
    /// Create a duplicate field error.
    pub fn duplicate_field(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self::DuplicateField {
            table: table.into(),
            field: field.into(),
        }
    }

    /// Create an invalid index columns error.
    pub fn invalid_index_columns(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidIndexColumns {
            table: table.into(),
            message: message.into(),
        }
    }
}
