//! Error types for the migration engine.

use dictate_schema::SchemaError;
use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur while reconciling a schema.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The table is neither declared nor present in the database.
    #[error("no schema found for table '{table}'")]
    NoSchemaFound {
        /// Table name.
        table: String,
    },

    /// A declared table has no columns to create it with.
    #[error("cannot create table '{table}' without columns")]
    EmptyTable {
        /// Table name.
        table: String,
    },

    /// A DDL operation failed on the backend.
    #[error("migration of table '{table}' failed during {operation}: {source}")]
    MigrationFailure {
        /// Table name.
        table: String,
        /// Description of the failing operation.
        operation: String,
        /// Backend error.
        #[source]
        source: Box<MigrationError>,
    },

    /// Database operation error.
    #[error("Database error: {0}")]
    Database(String),

    /// Declaration error.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Invalid migration options.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a no-schema-found error.
    pub fn no_schema_found(table: impl Into<String>) -> Self {
        Self::NoSchemaFound {
            table: table.into(),
        }
    }

    /// Wrap a backend error with the table and operation it occurred in.
    pub fn failure(table: impl Into<String>, operation: impl ToString, source: MigrationError) -> Self {
        Self::MigrationFailure {
            table: table.into(),
            operation: operation.to_string(),
            source: Box::new(source),
        }
    }

    /// Table the error relates to, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::NoSchemaFound { table }
            | Self::EmptyTable { table }
            | Self::MigrationFailure { table, .. } => Some(table),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for MigrationError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
