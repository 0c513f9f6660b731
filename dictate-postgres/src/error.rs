//! Error types for PostgreSQL operations.

use dictate_migrate::MigrationError;
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// A discovered table could not be mapped to a schema.
    #[error("cannot discover table '{table}': {message}")]
    Discovery {
        /// Table being discovered.
        table: String,
        /// What went wrong.
        message: String,
    },
}

impl PgError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a discovery error.
    pub fn discovery(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Postgres(e) => e.is_closed(),
            Self::Discovery { .. } => false,
        }
    }

    /// SQLSTATE code reported by the server, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Postgres(e) => e.code().map(|c| c.code()),
            _ => None,
        }
    }
}

impl From<PgError> for MigrationError {
    fn from(err: PgError) -> Self {
        match err.sqlstate() {
            Some(code) => MigrationError::database(format!("{} (SQLSTATE {})", err, code)),
            None => MigrationError::database(err.to_string()),
        }
    }
}
