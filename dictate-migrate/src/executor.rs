//! DDL execution contracts and the SQL-backed executor.

use tracing::debug;

use dictate_schema::{AdapterId, Column, Index};

use crate::error::MigrateResult;
use crate::sql::DdlRenderer;

/// Applies DDL operations to a database.
#[async_trait::async_trait]
pub trait DdlExecutor: Send + Sync {
    /// Whether DDL can run inside a transaction.
    fn supports_transactional_ddl(&self) -> bool;

    /// Create a table holding a single column.
    async fn create_table(&self, table: &str, column: &Column) -> MigrateResult<()>;

    /// Add a column.
    async fn add_column(&self, table: &str, column: &Column) -> MigrateResult<()>;

    /// Change a column from its discovered to its declared definition.
    async fn alter_column(&self, table: &str, from: &Column, to: &Column) -> MigrateResult<()>;

    /// Drop a column.
    async fn drop_column(&self, table: &str, column: &str) -> MigrateResult<()>;

    /// Create an index.
    async fn add_index(&self, table: &str, index: &Index) -> MigrateResult<()>;

    /// Drop an index.
    async fn drop_index(&self, table: &str, index: &Index) -> MigrateResult<()>;

    /// Drop a table.
    async fn drop_table(&self, table: &str) -> MigrateResult<()>;

    /// Begin a transaction.
    async fn begin(&self) -> MigrateResult<()>;

    /// Commit the current transaction.
    async fn commit(&self) -> MigrateResult<()>;

    /// Roll back the current transaction.
    async fn rollback(&self) -> MigrateResult<()>;
}

/// A connection able to run raw SQL statements.
#[async_trait::async_trait]
pub trait SqlConnection: Send + Sync {
    /// Execute a statement, discarding any rows.
    async fn execute(&self, sql: &str) -> MigrateResult<()>;

    /// Begin a transaction.
    async fn begin(&self) -> MigrateResult<()> {
        self.execute("BEGIN").await
    }

    /// Commit the current transaction.
    async fn commit(&self) -> MigrateResult<()> {
        self.execute("COMMIT").await
    }

    /// Roll back the current transaction.
    async fn rollback(&self) -> MigrateResult<()> {
        self.execute("ROLLBACK").await
    }
}

#[async_trait::async_trait]
impl<T: SqlConnection + ?Sized> SqlConnection for &T {
    async fn execute(&self, sql: &str) -> MigrateResult<()> {
        (**self).execute(sql).await
    }

    async fn begin(&self) -> MigrateResult<()> {
        (**self).begin().await
    }

    async fn commit(&self) -> MigrateResult<()> {
        (**self).commit().await
    }

    async fn rollback(&self) -> MigrateResult<()> {
        (**self).rollback().await
    }
}

/// [`DdlExecutor`] that renders statements for an adapter and runs them on a connection.
#[derive(Debug)]
pub struct SqlDdlExecutor<C> {
    connection: C,
    renderer: DdlRenderer,
}

impl<C: SqlConnection> SqlDdlExecutor<C> {
    /// Create an executor.
    pub fn new(connection: C, adapter: AdapterId) -> Self {
        Self {
            connection,
            renderer: DdlRenderer::new(adapter),
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// The statement renderer.
    pub fn renderer(&self) -> &DdlRenderer {
        &self.renderer
    }

    async fn run(&self, sql: &str) -> MigrateResult<()> {
        debug!(sql = %sql, "Executing statement");
        self.connection.execute(sql).await
    }
}

#[async_trait::async_trait]
impl<C: SqlConnection> DdlExecutor for SqlDdlExecutor<C> {
    fn supports_transactional_ddl(&self) -> bool {
        self.renderer.adapter().supports_transactional_ddl()
    }

    async fn create_table(&self, table: &str, column: &Column) -> MigrateResult<()> {
        self.run(&self.renderer.create_table(table, column)).await
    }

    async fn add_column(&self, table: &str, column: &Column) -> MigrateResult<()> {
        self.run(&self.renderer.add_column(table, column)).await
    }

    async fn alter_column(&self, table: &str, from: &Column, to: &Column) -> MigrateResult<()> {
        for sql in self.renderer.alter_column(table, from, to)? {
            self.run(&sql).await?;
        }
        Ok(())
    }

    async fn drop_column(&self, table: &str, column: &str) -> MigrateResult<()> {
        self.run(&self.renderer.drop_column(table, column)).await
    }

    async fn add_index(&self, table: &str, index: &Index) -> MigrateResult<()> {
        self.run(&self.renderer.create_index(table, index)).await
    }

    async fn drop_index(&self, table: &str, index: &Index) -> MigrateResult<()> {
        self.run(&self.renderer.drop_index(table, index)).await
    }

    async fn drop_table(&self, table: &str) -> MigrateResult<()> {
        self.run(&self.renderer.drop_table(table)).await
    }

    async fn begin(&self) -> MigrateResult<()> {
        debug!("Beginning DDL transaction");
        self.connection.begin().await
    }

    async fn commit(&self) -> MigrateResult<()> {
        debug!("Committing DDL transaction");
        self.connection.commit().await
    }

    async fn rollback(&self) -> MigrateResult<()> {
        debug!("Rolling back DDL transaction");
        self.connection.rollback().await
    }
}
