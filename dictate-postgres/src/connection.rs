//! PostgreSQL connection wrapper.

use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error};

use dictate_migrate::{MigrateResult, SqlConnection, SqlDdlExecutor};
use dictate_schema::AdapterId;

use crate::error::{PgError, PgResult};

/// A PostgreSQL or CockroachDB connection used for discovery and DDL.
pub struct PgConnection {
    client: Client,
    adapter: AdapterId,
}

impl PgConnection {
    /// Connect to `url` without TLS and drive the connection on the Tokio runtime.
    pub async fn connect(url: &str, adapter: AdapterId) -> PgResult<Self> {
        if !adapter.is_postgres_family() {
            return Err(PgError::connection(format!(
                "adapter '{}' is not served by the postgres driver",
                adapter
            )));
        }

        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Database connection error");
            }
        });

        Ok(Self::from_client(client, adapter))
    }

    /// Wrap an already connected client.
    pub fn from_client(client: Client, adapter: AdapterId) -> Self {
        Self { client, adapter }
    }

    /// The adapter this connection speaks.
    pub fn adapter(&self) -> AdapterId {
        self.adapter
    }

    /// Whether this is a CockroachDB connection.
    pub fn is_cockroach(&self) -> bool {
        self.adapter == AdapterId::CockroachDb
    }

    /// A DDL executor running on this connection.
    pub fn executor(&self) -> SqlDdlExecutor<&Self> {
        SqlDdlExecutor::new(self, self.adapter)
    }

    /// Execute a query and return all rows.
    pub async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Vec<Row>> {
        debug!(sql = %sql, "Executing query");
        Ok(self.client.query(sql, params).await?)
    }

    /// Execute a batch of statements in a single round-trip.
    pub async fn batch_execute(&self, sql: &str) -> PgResult<()> {
        debug!(sql = %sql, "Executing batch");
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    /// Get the underlying tokio-postgres client.
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait::async_trait]
impl SqlConnection for PgConnection {
    async fn execute(&self, sql: &str) -> MigrateResult<()> {
        Ok(self.batch_execute(sql).await?)
    }
}
