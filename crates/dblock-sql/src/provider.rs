//! Builder for the relational backend.

use dblock_core::error::{LockError, LockResult};
use sqlx::AnyPool;
use tracing::info;

use crate::backend::SqlBackend;
use crate::connection::SqlConnection;
use crate::dialect::SqlDialect;
use crate::statements::DEFAULT_TABLE;

/// Builder for [`SqlBackend`] configuration.
pub struct SqlBackendBuilder {
    connection: Option<SqlConnection>,
    table: String,
    create_table: bool,
    max_connections: u32,
}

impl SqlBackendBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            connection: None,
            table: DEFAULT_TABLE.to_string(),
            create_table: false,
            max_connections: 5,
        }
    }

    /// Sets the database URL (`postgres://`, `pg://`, `mysql://` or `sqlite:`).
    pub fn connection_string(mut self, url: impl Into<String>) -> Self {
        self.connection = Some(SqlConnection::ConnectionString(url.into()));
        self
    }

    /// Uses an existing pool.
    pub fn pool(mut self, pool: AnyPool, dialect: SqlDialect) -> Self {
        self.connection = Some(SqlConnection::Pool(pool, dialect));
        self
    }

    /// Sets the lock table name. Defaults to `shedlock`.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Runs `CREATE TABLE IF NOT EXISTS` during [`build`](Self::build).
    pub fn create_table(mut self, create_table: bool) -> Self {
        self.create_table = create_table;
        self
    }

    /// Caps the pool created from a connection string.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Builds the backend.
    pub async fn build(self) -> LockResult<SqlBackend> {
        let connection = self
            .connection
            .ok_or_else(|| LockError::InvalidArgument("connection not specified".to_string()))?;

        // Reject a bad table name before opening any connection.
        crate::statements::Statements::new(&self.table, SqlDialect::Sqlite)?;

        let (pool, dialect) = connection.get_pool(self.max_connections).await?;
        let backend = SqlBackend::new(pool, dialect, &self.table)?;
        if self.create_table {
            backend.ensure_schema().await?;
        }

        info!(backend = "sql", dialect = %dialect, table = %self.table, "ready");
        Ok(backend)
    }
}

impl Default for SqlBackendBuilder {
    fn default() -> Self {
        Self::new()
    }
}
