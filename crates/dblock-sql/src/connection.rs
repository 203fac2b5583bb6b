//! Connection pool management for the relational backend.

use std::fmt;

use dblock_core::error::{LockError, LockResult};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

use crate::dialect::SqlDialect;

/// Represents different ways to reach the lock database.
#[derive(Clone)]
pub enum SqlConnection {
    /// Connect using a connection string; the dialect follows the URL scheme.
    ConnectionString(String),
    /// Use an existing pool.
    Pool(AnyPool, SqlDialect),
}

impl SqlConnection {
    /// Get or create a connection pool.
    ///
    /// For the ConnectionString variant, creates a new pool with at most
    /// `max_connections` connections. An in-memory SQLite database exists
    /// per connection, so it is pinned to a single one that never idles out.
    pub async fn get_pool(&self, max_connections: u32) -> LockResult<(AnyPool, SqlDialect)> {
        match self {
            Self::Pool(pool, dialect) => Ok((pool.clone(), *dialect)),
            Self::ConnectionString(url) => {
                let dialect = SqlDialect::from_url(url)?;
                let url = dialect.normalize_url(url);
                sqlx::any::install_default_drivers();

                let mut options = AnyPoolOptions::new().max_connections(max_connections.max(1));
                if dialect == SqlDialect::Sqlite && url.contains(":memory:") {
                    options = options
                        .max_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None);
                }

                let pool = options.connect(&url).await.map_err(|e| {
                    LockError::connection(format!("failed to connect to {}: {}", dialect, e))
                })?;
                Ok((pool, dialect))
            }
        }
    }
}

impl fmt::Debug for SqlConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionString(_) => write!(f, "SqlConnection::ConnectionString([REDACTED])"),
            Self::Pool(_, dialect) => write!(f, "SqlConnection::Pool([POOL], {})", dialect),
        }
    }
}
