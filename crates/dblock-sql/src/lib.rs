//! Relational backend for dblock.
//!
//! Locks are rows in a single table (`shedlock` by default) reached through
//! a `sqlx` `AnyPool`, so PostgreSQL, MySQL and SQLite share one
//! implementation:
//!
//! ```text
//! lock_name    VARCHAR(255) PRIMARY KEY
//! lock_until   VARCHAR   -- fixed-width RFC 3339 UTC
//! locked_at    VARCHAR
//! locked_by    VARCHAR   -- host name
//! token_value  TEXT
//! meta_value   TEXT
//! locked_pid   VARCHAR
//! ```
//!
//! Keys longer than 255 characters are rejected with `InvalidArgument`.
//!
//! ```rust,ignore
//! use dblock_sql::SqlBackend;
//!
//! let backend = SqlBackend::builder()
//!     .connection_string("postgres://localhost/app")
//!     .create_table(true)
//!     .build()
//!     .await?;
//! ```

pub mod backend;
pub mod connection;
pub mod dialect;
pub mod provider;
pub mod record;
pub mod statements;

pub use backend::SqlBackend;
pub use connection::SqlConnection;
pub use dialect::SqlDialect;
pub use provider::SqlBackendBuilder;
pub use record::{HolderIdentity, LockView};
