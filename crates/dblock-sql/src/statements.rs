//! Statement set for one lock table.
//!
//! Every caller-controlled value is a bind parameter. Only the table name is
//! spliced into the text, and it is validated as a plain identifier first.

use dblock_core::error::{LockError, LockResult};

use crate::dialect::SqlDialect;

/// Default lock table name.
pub const DEFAULT_TABLE: &str = "shedlock";

/// Longest lock key, in characters, that fits the `lock_name` column.
pub const MAX_KEY_LEN: usize = 255;

const COLUMNS: &str = "lock_name, lock_until, locked_at, locked_by, token_value, meta_value, locked_pid";

/// SQL text for every operation, rendered for one table and dialect.
#[derive(Debug, Clone)]
pub struct Statements {
    /// Binds: name, until, at, by, token, meta, pid.
    pub insert: String,
    /// Binds: until, at, by, token, meta, pid, name, now.
    pub claim: String,
    /// Binds: until, name, token. Also used to release with a past `until`.
    pub extend: String,
    /// Binds: name, token.
    pub query: String,
    /// Binds: name.
    pub view: String,
    pub create_table: String,
}

impl Statements {
    pub fn new(table: &str, dialect: SqlDialect) -> LockResult<Self> {
        validate_table_name(table)?;
        let sql = |text: String| dialect.bind_params(&text);

        Ok(Self {
            insert: sql(format!(
                "INSERT INTO {table} ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
            )),
            claim: sql(format!(
                "UPDATE {table} SET lock_until = ?, locked_at = ?, locked_by = ?, \
                 token_value = ?, meta_value = ?, locked_pid = ? \
                 WHERE lock_name = ? AND lock_until <= ?"
            )),
            extend: sql(format!(
                "UPDATE {table} SET lock_until = ? WHERE lock_name = ? AND token_value = ?"
            )),
            query: sql(format!(
                "SELECT lock_until FROM {table} WHERE lock_name = ? AND token_value = ?"
            )),
            view: sql(format!(
                "SELECT lock_until, locked_at, locked_by, meta_value, locked_pid \
                 FROM {table} WHERE lock_name = ?"
            )),
            // Timestamps are fixed-width UTC strings so they compare correctly
            // as text on every dialect. The key stays bounded so MySQL can
            // index it.
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {table} (\
                 lock_name VARCHAR({MAX_KEY_LEN}) NOT NULL PRIMARY KEY, \
                 lock_until VARCHAR(32) NOT NULL, \
                 locked_at VARCHAR(32) NOT NULL, \
                 locked_by VARCHAR(255) NOT NULL, \
                 token_value TEXT NOT NULL, \
                 meta_value TEXT NOT NULL, \
                 locked_pid VARCHAR(32) NOT NULL)"
            ),
        })
    }
}

/// Accepts `name` or `schema.name` made of ASCII letters, digits and `_`,
/// not starting with a digit.
fn validate_table_name(table: &str) -> LockResult<()> {
    let valid_part = |part: &str| {
        part.chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() <= 2 && parts.iter().all(|p| valid_part(p)) {
        Ok(())
    } else {
        Err(LockError::InvalidArgument(format!(
            "invalid lock table name {:?}",
            table
        )))
    }
}
