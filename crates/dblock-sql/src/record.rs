//! Row-level types: timestamps, holder identity and the lock view.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use dblock_core::error::{LockError, LockResult};

/// Formats `at` as a fixed-width RFC 3339 UTC string with microseconds.
///
/// Fixed width keeps text comparison in `WHERE lock_until <= ?` consistent
/// with time order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp. Malformed values are backend errors.
pub fn parse_timestamp(column: &str, value: &str) -> LockResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| LockError::backend(format!("parse {} {:?}: {}", column, value, e)))
}

/// Time left until `until`, zero once it has passed.
pub fn remaining(until: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (until - now).to_std().unwrap_or(Duration::ZERO)
}

/// Who holds a lock, for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HolderIdentity {
    pub host: String,
    pub pid: String,
}

impl HolderIdentity {
    /// The host name and process id of this process.
    pub fn current() -> Self {
        let host = match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => e.to_string(),
        };
        Self {
            host,
            pid: std::process::id().to_string(),
        }
    }
}

/// Diagnostic snapshot of a lock row, whoever owns it.
///
/// Never carries the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockView {
    pub key: String,
    pub lock_until: DateTime<Utc>,
    pub locked_at: DateTime<Utc>,
    pub locked_by: String,
    pub locked_pid: String,
    pub metadata: String,
}

impl LockView {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.lock_until <= now
    }

    /// Remaining lease measured from `now`.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        remaining(self.lock_until, now)
    }
}
