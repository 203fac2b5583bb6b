//! SQL dialect differences that the `Any` driver leaves to the caller.

use std::fmt;

use dblock_core::error::{LockError, LockResult};

/// The database family behind an `AnyPool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    Postgres,
    MySql,
    Sqlite,
}

impl SqlDialect {
    /// Picks the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> LockResult<Self> {
        let scheme = url
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default();
        match scheme.as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(LockError::InvalidArgument(format!(
                "unsupported database URL scheme {:?}",
                scheme
            ))),
        }
    }

    /// Rewrites scheme aliases the drivers do not register (`pg:`) to the
    /// canonical scheme. Other URLs are returned unchanged.
    pub fn normalize_url(self, url: &str) -> String {
        match (self, url.split_once(':')) {
            (Self::Postgres, Some((scheme, rest))) if scheme.eq_ignore_ascii_case("pg") => {
                format!("postgres:{}", rest)
            }
            _ => url.to_string(),
        }
    }

    /// Rewrites `?` placeholders into the dialect's bind syntax.
    ///
    /// Statement templates never contain a literal `?`.
    pub fn bind_params(self, sql: &str) -> String {
        match self {
            Self::MySql | Self::Sqlite => sql.to_string(),
            Self::Postgres => {
                let mut out = String::with_capacity(sql.len() + 8);
                let mut n = 0;
                for c in sql.chars() {
                    if c == '?' {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    } else {
                        out.push(c);
                    }
                }
                out
            }
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Postgres => "postgres",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        })
    }
}
