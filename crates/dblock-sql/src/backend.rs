//! Relational implementation of [`LockBackend`].

use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use dblock_core::context::Context;
use dblock_core::error::{LockError, LockResult};
use dblock_core::traits::{Claim, LockBackend};
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Row};
use tracing::{debug, instrument};

use crate::dialect::SqlDialect;
use crate::provider::SqlBackendBuilder;
use crate::record::{self, HolderIdentity, LockView};
use crate::statements::{MAX_KEY_LEN, Statements};

/// A lock backend on a relational table.
///
/// Each lock is one row keyed by `lock_name`. A new key is claimed by
/// `INSERT`; the primary key admits a single winner among concurrent
/// inserts, and every loser falls through to an `UPDATE` that can only
/// take a row whose lease has already expired. `release` moves
/// `lock_until` into the past and keeps the row.
///
/// Expiry is judged on the wall clock of the calling host, so hosts sharing
/// a table need reasonably synchronized clocks.
#[derive(Debug, Clone)]
pub struct SqlBackend {
    pool: AnyPool,
    dialect: SqlDialect,
    table: String,
    statements: Statements,
    identity: HolderIdentity,
}

fn bind_all(sql: &str, args: Vec<String>) -> Query<'_, Any, AnyArguments<'_>> {
    args.into_iter()
        .fold(sqlx::query::<Any>(sql), |query, arg| query.bind(arg))
}

fn chrono_ttl(ttl: Duration) -> LockResult<chrono::Duration> {
    chrono::Duration::from_std(ttl)
        .map_err(|_| LockError::InvalidArgument(format!("ttl {:?} is out of range", ttl)))
}

impl SqlBackend {
    /// Returns a new builder for configuring the backend.
    pub fn builder() -> SqlBackendBuilder {
        SqlBackendBuilder::new()
    }

    /// Connects using `url` with the default table.
    pub async fn connect(url: impl Into<String>) -> LockResult<Self> {
        Self::builder().connection_string(url).build().await
    }

    /// Wraps an existing pool. Fails if `table` is not a plain identifier.
    pub fn new(pool: AnyPool, dialect: SqlDialect, table: &str) -> LockResult<Self> {
        Ok(Self {
            statements: Statements::new(table, dialect)?,
            pool,
            dialect,
            table: table.to_string(),
            identity: HolderIdentity::current(),
        })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// The host/pid written to `locked_by` / `locked_pid`.
    pub fn identity(&self) -> &HolderIdentity {
        &self.identity
    }

    /// Creates the lock table if it does not exist.
    #[instrument(skip(self), fields(table = %self.table, backend = "sql"))]
    pub async fn ensure_schema(&self) -> LockResult<()> {
        self.execute(&Context::background(), "create_table", &self.statements.create_table, vec![])
            .await
            .map(|_| ())
    }

    /// Reads the row for `key` regardless of owner.
    #[instrument(skip(self, ctx), fields(lock.key = %key, backend = "sql"))]
    pub async fn view(&self, ctx: &Context, key: &str) -> LockResult<Option<LockView>> {
        let sql = &self.statements.view;
        debug!(statement = "view", sql = %sql, "querying");
        let row = ctx
            .run(async {
                bind_all(sql, vec![key.to_string()])
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(LockError::backend)
            })
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let text = |column: &str| -> LockResult<String> {
            row.try_get::<String, _>(column).map_err(LockError::backend)
        };
        Ok(Some(LockView {
            key: key.to_string(),
            lock_until: record::parse_timestamp("lock_until", &text("lock_until")?)?,
            locked_at: record::parse_timestamp("locked_at", &text("locked_at")?)?,
            locked_by: text("locked_by")?,
            locked_pid: text("locked_pid")?,
            metadata: text("meta_value")?,
        }))
    }

    /// Runs a statement and returns the number of affected rows.
    async fn execute(
        &self,
        ctx: &Context,
        label: &'static str,
        sql: &str,
        args: Vec<String>,
    ) -> LockResult<u64> {
        debug!(statement = label, sql = %sql, "executing");
        let affected = ctx
            .run(async {
                bind_all(sql, args)
                    .execute(&self.pool)
                    .await
                    .map(|done| done.rows_affected())
                    .map_err(LockError::backend)
            })
            .await?;
        debug!(statement = label, affected, "executed");
        Ok(affected)
    }

    /// `INSERT` a fresh row. `Ok(false)` if the key already has one.
    async fn insert(&self, ctx: &Context, args: Vec<String>) -> LockResult<bool> {
        let sql = &self.statements.insert;
        debug!(statement = "insert", sql = %sql, "executing");
        ctx.run(async {
            match bind_all(sql, args).execute(&self.pool).await {
                Ok(done) => {
                    debug!(statement = "insert", affected = done.rows_affected(), "executed");
                    Ok(done.rows_affected() == 1)
                }
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    debug!(statement = "insert", "row exists");
                    Ok(false)
                }
                Err(e) => Err(LockError::backend(e)),
            }
        })
        .await
    }

    /// `now + ttl` as a stored timestamp. Years past 9999 would break the
    /// fixed-width ordering of `lock_until`, so they are rejected too.
    fn stamp(now: DateTime<Utc>, ttl: Duration) -> LockResult<String> {
        let until = now
            .checked_add_signed(chrono_ttl(ttl)?)
            .filter(|until| until.year() <= 9999)
            .ok_or_else(|| LockError::InvalidArgument(format!("ttl {:?} is out of range", ttl)))?;
        Ok(record::format_timestamp(until))
    }
}

impl LockBackend for SqlBackend {
    fn name(&self) -> &'static str {
        "sql"
    }

    #[instrument(skip(self, ctx, claim), fields(lock.key = %claim.key(), backend = "sql", ttl = ?ttl))]
    async fn obtain(&self, ctx: &Context, claim: &Claim, ttl: Duration) -> LockResult<bool> {
        if claim.key().chars().count() > MAX_KEY_LEN {
            return Err(LockError::InvalidArgument(format!(
                "key is longer than {} characters",
                MAX_KEY_LEN
            )));
        }
        let now = Utc::now();
        let until = Self::stamp(now, ttl)?;
        let at = record::format_timestamp(now);
        let HolderIdentity { host, pid } = self.identity.clone();

        let inserted = self
            .insert(
                ctx,
                vec![
                    claim.key().to_string(),
                    until.clone(),
                    at.clone(),
                    host.clone(),
                    claim.token().to_string(),
                    claim.metadata().to_string(),
                    pid.clone(),
                ],
            )
            .await?;
        if inserted {
            return Ok(true);
        }

        let claimed = self
            .execute(
                ctx,
                "claim",
                &self.statements.claim,
                vec![
                    until,
                    at.clone(),
                    host,
                    claim.token().to_string(),
                    claim.metadata().to_string(),
                    pid,
                    claim.key().to_string(),
                    at,
                ],
            )
            .await?;
        Ok(claimed == 1)
    }

    #[instrument(skip(self, ctx, claim), fields(lock.key = %claim.key(), backend = "sql", ttl = ?ttl))]
    async fn refresh(&self, ctx: &Context, claim: &Claim, ttl: Duration) -> LockResult<bool> {
        let until = Self::stamp(Utc::now(), ttl)?;
        let args = vec![until, claim.key().to_string(), claim.token().to_string()];
        let affected = self.execute(ctx, "extend", &self.statements.extend, args).await?;
        Ok(affected == 1)
    }

    #[instrument(skip(self, ctx, claim), fields(lock.key = %claim.key(), backend = "sql"))]
    async fn release(&self, ctx: &Context, claim: &Claim) -> LockResult<bool> {
        let past = record::format_timestamp(Utc::now() - chrono::Duration::seconds(1));
        let args = vec![past, claim.key().to_string(), claim.token().to_string()];
        let affected = self.execute(ctx, "release", &self.statements.extend, args).await?;
        Ok(affected == 1)
    }

    #[instrument(skip(self, ctx, claim), fields(lock.key = %claim.key(), backend = "sql"))]
    async fn query(&self, ctx: &Context, claim: &Claim) -> LockResult<Option<Duration>> {
        let sql = &self.statements.query;
        debug!(statement = "query", sql = %sql, "querying");
        let args = vec![claim.key().to_string(), claim.token().to_string()];
        let row = ctx
            .run(async {
                bind_all(sql, args)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(LockError::backend)
            })
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let until: String = row.try_get("lock_until").map_err(LockError::backend)?;
        let until = record::parse_timestamp("lock_until", &until)?;
        Ok(Some(record::remaining(until, Utc::now())))
    }
}
