//! Core traits for lock backends.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::error::LockResult;

// ============================================================================
// Claim
// ============================================================================

/// The ownership triple a backend operates on.
///
/// `token` is the credential that fences every mutation; `metadata` travels
/// with the record but plays no part in mutual exclusion on backends that
/// store it in its own column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    key: String,
    token: String,
    metadata: String,
}

impl Claim {
    pub fn new(key: impl Into<String>, token: impl Into<String>, metadata: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            token: token.into(),
            metadata: metadata.into(),
        }
    }

    /// The lock name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The ownership token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The caller payload stored with the lock.
    pub fn metadata(&self) -> &str {
        &self.metadata
    }
}

// ============================================================================
// Backend Trait
// ============================================================================

/// A coordination store that can realize a TTL lock.
///
/// Each operation must execute as a single logical unit on the backend: the
/// compare step and the act step may never be split across two round trips,
/// otherwise two concurrent callers could interleave and both believe they
/// hold the lock. The backend's own atomic primitive is the only source of
/// mutual exclusion; nothing above this trait adds locking.
///
/// `Ok(false)` / `Ok(None)` report "not yours" outcomes. `Err` is reserved
/// for transport, protocol and storage faults, and for the context firing.
///
/// # Example
///
/// ```rust,ignore
/// async fn holds<B: LockBackend>(backend: &B, claim: &Claim) -> LockResult<bool> {
///     let ttl = backend.query(&Context::background(), claim).await?;
///     Ok(ttl.is_some_and(|ttl| !ttl.is_zero()))
/// }
/// ```
pub trait LockBackend: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Creates the record for `claim.key()`, or reclaims it when the previous
    /// lease has expired (or, where the backend supports it, when it is the
    /// caller's own).
    ///
    /// Returns `true` iff the caller now holds the lock under `claim.token()`.
    fn obtain(
        &self,
        ctx: &Context,
        claim: &Claim,
        ttl: Duration,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Extends the lease to `ttl` from now if the stored owner matches.
    fn refresh(
        &self,
        ctx: &Context,
        claim: &Claim,
        ttl: Duration,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Invalidates the record if the stored owner matches.
    fn release(&self, ctx: &Context, claim: &Claim) -> impl Future<Output = LockResult<bool>> + Send;

    /// Remaining time-to-live of the caller's record.
    ///
    /// `None` if the record is absent or owned by someone else; a non-owner
    /// never learns another holder's TTL. `Some(Duration::ZERO)` means the
    /// record is the caller's but already expired.
    fn query(
        &self,
        ctx: &Context,
        claim: &Claim,
    ) -> impl Future<Output = LockResult<Option<Duration>>> + Send;
}

impl<B: LockBackend> LockBackend for Arc<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn obtain(
        &self,
        ctx: &Context,
        claim: &Claim,
        ttl: Duration,
    ) -> impl Future<Output = LockResult<bool>> + Send {
        (**self).obtain(ctx, claim, ttl)
    }

    fn refresh(
        &self,
        ctx: &Context,
        claim: &Claim,
        ttl: Duration,
    ) -> impl Future<Output = LockResult<bool>> + Send {
        (**self).refresh(ctx, claim, ttl)
    }

    fn release(&self, ctx: &Context, claim: &Claim) -> impl Future<Output = LockResult<bool>> + Send {
        (**self).release(ctx, claim)
    }

    fn query(
        &self,
        ctx: &Context,
        claim: &Claim,
    ) -> impl Future<Output = LockResult<Option<Duration>>> + Send {
        (**self).query(ctx, claim)
    }
}
