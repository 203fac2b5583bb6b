//! Handle to an obtained lock.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::context::Context;
use crate::error::{LockError, LockResult};
use crate::traits::{Claim, LockBackend};

/// An obtained lock.
///
/// The handle pairs the backend with the key, token and metadata it was
/// obtained under. Every operation is fenced by the token: once the lease
/// expires and someone else claims the key, `refresh` and `release` fail
/// instead of touching the new owner's record.
///
/// Dropping the handle does **not** release the lock; the lease simply runs
/// out. Call [`release`](Self::release) to free it early.
///
/// # Example
///
/// ```rust,ignore
/// let lock = client.obtain(&ctx, "reports:daily", ttl, ObtainOptions::new()).await?;
/// generate_report().await?;
/// lock.refresh(&ctx, ttl).await?;
/// publish_report().await?;
/// lock.release(&ctx).await?;
/// ```
pub struct LockHandle<B> {
    backend: Arc<B>,
    claim: Claim,
}

impl<B: LockBackend> LockHandle<B> {
    pub(crate) fn new(backend: Arc<B>, claim: Claim) -> Self {
        Self { backend, claim }
    }

    /// The lock name.
    pub fn key(&self) -> &str {
        self.claim.key()
    }

    /// The ownership token the lock was obtained with.
    pub fn token(&self) -> &str {
        self.claim.token()
    }

    /// The metadata stored with the lock.
    pub fn metadata(&self) -> &str {
        self.claim.metadata()
    }

    /// Remaining time-to-live. Zero once the lock expired, was released or
    /// was claimed by someone else.
    #[instrument(skip(self, ctx), fields(lock.key = %self.claim.key(), backend = self.backend.name()))]
    pub async fn ttl(&self, ctx: &Context) -> LockResult<Duration> {
        let ttl = self.backend.query(ctx, &self.claim).await?;
        Ok(ttl.unwrap_or(Duration::ZERO))
    }

    /// Extends the lock to `ttl` from now.
    ///
    /// Returns [`LockError::NotObtained`] if the caller no longer owns it.
    #[instrument(skip(self, ctx), fields(lock.key = %self.claim.key(), backend = self.backend.name()))]
    pub async fn refresh(&self, ctx: &Context, ttl: Duration) -> LockResult<()> {
        if ttl < Duration::from_millis(1) {
            return Err(LockError::InvalidArgument(format!(
                "ttl must be at least 1ms, got {:?}",
                ttl
            )));
        }
        if self.backend.refresh(ctx, &self.claim, ttl).await? {
            Ok(())
        } else {
            Err(LockError::NotObtained)
        }
    }

    /// Releases the lock.
    ///
    /// Returns [`LockError::LockNotHeld`] if the caller no longer owns it.
    #[instrument(skip(self, ctx), fields(lock.key = %self.claim.key(), backend = self.backend.name()))]
    pub async fn release(&self, ctx: &Context) -> LockResult<()> {
        if self.backend.release(ctx, &self.claim).await? {
            Ok(())
        } else {
            Err(LockError::LockNotHeld)
        }
    }
}

impl<B> fmt::Debug for LockHandle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("key", &self.claim.key())
            .field("metadata", &self.claim.metadata())
            .finish_non_exhaustive()
    }
}
