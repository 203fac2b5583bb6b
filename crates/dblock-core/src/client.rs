//! The acquisition loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{Span, debug, field, instrument};

use crate::context::Context;
use crate::error::{LockError, LockResult};
use crate::handle::LockHandle;
use crate::options::ObtainOptions;
use crate::token::random_token;
use crate::traits::{Claim, LockBackend};

/// Obtains locks from one backend.
///
/// The backend is chosen once, at construction; the client is cheap to
/// clone and every clone shares it.
///
/// # Example
///
/// ```rust,ignore
/// let client = LockClient::new(RedisBackend::connect("redis://localhost:6379").await?);
///
/// let options = ObtainOptions::new()
///     .with_metadata("worker-3")
///     .with_retry_strategy(LimitRetry::new(LinearBackoff::new(Duration::from_millis(100)), 20));
///
/// match client.obtain(&Context::background(), "jobs:nightly", Duration::from_secs(30), options).await {
///     Ok(lock) => run_job(&lock).await?,
///     Err(LockError::NotObtained) => return Ok(()), // another worker has it
///     Err(e) => return Err(e.into()),
/// }
/// ```
pub struct LockClient<B> {
    backend: Arc<B>,
}

impl<B> Clone for LockClient<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: LockBackend> LockClient<B> {
    pub fn new(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// The backend this client obtains locks from.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Tries to obtain the lock `key` for `ttl`.
    ///
    /// Acquisition never outlives `ttl`: the loop runs under the earlier of
    /// the caller's deadline and `now + ttl`.
    ///
    /// # Returns
    ///
    /// * `Ok(handle)` - the lock is held under `handle.token()`
    /// * `Err(LockError::NotObtained)` - held by someone else and the retry
    ///   strategy gave up
    /// * `Err(LockError::Cancelled | LockError::DeadlineExceeded)` - the
    ///   context fired while waiting
    /// * any other error - backend fault, surfaced on the first occurrence
    #[instrument(
        skip(self, ctx, options),
        fields(lock.key = %key, ttl = ?ttl, backend = self.backend.name(), attempts = field::Empty)
    )]
    pub async fn obtain(
        &self,
        ctx: &Context,
        key: &str,
        ttl: Duration,
        options: ObtainOptions,
    ) -> LockResult<LockHandle<B>> {
        if ttl < Duration::from_millis(1) {
            return Err(LockError::InvalidArgument(format!(
                "ttl must be at least 1ms, got {:?}",
                ttl
            )));
        }

        let (token, metadata, mut retry) = options.into_parts();
        let token = match token {
            Some(token) => token,
            None => random_token()?,
        };
        let claim = Claim::new(key, token, metadata);

        let start = Instant::now();
        let deadline = start.checked_add(ttl).ok_or_else(|| {
            LockError::InvalidArgument(format!("ttl {:?} is out of range", ttl))
        })?;
        let ctx = ctx.clone().with_deadline(deadline);

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if self.backend.obtain(&ctx, &claim, ttl).await? {
                Span::current().record("attempts", attempts);
                debug!(attempts, elapsed = ?start.elapsed(), "lock obtained");
                return Ok(LockHandle::new(Arc::clone(&self.backend), claim));
            }

            let backoff = match retry.next_backoff() {
                Some(backoff) if !backoff.is_zero() => backoff,
                _ => {
                    debug!(attempts, "lock not obtained, giving up");
                    return Err(LockError::NotObtained);
                }
            };
            debug!(attempts, backoff = ?backoff, "lock busy, backing off");
            ctx.sleep(backoff).await?;
        }
    }
}
