//! Backoff strategies for the acquisition loop.
//!
//! A strategy is a stateful generator: the acquisition loop asks it for the
//! next wait after every failed attempt and stops as soon as it answers
//! `None` (or a zero duration). Build a fresh strategy for every call to
//! `obtain`.

use std::time::Duration;

/// Produces the wait between failed acquisition attempts.
pub trait RetryStrategy: Send {
    /// Returns the next backoff, or `None` to stop retrying.
    fn next_backoff(&mut self) -> Option<Duration>;
}

impl<S: RetryStrategy + ?Sized> RetryStrategy for Box<S> {
    fn next_backoff(&mut self) -> Option<Duration> {
        (**self).next_backoff()
    }
}

/// Never retries. The default strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn next_backoff(&mut self) -> Option<Duration> {
        None
    }
}

/// Retries forever at a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    interval: Duration,
}

impl LinearBackoff {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl RetryStrategy for LinearBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        Some(self.interval)
    }
}

/// Caps another strategy at `max` retries.
#[derive(Debug, Clone)]
pub struct LimitRetry<S> {
    inner: S,
    max: usize,
    attempts: usize,
}

impl<S: RetryStrategy> LimitRetry<S> {
    pub fn new(inner: S, max: usize) -> Self {
        Self {
            inner,
            max,
            attempts: 0,
        }
    }
}

impl<S: RetryStrategy> RetryStrategy for LimitRetry<S> {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempts >= self.max {
            return None;
        }
        self.attempts += 1;
        self.inner.next_backoff()
    }
}

/// Doubling backoff clamped to `[min, max]`.
///
/// The n-th retry waits `2^(n+1)` milliseconds before clamping. A zero `max`
/// leaves the upper end unbounded (the exponent is capped regardless).
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    min: Duration,
    max: Duration,
    attempts: u32,
}

impl ExponentialBackoff {
    const MAX_EXPONENT: u32 = 25;

    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            attempts: 0,
        }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempts = self.attempts.saturating_add(1);
        let exponent = self.attempts.min(Self::MAX_EXPONENT);
        let backoff = Duration::from_millis(2u64 << exponent);

        if backoff < self.min {
            Some(self.min)
        } else if !self.max.is_zero() && backoff > self.max {
            Some(self.max)
        } else {
            Some(backoff)
        }
    }
}
