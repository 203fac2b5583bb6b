//! Deadline-bearing cancellation context.
//!
//! Every backend operation receives a [`Context`]. A context carries an
//! optional deadline and an optional cancellation signal; clones share the
//! same signal, so cancelling through a [`CancelHandle`] is observed by every
//! in-flight operation derived from it.
//!
//! # Example
//!
//! ```rust,ignore
//! let (ctx, cancel) = Context::background()
//!     .with_timeout(Duration::from_secs(5))
//!     .with_cancel();
//!
//! tokio::spawn(async move {
//!     shutdown_signal().await;
//!     cancel.cancel();
//! });
//!
//! let handle = client.obtain(&ctx, "jobs:nightly", ttl, ObtainOptions::new()).await?;
//! ```

use std::future::{self, Future};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{LockError, LockResult};

/// Deadline and cancellation signal shared by a tree of lock operations.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Fires cancellation for every clone of the [`Context`] it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancels the associated context.
    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }
}

impl Context {
    /// A context with no deadline that is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// Sets the deadline, keeping an earlier one if already present.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Sets the deadline to `timeout` from now, keeping an earlier one if already present.
    ///
    /// A timeout too large for the clock leaves the context unchanged.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Attaches a fresh cancellation signal.
    ///
    /// A context can only carry one signal; a signal attached earlier is
    /// replaced, so derive cancellable contexts from the root.
    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        self.cancel = Some(receiver);
        (self, CancelHandle { sender })
    }

    /// The deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline. `None` without a deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns the cancellation error if the context has already fired.
    pub fn err(&self) -> Option<LockError> {
        if let Some(cancel) = &self.cancel
            && *cancel.borrow()
        {
            return Some(LockError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(LockError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves with the cancellation error once the context fires.
    ///
    /// Never resolves for a background context.
    pub async fn done(&self) -> LockError {
        let cancelled = async {
            match &self.cancel {
                Some(receiver) => {
                    let mut receiver = receiver.clone();
                    // A dropped CancelHandle can no longer cancel.
                    if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
                        future::pending::<()>().await;
                    }
                }
                None => future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => LockError::Cancelled,
            _ = expired => LockError::DeadlineExceeded,
        }
    }

    /// Runs `operation`, abandoning it if the context fires first.
    ///
    /// Abandoning drops the future; a request already sent to the backend
    /// may still complete on the server.
    pub async fn run<T, F>(&self, operation: F) -> LockResult<T>
    where
        F: Future<Output = LockResult<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            result = operation => result,
        }
    }

    /// Sleeps for `duration` or until the context fires, whichever comes first.
    pub async fn sleep(&self, duration: Duration) -> LockResult<()> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}
