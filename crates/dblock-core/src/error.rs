//! Error types for lock operations.

use thiserror::Error;

/// Errors that can occur during lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The lock is held by another owner, retries were exhausted, or a
    /// refresh found no record matching the caller's token.
    #[error("lock not obtained")]
    NotObtained,

    /// Release found no record matching the caller's token.
    #[error("lock not held")]
    LockNotHeld,

    /// The caller cancelled the operation.
    #[error("lock operation was cancelled")]
    Cancelled,

    /// The context deadline passed before the operation finished.
    #[error("lock operation deadline exceeded")]
    DeadlineExceeded,

    /// Backend connection failed.
    #[error("connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Backend transport, protocol or storage fault.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Input rejected before any backend round trip.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl LockError {
    /// Wraps any error as a [`LockError::Backend`].
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }

    /// Wraps any error as a [`LockError::Connection`].
    pub fn connection(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Connection(err.into())
    }

    /// Returns `true` for [`LockError::Cancelled`] and [`LockError::DeadlineExceeded`].
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Returns `true` when the error is the expected outcome of contention
    /// rather than a fault.
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::NotObtained | Self::LockNotHeld)
    }
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
