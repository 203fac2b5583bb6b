//! Options accepted by [`LockClient::obtain`](crate::client::LockClient::obtain).

use std::fmt;

use crate::retry::{NoRetry, RetryStrategy};

/// Per-call acquisition options.
///
/// Defaults: a random token, empty metadata, a single attempt.
#[derive(Default)]
pub struct ObtainOptions {
    token: Option<String>,
    metadata: String,
    retry_strategy: Option<Box<dyn RetryStrategy>>,
}

impl ObtainOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `token` instead of a random one. An empty token is ignored.
    ///
    /// A fixed token lets a restarted process reclaim its own live lock on
    /// backends that support self-reclaim.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.token = (!token.is_empty()).then_some(token);
        self
    }

    /// Stores `metadata` with the lock.
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Retries failed attempts according to `strategy`.
    pub fn with_retry_strategy(mut self, strategy: impl RetryStrategy + 'static) -> Self {
        self.retry_strategy = Some(Box::new(strategy));
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn metadata(&self) -> &str {
        &self.metadata
    }

    pub(crate) fn into_parts(self) -> (Option<String>, String, Box<dyn RetryStrategy>) {
        let retry = self
            .retry_strategy
            .unwrap_or_else(|| Box::new(NoRetry));
        (self.token, self.metadata, retry)
    }
}

impl fmt::Debug for ObtainOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObtainOptions")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("metadata", &self.metadata)
            .field("retry_strategy", &self.retry_strategy.is_some())
            .finish()
    }
}
