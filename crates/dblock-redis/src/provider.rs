//! Builder for the Redis backend.

use dblock_core::error::{LockError, LockResult};
use fred::prelude::*;
use tracing::info;

use crate::backend::RedisBackend;

/// Builder for [`RedisBackend`] configuration.
#[derive(Default)]
pub struct RedisBackendBuilder {
    url: Option<String>,
    client: Option<RedisClient>,
    token_len: Option<usize>,
}

impl RedisBackendBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Redis server URL, e.g. `redis://localhost:6379/0`.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Uses an existing Redis client. Takes precedence over [`url`](Self::url).
    ///
    /// The client must already be connected.
    pub fn client(mut self, client: RedisClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Rejects tokens that are not exactly `len` bytes long.
    pub fn token_len(mut self, len: usize) -> Self {
        self.token_len = Some(len);
        self
    }

    /// Builds the backend, connecting first when only a URL was given.
    pub async fn build(self) -> LockResult<RedisBackend> {
        let client = match (self.client, self.url) {
            (Some(client), _) => client,
            (None, Some(url)) => connect(&url).await?,
            (None, None) => {
                return Err(LockError::InvalidArgument(
                    "no Redis client or URL provided".to_string(),
                ));
            }
        };

        let backend = RedisBackend::new(client);
        Ok(match self.token_len {
            Some(len) => backend.with_token_len(len),
            None => backend,
        })
    }
}

async fn connect(url: &str) -> LockResult<RedisClient> {
    let config = RedisConfig::from_url(url).map_err(|e| {
        LockError::InvalidArgument(format!("invalid Redis URL: {}", e))
    })?;

    let client = RedisClient::new(config, None, None, None);
    client.connect();
    client
        .wait_for_connect()
        .await
        .map_err(|e| LockError::connection(format!("failed to connect to Redis: {}", e)))?;

    info!(backend = "redis", "connected");
    Ok(client)
}
