//! Redis implementation of [`LockBackend`].

use std::time::Duration;

use dblock_core::context::Context;
use dblock_core::error::{LockError, LockResult};
use dblock_core::traits::{Claim, LockBackend};
use fred::prelude::RedisClient;
use tracing::{debug, instrument};

use crate::client::ScriptClient;
use crate::provider::RedisBackendBuilder;
use crate::scripts::{self, LockScript};

/// A lock backend on a single Redis server.
///
/// The key holds `token ++ metadata` with a millisecond expiry. Ownership
/// checks compare the whole stored value, except for `obtain`, which only
/// compares the token-length prefix so an owner can reclaim its live lock
/// with new metadata.
///
/// All callers sharing a key must use tokens of the same byte length,
/// otherwise a shorter token could match the prefix of a longer owner's
/// value. Tokens from [`random_token`](dblock_core::token::random_token)
/// always have the same length; set [`with_token_len`](Self::with_token_len)
/// to reject anything else.
#[derive(Debug, Clone)]
pub struct RedisBackend<C = RedisClient> {
    client: C,
    token_len: Option<usize>,
}

impl RedisBackend<RedisClient> {
    /// Returns a new builder for configuring the backend.
    pub fn builder() -> RedisBackendBuilder {
        RedisBackendBuilder::new()
    }

    /// Connects to the Redis server at `url`.
    pub async fn connect(url: impl Into<String>) -> LockResult<Self> {
        Self::builder().url(url).build().await
    }
}

impl<C: ScriptClient> RedisBackend<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            token_len: None,
        }
    }

    /// Rejects claims whose token is not exactly `len` bytes long.
    pub fn with_token_len(mut self, len: usize) -> Self {
        self.token_len = Some(len);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn value(&self, claim: &Claim) -> LockResult<String> {
        if let Some(expected) = self.token_len
            && claim.token().len() != expected
        {
            return Err(LockError::InvalidArgument(format!(
                "token must be {} bytes, got {}",
                expected,
                claim.token().len()
            )));
        }
        Ok(format!("{}{}", claim.token(), claim.metadata()))
    }

    async fn eval(
        &self,
        ctx: &Context,
        script: &LockScript,
        key: &str,
        args: Vec<String>,
    ) -> LockResult<crate::client::ScriptReply> {
        let reply = ctx.run(self.client.eval_script(script, key, args)).await?;
        debug!(script = script.name(), reply = ?reply, "script evaluated");
        Ok(reply)
    }
}

fn millis(ttl: Duration) -> String {
    ttl.as_millis().to_string()
}

impl<C: ScriptClient> LockBackend for RedisBackend<C> {
    fn name(&self) -> &'static str {
        "redis"
    }

    #[instrument(skip(self, ctx, claim), fields(lock.key = %claim.key(), backend = "redis", ttl = ?ttl))]
    async fn obtain(&self, ctx: &Context, claim: &Claim, ttl: Duration) -> LockResult<bool> {
        let value = self.value(claim)?;
        let args = vec![value, claim.token().len().to_string(), millis(ttl)];
        let reply = self.eval(ctx, &scripts::OBTAIN, claim.key(), args).await?;
        Ok(!reply.is_nil())
    }

    #[instrument(skip(self, ctx, claim), fields(lock.key = %claim.key(), backend = "redis", ttl = ?ttl))]
    async fn refresh(&self, ctx: &Context, claim: &Claim, ttl: Duration) -> LockResult<bool> {
        let args = vec![self.value(claim)?, millis(ttl)];
        let reply = self.eval(ctx, &scripts::REFRESH, claim.key(), args).await?;
        Ok(reply.into_int(&scripts::REFRESH)? == 1)
    }

    #[instrument(skip(self, ctx, claim), fields(lock.key = %claim.key(), backend = "redis"))]
    async fn release(&self, ctx: &Context, claim: &Claim) -> LockResult<bool> {
        let args = vec![self.value(claim)?];
        let reply = self.eval(ctx, &scripts::RELEASE, claim.key(), args).await?;
        if reply.is_nil() {
            return Ok(false);
        }
        Ok(reply.into_int(&scripts::RELEASE)? == 1)
    }

    #[instrument(skip(self, ctx, claim), fields(lock.key = %claim.key(), backend = "redis"))]
    async fn query(&self, ctx: &Context, claim: &Claim) -> LockResult<Option<Duration>> {
        let args = vec![self.value(claim)?];
        let reply = self.eval(ctx, &scripts::PTTL, claim.key(), args).await?;
        if reply.is_nil() {
            return Ok(None);
        }
        // -2: key vanished, -1: key without expiry
        Ok(match reply.into_int(&scripts::PTTL)? {
            n if n > 0 => Some(Duration::from_millis(n as u64)),
            scripts::NOT_OWNED | -2 => None,
            _ => Some(Duration::ZERO),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ScriptReply;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        script: &'static str,
        key: String,
        args: Vec<String>,
    }

    /// Records every evaluation and answers from a queue of replies.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Call>>,
        replies: Mutex<VecDeque<LockResult<ScriptReply>>>,
    }

    impl Recorder {
        fn replying(replies: impl IntoIterator<Item = ScriptReply>) -> Self {
            Self {
                calls: Mutex::default(),
                replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ScriptClient for Recorder {
        async fn eval_script(
            &self,
            script: &LockScript,
            key: &str,
            args: Vec<String>,
        ) -> LockResult<ScriptReply> {
            self.calls.lock().unwrap().push(Call {
                script: script.name(),
                key: key.to_string(),
                args,
            });
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ScriptReply::Nil))
        }
    }

    fn claim() -> Claim {
        Claim::new("jobs:nightly", "tok", "|meta|")
    }

    #[tokio::test]
    async fn test_obtain_is_one_script_call() {
        let backend = RedisBackend::new(Recorder::replying([ScriptReply::Text("OK".into())]));
        let ctx = Context::background();

        assert!(backend.obtain(&ctx, &claim(), Duration::from_millis(1500)).await.unwrap());
        assert_eq!(
            backend.client().calls(),
            vec![Call {
                script: "obtain",
                key: "jobs:nightly".into(),
                args: vec!["tok|meta|".into(), "3".into(), "1500".into()],
            }]
        );
    }

    #[tokio::test]
    async fn test_obtain_nil_means_busy() {
        let backend = RedisBackend::new(Recorder::replying([ScriptReply::Nil]));
        let obtained = backend
            .obtain(&Context::background(), &claim(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!obtained);
    }

    #[tokio::test]
    async fn test_refresh_and_release_compare_full_value() {
        let backend = RedisBackend::new(Recorder::replying([
            ScriptReply::Int(1),
            ScriptReply::Int(0),
        ]));
        let ctx = Context::background();

        assert!(backend.refresh(&ctx, &claim(), Duration::from_secs(2)).await.unwrap());
        assert!(!backend.release(&ctx, &claim()).await.unwrap());

        let calls = backend.client().calls();
        assert_eq!(calls[0].script, "refresh");
        assert_eq!(calls[0].args, vec!["tok|meta|".to_string(), "2000".to_string()]);
        assert_eq!(calls[1].script, "release");
        assert_eq!(calls[1].args, vec!["tok|meta|".to_string()]);
    }

    #[tokio::test]
    async fn test_query_reply_mapping() {
        let backend = RedisBackend::new(Recorder::replying([
            ScriptReply::Int(1500),
            ScriptReply::Int(scripts::NOT_OWNED),
            ScriptReply::Int(-2),
            ScriptReply::Int(-1),
        ]));
        let ctx = Context::background();

        assert_eq!(
            backend.query(&ctx, &claim()).await.unwrap(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(backend.query(&ctx, &claim()).await.unwrap(), None);
        assert_eq!(backend.query(&ctx, &claim()).await.unwrap(), None);
        assert_eq!(backend.query(&ctx, &claim()).await.unwrap(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_malformed_reply_is_backend_error() {
        let backend = RedisBackend::new(Recorder::replying([ScriptReply::Text("OK".into())]));
        let err = backend
            .refresh(&Context::background(), &claim(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::Backend(_)));
    }

    #[tokio::test]
    async fn test_token_len_is_enforced_before_io() {
        let backend = RedisBackend::new(Recorder::default()).with_token_len(22);
        let err = backend
            .obtain(&Context::background(), &claim(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::InvalidArgument(_)));
        assert!(backend.client().calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_call() {
        let backend = RedisBackend::new(Recorder::default());
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();

        let err = backend.release(&ctx, &claim()).await.unwrap_err();
        assert!(matches!(err, LockError::Cancelled));
        assert!(backend.client().calls().is_empty());
    }
}
