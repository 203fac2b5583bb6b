//! The "evaluate atomic script" capability the Redis backend needs.

use std::future::Future;

use dblock_core::error::{LockError, LockResult};
use fred::prelude::*;
use fred::types::CustomCommand;

use crate::scripts::LockScript;

/// Scalar reply of a script evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptReply {
    /// Lua `nil` / `false`.
    Nil,
    /// Integer reply.
    Int(i64),
    /// Status or bulk string reply.
    Text(String),
}

impl ScriptReply {
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// The integer reply, or a backend error naming `script`.
    pub fn into_int(self, script: &LockScript) -> LockResult<i64> {
        match self {
            Self::Int(n) => Ok(n),
            other => Err(LockError::backend(format!(
                "unexpected reply to {} script: {:?}",
                script.name(),
                other
            ))),
        }
    }
}

/// A client that can run one Lua script against one key atomically.
///
/// Implemented for [`RedisClient`]. The connection must be safe to share
/// between concurrent calls.
pub trait ScriptClient: Send + Sync {
    fn eval_script(
        &self,
        script: &LockScript,
        key: &str,
        args: Vec<String>,
    ) -> impl Future<Output = LockResult<ScriptReply>> + Send;
}

impl ScriptClient for RedisClient {
    async fn eval_script(
        &self,
        script: &LockScript,
        key: &str,
        args: Vec<String>,
    ) -> LockResult<ScriptReply> {
        let mut values: Vec<RedisValue> = Vec::with_capacity(args.len() + 3);
        values.push(script.source().into());
        values.push(1_i64.into()); // numkeys
        values.push(key.into());
        values.extend(args.into_iter().map(RedisValue::from));

        let cmd = CustomCommand::new_static("EVAL", None, false);
        let reply: RedisValue = self.custom(cmd, values).await.map_err(|e| {
            LockError::backend(format!("Redis EVAL ({}) failed: {}", script.name(), e))
        })?;

        match reply {
            RedisValue::Null | RedisValue::Boolean(false) => Ok(ScriptReply::Nil),
            RedisValue::Integer(n) => Ok(ScriptReply::Int(n)),
            RedisValue::String(s) => Ok(ScriptReply::Text(s.to_string())),
            RedisValue::Bytes(b) => Ok(ScriptReply::Text(String::from_utf8_lossy(&b).into_owned())),
            other => Err(LockError::backend(format!(
                "unexpected reply to {} script: {:?}",
                script.name(),
                other
            ))),
        }
    }
}
