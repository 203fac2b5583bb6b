//! In-memory stand-in for Redis script evaluation.
//!
//! Interprets the four lock scripts by name. Each evaluation runs under one
//! mutex, matching the atomicity Redis gives a Lua script. Expiry follows
//! the tokio clock so tests can pause time.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dblock::{LockError, LockResult, LockScript, ScriptClient, ScriptReply};
use tokio::time::Instant;

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    evaluations: AtomicUsize,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of script evaluations so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }

    /// The raw stored value of a live key.
    pub fn raw(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone())
    }

    /// Stores a value directly, as another client would.
    pub fn set(&self, key: &str, value: &str, ttl: Duration) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
    }
}

fn arg<'a>(args: &'a [String], i: usize) -> LockResult<&'a str> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| LockError::backend(format!("missing ARGV[{}]", i + 1)))
}

fn millis(args: &[String], i: usize) -> LockResult<Duration> {
    let ms: u64 = arg(args, i)?
        .parse()
        .map_err(|_| LockError::backend("ERR value is not an integer or out of range"))?;
    if ms == 0 {
        return Err(LockError::backend("ERR invalid expire time"));
    }
    Ok(Duration::from_millis(ms))
}

/// First `n` bytes of `s`, clamped to its length.
fn prefix(s: &str, n: usize) -> &[u8] {
    &s.as_bytes()[..n.min(s.len())]
}

impl ScriptClient for MemoryKv {
    async fn eval_script(
        &self,
        script: &LockScript,
        key: &str,
        args: Vec<String>,
    ) -> LockResult<ScriptReply> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        if entries.get(key).is_some_and(|(_, expires_at)| *expires_at <= now) {
            entries.remove(key);
        }
        let value = arg(&args, 0)?;
        let stored = entries.get(key).map(|(v, _)| v.clone());

        match script.name() {
            "obtain" => {
                let offset: usize = arg(&args, 1)?
                    .parse()
                    .map_err(|_| LockError::backend("bad offset"))?;
                let ttl = millis(&args, 2)?;
                let free = match &stored {
                    None => true,
                    Some(current) => offset > 0 && prefix(current, offset) == prefix(value, offset),
                };
                if !free {
                    return Ok(ScriptReply::Nil);
                }
                entries.insert(key.to_string(), (value.to_string(), now + ttl));
                Ok(ScriptReply::Text("OK".to_string()))
            }
            "refresh" => {
                let ttl = millis(&args, 1)?;
                if stored.as_deref() != Some(value) {
                    return Ok(ScriptReply::Int(0));
                }
                entries.insert(key.to_string(), (value.to_string(), now + ttl));
                Ok(ScriptReply::Int(1))
            }
            "release" => {
                if stored.as_deref() != Some(value) {
                    return Ok(ScriptReply::Int(0));
                }
                entries.remove(key);
                Ok(ScriptReply::Int(1))
            }
            "pttl" => match entries.get(key) {
                Some((current, expires_at)) if current == value => Ok(ScriptReply::Int(
                    expires_at.saturating_duration_since(now).as_millis() as i64,
                )),
                _ => Ok(ScriptReply::Int(-3)),
            },
            other => Err(LockError::backend(format!("NOSCRIPT {}", other))),
        }
    }
}
