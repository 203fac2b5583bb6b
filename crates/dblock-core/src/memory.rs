//! In-process lock backend.
//!
//! Useful for tests and single-process deployments. Locks live in a map
//! guarded by a mutex, so every operation is trivially atomic; expiry is
//! measured on the tokio clock, which lets tests drive it with paused time.
//!
//! ## Limitations
//! - Not persistent (locks are lost on restart)
//! - Not distributed (one process only)
//! - Expired records are dropped lazily, when their key is touched

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::context::Context;
use crate::error::{LockError, LockResult};
use crate::traits::{Claim, LockBackend};

#[derive(Debug, Clone)]
struct Entry {
    token: String,
    metadata: String,
    expires_at: Instant,
}

/// A [`LockBackend`] that keeps locks in process memory.
///
/// Clones share the same map. A caller re-obtaining its own live lock with
/// the same token succeeds and replaces the metadata and lease.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live locks.
    pub fn len(&self) -> LockResult<usize> {
        let now = Instant::now();
        Ok(self.entries()?.values().filter(|e| e.expires_at > now).count())
    }

    pub fn is_empty(&self) -> LockResult<bool> {
        Ok(self.len()? == 0)
    }

    fn entries(&self) -> LockResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| LockError::backend("memory backend mutex poisoned"))
    }

    /// Returns the live entry for `key`, dropping it if it has expired.
    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.expires_at <= now) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    fn owns(entry: &Entry, claim: &Claim) -> bool {
        entry.token == claim.token() && entry.metadata == claim.metadata()
    }

    fn expiry(ttl: Duration) -> LockResult<Instant> {
        Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| LockError::InvalidArgument(format!("ttl {:?} is out of range", ttl)))
    }
}

impl LockBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn obtain(&self, ctx: &Context, claim: &Claim, ttl: Duration) -> LockResult<bool> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let expires_at = Self::expiry(ttl)?;
        let mut entries = self.entries()?;
        if let Some(entry) = Self::live(&mut entries, claim.key())
            && entry.token != claim.token()
        {
            return Ok(false);
        }
        entries.insert(
            claim.key().to_string(),
            Entry {
                token: claim.token().to_string(),
                metadata: claim.metadata().to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn refresh(&self, ctx: &Context, claim: &Claim, ttl: Duration) -> LockResult<bool> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let expires_at = Self::expiry(ttl)?;
        let mut entries = self.entries()?;
        match Self::live(&mut entries, claim.key()) {
            Some(entry) if Self::owns(entry, claim) => {
                entry.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, ctx: &Context, claim: &Claim) -> LockResult<bool> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let mut entries = self.entries()?;
        let owned = Self::live(&mut entries, claim.key()).is_some_and(|e| Self::owns(e, claim));
        if owned {
            entries.remove(claim.key());
        }
        Ok(owned)
    }

    async fn query(&self, ctx: &Context, claim: &Claim) -> LockResult<Option<Duration>> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }
        let mut entries = self.entries()?;
        Ok(match Self::live(&mut entries, claim.key()) {
            Some(entry) if Self::owns(entry, claim) => {
                Some(entry.expires_at.saturating_duration_since(Instant::now()))
            }
            _ => None,
        })
    }
}
