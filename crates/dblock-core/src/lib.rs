//! Core traits, acquisition loop and lock handle for dblock.
//!
//! A lock is a named, time-bounded lease owned through an opaque token. The
//! pieces fit together as follows:
//!
//! - [`LockBackend`] is the four-operation contract a coordination store
//!   implements atomically (`obtain`, `refresh`, `release`, `query`).
//! - [`LockClient::obtain`] drives a backend under a [`RetryStrategy`] and a
//!   deadline, and returns a [`LockHandle`].
//! - [`LockHandle`] exposes the token, metadata, remaining TTL, refresh and
//!   release of one obtained lock.
//!
//! Nothing here spawns background work: leases are never renewed
//! automatically, call [`LockHandle::refresh`] before they run out.

pub mod client;
pub mod context;
pub mod error;
pub mod handle;
pub mod memory;
pub mod options;
pub mod prelude;
pub mod retry;
pub mod token;
pub mod traits;

pub use client::LockClient;
pub use context::{CancelHandle, Context};
pub use error::{LockError, LockResult};
pub use handle::LockHandle;
pub use memory::MemoryBackend;
pub use options::ObtainOptions;
pub use retry::{ExponentialBackoff, LimitRetry, LinearBackoff, NoRetry, RetryStrategy};
pub use token::random_token;
pub use traits::{Claim, LockBackend};
