//! Redis backend for dblock.
//!
//! Each lock is one Redis key holding `token ++ metadata` with a millisecond
//! expiry. Every operation is a single Lua script evaluation.
//!
//! ```rust,ignore
//! use dblock_core::prelude::*;
//! use dblock_redis::RedisBackend;
//!
//! let client = LockClient::new(RedisBackend::connect("redis://localhost:6379").await?);
//! let lock = client
//!     .obtain(&Context::background(), "jobs:nightly", Duration::from_secs(30), ObtainOptions::new())
//!     .await?;
//! ```

pub mod backend;
pub mod client;
pub mod provider;
pub mod scripts;

pub use backend::RedisBackend;
pub use client::{ScriptClient, ScriptReply};
pub use provider::RedisBackendBuilder;
pub use scripts::LockScript;
