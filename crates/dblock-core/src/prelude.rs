//! Convenience prelude for dblock types.

pub use crate::client::LockClient;
pub use crate::context::Context;
pub use crate::error::{LockError, LockResult};
pub use crate::handle::LockHandle;
pub use crate::options::ObtainOptions;
pub use crate::retry::{ExponentialBackoff, LimitRetry, LinearBackoff, NoRetry, RetryStrategy};
pub use crate::traits::{Claim, LockBackend};
