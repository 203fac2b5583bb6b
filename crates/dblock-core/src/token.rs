//! Ownership token generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::{LockError, LockResult};

/// Number of random bytes behind a generated token.
pub const TOKEN_BYTES: usize = 16;

/// Length in characters of a generated token.
pub const TOKEN_LEN: usize = 22;

/// Generates a fresh ownership token.
///
/// The token is [`TOKEN_BYTES`] bytes from the operating system CSPRNG,
/// base64 URL-safe encoded without padding. Every call uses its own buffer,
/// so concurrent callers never share scratch space.
pub fn random_token() -> LockResult<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(LockError::backend)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
