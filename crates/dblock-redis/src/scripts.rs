//! Lua scripts run by the Redis backend.
//!
//! The stored value is `token ++ metadata`. Every script touches exactly one
//! key and runs as a single `EVAL`, so Redis executes the compare and the act
//! step without interleaving other clients.

/// A named Lua script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockScript {
    name: &'static str,
    source: &'static str,
}

impl LockScript {
    const fn new(name: &'static str, source: &'static str) -> Self {
        Self { name, source }
    }

    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The Lua source passed to `EVAL`.
    pub fn source(&self) -> &'static str {
        self.source
    }
}

/// `ARGV`: value, token length, ttl in milliseconds.
///
/// Sets the key if absent. Otherwise overwrites it only when the first
/// `ARGV[2]` bytes of the stored value equal the new token, which lets an
/// owner reclaim its own live lock. Replies `nil` when someone else holds it.
pub const OBTAIN: LockScript = LockScript::new(
    "obtain",
    r#"
if redis.call("set", KEYS[1], ARGV[1], "NX", "PX", ARGV[3]) then
    return redis.status_reply("OK")
end

local offset = tonumber(ARGV[2])
if redis.call("getrange", KEYS[1], 0, offset - 1) == string.sub(ARGV[1], 1, offset) then
    return redis.call("set", KEYS[1], ARGV[1], "PX", ARGV[3])
end
"#,
);

/// `ARGV`: value, ttl in milliseconds. Replies 1 when the lease was extended.
pub const REFRESH: LockScript = LockScript::new(
    "refresh",
    r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("pexpire", KEYS[1], ARGV[2])
end
return 0
"#,
);

/// `ARGV`: value. Replies 1 when the key was deleted.
pub const RELEASE: LockScript = LockScript::new(
    "release",
    r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
end
return 0
"#,
);

/// Reply of [`PTTL`] when the key is missing or held under another value.
pub const NOT_OWNED: i64 = -3;

/// `ARGV`: value. Replies the remaining lease in milliseconds, or
/// [`NOT_OWNED`].
pub const PTTL: LockScript = LockScript::new(
    "pttl",
    r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("pttl", KEYS[1])
end
return -3
"#,
);
