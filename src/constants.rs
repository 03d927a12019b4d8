/// Default TTL for cache-aside reads when callers do not pass one.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// How close to expiry a rolling read gets before it kicks off a
/// background refresh. Tunable via `[cache] stale_buffer_ms`.
pub const DEFAULT_STALE_BUFFER_MS: u64 = 10_000;

pub const DEFAULT_BUNDLE_SIZE: usize = 20;

pub const DEFAULT_BUNDLE_DELAY_SECS: u64 = 4;

pub const USER_AGENT: &str = "Availarr/0.1";
