use std::time::Duration;

/// Default time-to-live of a cached response.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Per-request caching instructions.
///
/// A request without a policy still reads from the cache; the policy only
/// enables writes and `force_expire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Lifetime of the entry written for this request
    pub ttl: Duration,
    /// Drop any existing entry before the freshness check
    pub force_expire: bool,
}

impl CachePolicy {
    /// Policy with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        CachePolicy {
            ttl,
            force_expire: false,
        }
    }

    /// Invalidate the existing entry before fetching.
    pub fn with_force_expire(mut self) -> Self {
        self.force_expire = true;
        self
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
