//! In-memory URL cache.
//!
//! Responses are keyed by their canonical URL string. The cache is consulted
//! for every cacheable request; a [`CachePolicy`] on the request enables writes
//! and lets the caller force an entry out before the lookup.
//!
//! Entries carry an approximate size so the caller can watch memory use. The
//! size never drives eviction: entries leave the cache when they expire or are
//! invalidated.
//!
//! # Examples
//!
//! ```
//! use apiclient_http::cache::{CachePolicy, UrlCache};
//! use apiclient_http::types::{ApiResponse, Outcome};
//! use http::{HeaderMap, StatusCode};
//! use url::Url;
//!
//! # tokio_test::block_on(async {
//! let cache: UrlCache = UrlCache::new();
//! let url = Url::parse("http://example.com/a").unwrap();
//! let policy = CachePolicy::default();
//!
//! let fetch = || async {
//!     ApiResponse::new(
//!         Outcome::Success { status: StatusCode::OK, headers: HeaderMap::new() },
//!         Url::parse("http://example.com/a").unwrap(),
//!         "r1".to_string(),
//!     )
//! };
//!
//! let first = cache.process(&url, Some(&policy), fetch).await;
//! assert!(!first.from_cache);
//!
//! let second = cache.process(&url, Some(&policy), fetch).await;
//! assert!(second.from_cache);
//! # });
//! ```

mod policy;

pub use policy::{CachePolicy, DEFAULT_TTL};

use crate::types::ApiResponse;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use regex::Regex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Size charged to an entry with neither a body nor a declared length.
pub const BODILESS_ENTRY_SIZE: u64 = 256;

struct CacheEntry<T, E> {
    response: ApiResponse<T, E>,
    expires_at: Instant,
    size: u64,
}

impl<T, E> CacheEntry<T, E> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fresh lookups
    pub hits: u64,
    /// Lookups that found nothing or an expired entry
    pub misses: u64,
    /// Stored responses
    pub writes: u64,
    /// Current entry count
    pub entries: usize,
    /// Sum of entry sizes
    pub total_size: u64,
}

/// Keyed response cache with TTL expiry.
pub struct UrlCache<T = Bytes, E = ()> {
    entries: DashMap<String, CacheEntry<T, E>>,
    rules: RwLock<Vec<Regex>>,
    counters: CacheCounters,
}

impl<T, E> UrlCache<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Create an empty cache that accepts every URL.
    pub fn new() -> Self {
        UrlCache {
            entries: DashMap::new(),
            rules: RwLock::new(Vec::new()),
            counters: CacheCounters::default(),
        }
    }

    /// Serve `url` from the cache or run `fetch`.
    ///
    /// A fresh hit is returned marked `from_cache` without calling `fetch`. A
    /// fetched response is stored when `policy` is present, it has no errors and
    /// the URL passes the cache rules.
    pub async fn process<F, Fut>(
        &self,
        url: &Url,
        policy: Option<&CachePolicy>,
        fetch: F,
    ) -> ApiResponse<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ApiResponse<T, E>>,
    {
        match policy {
            Some(p) if p.force_expire => self.invalidate(url),
            _ => {
                if let Some(hit) = self.get(url) {
                    return hit;
                }
            }
        }

        let response = fetch().await;

        if let Some(policy) = policy {
            if response.has_no_errors() {
                self.put(url, &response, policy.ttl);
            } else {
                debug!(url = %url, kind = %response.kind(), "Not caching unsuccessful response");
            }
        }

        response
    }

    /// Fresh entry for `url`, marked `from_cache`.
    pub fn get(&self, url: &Url) -> Option<ApiResponse<T, E>> {
        let key = url.as_str();
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Cache hit");
                return Some(entry.response.clone().cached());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            // A concurrent writer may have refreshed the entry since the read.
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            debug!(key, "Cache miss (expired)");
        } else {
            debug!(key, "Cache miss");
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store `response` under `url` for `ttl`, replacing any entry.
    ///
    /// Error responses and URLs rejected by the rules are refused. Returns
    /// whether the response was stored.
    pub fn put(&self, url: &Url, response: &ApiResponse<T, E>, ttl: Duration) -> bool {
        if !response.has_no_errors() {
            warn!(
                url = %url,
                kind = %response.kind(),
                status = ?response.status(),
                "Cache consistency: refusing to store an error response"
            );
            return false;
        }
        if !self.allows(url) {
            debug!(url = %url, "URL not covered by cache rules");
            return false;
        }

        let size = entry_size(response);
        let mut stored = response.clone();
        stored.from_cache = false;
        self.entries.insert(
            url.as_str().to_string(),
            CacheEntry {
                response: stored,
                expires_at: Instant::now() + ttl,
                size,
            },
        );
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        debug!(key = url.as_str(), ttl_ms = ttl.as_millis() as u64, size, "Cache set");
        true
    }
}

impl<T, E> UrlCache<T, E> {
    /// Remove the entry for `url`.
    pub fn invalidate(&self, url: &Url) {
        if self.entries.remove(url.as_str()).is_some() {
            debug!(key = url.as_str(), "Cache invalidate");
        }
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) {
        self.entries.clear();
        debug!("Cache cleared");
    }

    /// Remove every entry whose key matches `pattern`. Returns how many were removed.
    pub fn invalidate_matching(&self, pattern: &Regex) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !pattern.is_match(key));
        before.saturating_sub(self.entries.len())
    }

    /// Restrict writes to URLs matching at least one rule.
    pub fn add_rule(&self, rule: Regex) {
        self.rules.write().push(rule);
    }

    /// Whether any rule matches `url`.
    pub fn matches_rules(&self, url: &Url) -> bool {
        self.rules.read().iter().any(|r| r.is_match(url.as_str()))
    }

    fn allows(&self, url: &Url) -> bool {
        let rules = self.rules.read();
        rules.is_empty() || rules.iter().any(|r| r.is_match(url.as_str()))
    }

    /// Entry count, including entries that have expired but not been looked up.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Approximate bytes held.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.value().size).sum()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
            entries: self.entries.len(),
            total_size: self.total_size(),
        }
    }
}

impl<T: Clone, E: Clone> Default for UrlCache<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_size<T, E>(response: &ApiResponse<T, E>) -> u64 {
    if let Some(body) = response.body() {
        return body.len() as u64;
    }
    response
        .headers()
        .and_then(crate::protocol::content_length)
        .unwrap_or(BODILESS_ENTRY_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Outcome;
    use http::{HeaderMap, HeaderValue, StatusCode};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn url(path: &str) -> Url {
        Url::parse(&format!("http://example.com{}", path)).unwrap()
    }

    fn response(status: u16, body: &'static [u8]) -> ApiResponse {
        ApiResponse::new(
            Outcome::TypedSuccess {
                status: StatusCode::from_u16(status).unwrap(),
                headers: HeaderMap::new(),
                body: Bytes::from_static(body),
                content: Some(Bytes::from_static(body)),
            },
            url("/"),
            "req".into(),
        )
    }

    #[tokio::test]
    async fn test_hit_skips_fetch() {
        let cache: UrlCache = UrlCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let policy = CachePolicy::default();
        let target = url("/a");

        for _ in 0..3 {
            let calls = calls.clone();
            cache
                .process(&target, Some(&policy), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    response(200, b"hello")
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.total_size, 5);
    }

    #[tokio::test]
    async fn test_expired_entry_refetches() {
        let cache: UrlCache = UrlCache::new();
        let policy = CachePolicy::new(Duration::from_millis(30));
        let target = url("/ttl");

        let first = cache
            .process(&target, Some(&policy), || async { response(200, b"one") })
            .await;
        assert!(!first.from_cache);

        let hit = cache
            .process(&target, Some(&policy), || async { response(200, b"two") })
            .await;
        assert!(hit.from_cache);
        assert_eq!(hit.body().unwrap().as_ref(), b"one");

        tokio::time::sleep(Duration::from_millis(80)).await;

        let refreshed = cache
            .process(&target, Some(&policy), || async { response(200, b"three") })
            .await;
        assert!(!refreshed.from_cache);
        assert_eq!(refreshed.body().unwrap().as_ref(), b"three");
    }

    #[tokio::test]
    async fn test_force_expire_removes_before_lookup() {
        let cache: UrlCache = UrlCache::new();
        let policy = CachePolicy::default();
        let target = url("/force");

        cache
            .process(&target, Some(&policy), || async { response(200, b"old") })
            .await;

        let forced = cache
            .process(&target, Some(&policy.with_force_expire()), || async {
                response(404, b"gone")
            })
            .await;
        assert!(!forced.from_cache);
        assert_eq!(forced.status(), Some(StatusCode::NOT_FOUND));
        // The 404 is not stored and the old entry is gone.
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_without_policy_never_writes() {
        let cache: UrlCache = UrlCache::new();
        let target = url("/nopolicy");

        cache
            .process(&target, None, || async { response(200, b"x") })
            .await;
        assert!(cache.is_empty());

        cache.put(&target, &response(200, b"x"), DEFAULT_TTL);
        let hit = cache
            .process(&target, None, || async { response(500, b"") })
            .await;
        assert!(hit.from_cache);
    }

    #[test]
    fn test_put_refuses_errors() {
        let cache: UrlCache = UrlCache::new();
        assert!(!cache.put(&url("/e"), &response(503, b"down"), DEFAULT_TTL));
        let failure: ApiResponse = ApiResponse::new(Outcome::Timeout, url("/e"), "r".into());
        assert!(!cache.put(&url("/e"), &failure, DEFAULT_TTL));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_rules_restrict_writes() {
        let cache: UrlCache = UrlCache::new();
        cache.add_rule(Regex::new(r"/images/").unwrap());

        assert!(cache.matches_rules(&url("/images/cat.png")));
        assert!(!cache.put(&url("/api/items"), &response(200, b"a"), DEFAULT_TTL));
        assert!(cache.put(&url("/images/cat.png"), &response(200, b"a"), DEFAULT_TTL));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_invalidate_matching() {
        let cache: UrlCache = UrlCache::new();
        for path in ["/users/1", "/users/2", "/posts/1"] {
            cache.put(&url(path), &response(200, b"a"), DEFAULT_TTL);
        }
        let removed = cache.invalidate_matching(&Regex::new("/users/").unwrap());
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_size_falls_back_to_content_length() {
        let cache: UrlCache = UrlCache::new();
        let mut headers = HeaderMap::new();
        headers.insert("content-length", HeaderValue::from_static("1024"));
        let with_length: ApiResponse = ApiResponse::new(
            Outcome::Success {
                status: StatusCode::OK,
                headers,
            },
            url("/len"),
            "r".into(),
        );
        let bare: ApiResponse = ApiResponse::new(
            Outcome::Success {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
            },
            url("/bare"),
            "r".into(),
        );
        cache.put(&url("/len"), &with_length, DEFAULT_TTL);
        cache.put(&url("/bare"), &bare, DEFAULT_TTL);
        assert_eq!(cache.total_size(), 1024 + BODILESS_ENTRY_SIZE);
    }

    #[test]
    fn test_canonical_key() {
        let cache: UrlCache = UrlCache::new();
        cache.put(&url("/a"), &response(200, b"a"), DEFAULT_TTL);
        let same = Url::parse("HTTP://EXAMPLE.com:80/a").unwrap();
        assert!(cache.get(&same).is_some());
    }
}
