//! Read-through TTL cache for idempotent API calls.
//!
//! Entries expire purely by time; there is no invalidation API. Expired
//! entries are dropped when their key is read, and inserts sweep the whole
//! map at most once per [`PRUNE_INTERVAL`]. Concurrent misses for the same key
//! each run their own fetch and the last one to finish wins the slot (no
//! stampede protection).

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, instrument, trace};
use url::form_urlencoded;

use crate::request::Method;

/// Longest accepted entry lifetime.
const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Minimum time between sweeps of expired entries.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(30);

/// Builds the cache key for a call: method, normalized path and sorted query.
///
/// Query keys and values are form-encoded, so a value containing `&` or `=`
/// cannot produce the same key as a different set of parameters.
///
/// ```
/// use std::collections::BTreeMap;
/// use socket_sdk::cache::cache_key;
/// use socket_sdk::request::Method;
///
/// let mut query = BTreeMap::new();
/// query.insert("b".to_string(), "2".to_string());
/// query.insert("a".to_string(), "1".to_string());
/// assert_eq!(cache_key(Method::Get, "/quota/", &query), "GET quota?a=1&b=2");
/// ```
#[must_use]
pub fn cache_key(method: Method, path: &str, query: &BTreeMap<String, String>) -> String {
    let path = path.trim_matches('/');
    if query.is_empty() {
        return format!("{method} {path}");
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.iter())
        .finish();
    format!("{method} {path}?{query}")
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Shared response cache keyed by [`cache_key`].
#[derive(Debug)]
pub struct ResponseCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    next_prune: Mutex<Instant>,
}

impl<V> Default for ResponseCache<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            next_prune: Mutex::new(Instant::now() + PRUNE_INTERVAL),
        }
    }
}

impl<V: Clone> ResponseCache<V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Live value for `key`; expired entries are evicted on lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
        }
        trace!(key, "cache entry expired");
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// Stores `value` under `key` for `ttl`, sweeping expired entries when due.
    pub fn insert(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = Instant::now();
        self.prune_expired(now);
        let expires_at = now + ttl.min(MAX_TTL);
        self.entries
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Removes every expired entry if the last sweep is older than [`PRUNE_INTERVAL`].
    fn prune_expired(&self, now: Instant) {
        {
            // Another insert holding the lock is already sweeping.
            let Ok(mut next_prune) = self.next_prune.try_lock() else {
                return;
            };
            if now < *next_prune {
                return;
            }
            *next_prune = now + PRUNE_INTERVAL;
        }

        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "pruned expired cache entries");
        }
    }

    /// Returns the cached value for `key` or runs `fetch` and caches its success.
    ///
    /// A zero `ttl` bypasses the cache entirely. Errors are never cached.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `fetch`.
    #[instrument(level = "debug", skip(self, fetch), fields(ttl_ms = ttl.as_millis()))]
    pub async fn get_or_fetch<E, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if ttl.is_zero() {
            return fetch().await;
        }
        if let Some(value) = self.get(key) {
            debug!("cache hit");
            return Ok(value);
        }

        debug!("cache miss");
        let value = fetch().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }

    /// Number of stored entries, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
