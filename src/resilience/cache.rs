//! Response Cache
//!
//! TTL-bounded, capacity-bounded in-memory cache for generated responses,
//! keyed by a caller-derived request fingerprint. The cache itself is
//! content-agnostic: fingerprint derivation (normalized query + intent +
//! context hash) belongs to the routing layer.
//!
//! ## Usage
//!
//! ```no_run
//! use pattern_advisor::resilience::ResponseCache;
//!
//! let cache = ResponseCache::new(1000);
//!
//! if let Some(hit) = cache.get("fp:a1b2c3") {
//!     println!("{hit}");
//! }
//!
//! // ... generation succeeded ...
//! cache.insert("fp:a1b2c3", "generated advice", 3600); // TTL: 1 hour
//! ```

use dashmap::DashMap;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Cache entry with expiration.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: SystemTime,
}

/// Concurrent TTL response cache.
///
/// Expiry is enforced lazily on [`get`](ResponseCache::get): an entry past
/// its TTL is removed on observation and never returned. On capacity
/// overflow the entry with the oldest remaining TTL (earliest expiry) is
/// evicted first, so short-lived entries make room before long-lived ones.
#[derive(Debug)]
pub struct ResponseCache {
    store: DashMap<String, CacheEntry>,
    max_entries: usize,
}

impl ResponseCache {
    /// Create a cache bounded to `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            store: DashMap::new(),
            max_entries,
        }
    }

    /// Look up a fingerprint, returning the cached value if present and
    /// not expired.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn get(&self, fingerprint: &str) -> Option<String> {
        if let Some(entry) = self.store.get(fingerprint) {
            if entry.expires_at > SystemTime::now() {
                debug!(fingerprint = fingerprint, "cache hit");
                return Some(entry.value.clone());
            }
            // Expired - drop the read guard before removing to avoid a
            // shard deadlock.
            drop(entry);
            self.store.remove(fingerprint);
            debug!(fingerprint = fingerprint, "cache entry expired");
        }
        debug!(fingerprint = fingerprint, "cache miss");
        None
    }

    /// Insert a value under a fingerprint with a TTL in seconds.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn insert(
        &self,
        fingerprint: impl Into<String>,
        value: impl Into<String>,
        ttl_secs: u64,
    ) {
        let fingerprint = fingerprint.into();
        let value = value.into();

        // Overwrites don't grow the map, so only evict for genuinely new keys.
        if self.max_entries > 0
            && !self.store.contains_key(&fingerprint)
            && self.store.len() >= self.max_entries
        {
            self.evict_earliest_expiry();
        }

        self.store.insert(
            fingerprint.clone(),
            CacheEntry {
                value,
                expires_at: SystemTime::now() + Duration::from_secs(ttl_secs),
            },
        );
        debug!(fingerprint = fingerprint, ttl_secs = ttl_secs, "cached");
    }

    /// Remove a single entry.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn remove(&self, fingerprint: &str) {
        self.store.remove(fingerprint);
    }

    /// Clear all entries.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Return cache statistics.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.store.len(),
            max_entries: self.max_entries,
        }
    }

    /// Evict the entry whose expiry is closest (oldest remaining TTL).
    fn evict_earliest_expiry(&self) {
        // Collect the victim key first to release all read guards before
        // calling remove (avoids shard deadlock).
        let victim = self
            .store
            .iter()
            .min_by_key(|e| e.value().expires_at)
            .map(|e| e.key().clone());
        if let Some(key) = victim {
            debug!(fingerprint = key, "evicting earliest-expiry entry");
            self.store.remove(&key);
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of entries currently held.
    pub entries: usize,
    /// Configured capacity bound.
    pub max_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get_round_trip() {
        let cache = ResponseCache::new(10);
        cache.insert("fp1", "value1", 3600);
        assert_eq!(cache.get("fp1"), Some("value1".to_string()));
        assert_eq!(cache.get("fp2"), None);
    }

    #[tokio::test]
    async fn test_expired_entry_never_returned() {
        let cache = ResponseCache::new(10);
        cache.insert("short", "v", 1);
        assert_eq!(cache.get("short"), Some("v".to_string()));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("short"), None);
        // Lazy expiry also removed it.
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_eviction_at_capacity() {
        let cache = ResponseCache::new(3);
        cache.insert("a", "1", 3600);
        cache.insert("b", "2", 3600);
        cache.insert("c", "3", 3600);
        cache.insert("d", "4", 3600);
        assert_eq!(
            cache.stats().entries,
            3,
            "cache must not exceed capacity after eviction"
        );
        assert_eq!(cache.get("d"), Some("4".to_string()));
    }

    #[test]
    fn test_eviction_picks_earliest_expiry() {
        let cache = ResponseCache::new(3);
        cache.insert("long-a", "1", 3600);
        cache.insert("short", "2", 5);
        cache.insert("long-b", "3", 3600);

        cache.insert("new", "4", 3600);

        // The 5-second entry had the oldest remaining TTL.
        assert_eq!(cache.get("short"), None);
        assert_eq!(cache.get("long-a"), Some("1".to_string()));
        assert_eq!(cache.get("long-b"), Some("3".to_string()));
        assert_eq!(cache.get("new"), Some("4".to_string()));
    }

    #[test]
    fn test_overwrite_existing_key_does_not_evict() {
        let cache = ResponseCache::new(2);
        cache.insert("a", "old", 3600);
        cache.insert("b", "other", 3600);
        cache.insert("a", "new", 3600);
        assert_eq!(cache.get("a"), Some("new".to_string()));
        assert_eq!(cache.get("b"), Some("other".to_string()));
    }

    #[tokio::test]
    async fn test_concurrent_access_no_corruption() {
        use std::sync::Arc;

        let cache = Arc::new(ResponseCache::new(1000));
        let mut handles = Vec::new();

        for i in 0..10 {
            let c = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for j in 0..50 {
                    c.insert(format!("task-{i}-key-{j}"), format!("val-{i}-{j}"), 3600);
                }
            }));
        }
        for i in 0..10 {
            let c = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for j in 0..50 {
                    let _ = c.get(&format!("task-{i}-key-{j}"));
                }
            }));
        }

        for h in handles {
            let _ = h.await;
        }

        let stats = cache.stats();
        assert!(
            stats.entries <= 1000,
            "entries must not exceed capacity: got {}",
            stats.entries
        );
    }

    #[test]
    fn test_clear_removes_all_entries() {
        let cache = ResponseCache::new(100);
        for i in 0..10 {
            cache.insert(format!("k{i}"), format!("v{i}"), 3600);
        }
        assert_eq!(cache.stats().entries, 10);
        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_remove_nonexistent_key_is_noop() {
        let cache = ResponseCache::new(10);
        cache.remove("nonexistent");
    }
}
