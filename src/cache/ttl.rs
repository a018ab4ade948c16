//! Thread-safe TTL cache with least-recently-used eviction
//!
//! A single mutex guards the recency-ordered map and the counters. Expiry is
//! checked lazily on `get`; an expired entry counts as a miss and is dropped.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::cache::clock::{Clock, SystemClock};

/// Cached value with its expiry instant
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    /// `None` when the TTL reaches past what `Instant` can represent
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub hit_rate: f64,
    pub max_size: usize,
}

struct Inner<V> {
    entries: LruCache<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

enum Lookup<V> {
    Hit(V),
    Expired,
    Missing,
}

/// Bounded key/value store with per-entry TTL
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    clock: Arc<dyn Clock>,
    capacity: usize,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache backed by the system clock
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Create a cache with an injected clock
    ///
    /// A capacity of zero is raised to one.
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            clock,
            capacity: capacity.get(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        // Counters and the map are always left consistent, so a poisoned
        // lock is still safe to use.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up a live entry, promoting it to most-recently-used
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        let lookup = match inner.entries.get(key) {
            Some(entry) if entry.is_live(now) => Lookup::Hit(entry.value.clone()),
            Some(_) => Lookup::Expired,
            None => Lookup::Missing,
        };

        match lookup {
            Lookup::Hit(value) => {
                inner.hits += 1;
                Some(value)
            }
            Lookup::Expired => {
                inner.entries.pop(key);
                inner.misses += 1;
                None
            }
            Lookup::Missing => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert or replace an entry
    ///
    /// Replacing an existing key never evicts. Inserting a new key into a
    /// full cache evicts exactly the least-recently-used entry first.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let entry = CacheEntry {
            value,
            expires_at: self.clock.now().checked_add(ttl),
        };

        let mut inner = self.lock();
        if !inner.entries.contains(&key) && inner.entries.len() >= self.capacity {
            if inner.entries.pop_lru().is_some() {
                inner.evictions += 1;
            }
        }
        inner.entries.put(key, entry);
    }

    /// Remove one entry, or every entry when `key` is `None`
    pub fn invalidate(&self, key: Option<&str>) {
        let mut inner = self.lock();
        match key {
            Some(key) => {
                inner.entries.pop(key);
            }
            None => inner.entries.clear(),
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.invalidate(None);
    }

    /// Eagerly remove expired entries; returns how many were dropped
    ///
    /// Entries removed here are not counted as misses.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.lock();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.entries.pop(key);
        }
        expired.len()
    }

    /// Current statistics snapshot
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let total = inner.hits + inner.misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            inner.hits as f64 / total as f64
        };

        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            size: inner.entries.len(),
            hit_rate,
            max_size: self.capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("capacity", &self.capacity)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;

    const TTL: Duration = Duration::from_secs(60);

    fn cache_with_clock(capacity: usize) -> (TtlCache<String>, ManualClock) {
        let clock = ManualClock::new();
        let cache = TtlCache::with_clock(capacity, Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn test_set_then_get_hits() {
        let (cache, _clock) = cache_with_clock(4);
        cache.set("a", "alpha".to_string(), TTL);

        assert_eq!(cache.get("a"), Some("alpha".to_string()));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_missing_key_counts_miss() {
        let (cache, _clock) = cache_with_clock(4);
        assert_eq!(cache.get("nope"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_expired_entry_is_removed_and_missed() {
        let (cache, clock) = cache_with_clock(4);
        cache.set("a", "alpha".to_string(), Duration::from_secs(10));

        clock.advance(Duration::from_secs(9));
        assert!(cache.get("a").is_some());

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("a"), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn test_overflow_evicts_least_recently_used() {
        let (cache, _clock) = cache_with_clock(3);
        cache.set("a", "1".to_string(), TTL);
        cache.set("b", "2".to_string(), TTL);
        cache.set("c", "3".to_string(), TTL);

        // Touch "a" so "b" becomes the oldest
        assert!(cache.get("a").is_some());
        cache.set("d", "4".to_string(), TTL);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("b"), None);
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_update_never_evicts() {
        let (cache, clock) = cache_with_clock(2);
        cache.set("a", "1".to_string(), TTL);
        cache.set("b", "2".to_string(), TTL);
        cache.set("a", "1b".to_string(), Duration::from_secs(5));

        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some("1b".to_string()));

        // Replaced expiry applies
        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let (cache, _clock) = cache_with_clock(5);
        for i in 0..50 {
            cache.set(format!("k{}", i % 13), i.to_string(), TTL);
            if i % 3 == 0 {
                cache.get(&format!("k{}", i % 7));
            }
            assert!(cache.len() <= 5);
        }
    }

    #[test]
    fn test_invalidate_single_and_all() {
        let (cache, _clock) = cache_with_clock(4);
        cache.set("a", "1".to_string(), TTL);
        cache.set("b", "2".to_string(), TTL);

        cache.invalidate(Some("a"));
        cache.invalidate(Some("missing"));
        assert_eq!(cache.len(), 1);

        cache.invalidate(None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hit_rate_zero_without_accesses() {
        let (cache, _clock) = cache_with_clock(4);
        let stats = cache.stats();
        assert_eq!(stats.hit_rate, 0.0);
        assert_eq!(stats.max_size, 4);
    }

    #[test]
    fn test_hit_rate_ratio() {
        let (cache, _clock) = cache_with_clock(4);
        cache.set("a", "1".to_string(), TTL);
        cache.get("a");
        cache.get("a");
        cache.get("a");
        cache.get("b");
        assert!((cache.stats().hit_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_purge_expired_does_not_count_misses() {
        let (cache, clock) = cache_with_clock(4);
        cache.set("short", "1".to_string(), Duration::from_secs(1));
        cache.set("long", "2".to_string(), Duration::from_secs(100));

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let (cache, clock) = cache_with_clock(4);
        cache.set("a", "1".to_string(), Duration::MAX);
        cache.set("b", "2".to_string(), Duration::from_secs(u64::MAX));

        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert_eq!(cache.get("a"), Some("1".to_string()));
        assert_eq!(cache.get("b"), Some("2".to_string()));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_concurrent_access_keeps_counters_consistent() {
        const THREADS: usize = 8;
        const OPS: usize = 500;

        let cache: TtlCache<usize> = TtlCache::new(16);
        std::thread::scope(|scope| {
            for t in 0..THREADS {
                let cache = &cache;
                scope.spawn(move || {
                    for i in 0..OPS {
                        let key = format!("k{}", (t * 7 + i) % 40);
                        match i % 4 {
                            0 | 1 => cache.set(key, i, TTL),
                            2 => {
                                cache.get(&key);
                            }
                            _ => {
                                cache.get(&key);
                                if i % 20 == 3 {
                                    cache.invalidate(Some(key.as_str()));
                                }
                            }
                        }
                        assert!(cache.len() <= 16);
                    }
                });
            }
        });

        let stats = cache.stats();
        assert!(stats.size <= stats.max_size);
        assert_eq!(stats.hits + stats.misses, (THREADS * OPS / 2) as u64);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let cache: TtlCache<u32> = TtlCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.set("a", 1, TTL);
        cache.set("b", 2, TTL);
        assert_eq!(cache.len(), 1);
    }
}
