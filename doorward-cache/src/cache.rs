//! In-memory TTL cache.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use crate::clock::{MonotonicClock, TimeSource};

/// Cache entry with TTL.
#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    written_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.written_at) > self.ttl
    }
}

/// Thread-safe key-value cache with a TTL supplied per write.
///
/// Expiry is lazy: an entry is only evicted when a read finds it stale, or
/// when an operator removes it. There is no background sweeper.
///
/// # Locking
///
/// One reader-writer lock guards the whole map. Reads share it; an expired
/// read drops the shared lock and takes the exclusive one to evict. Racing
/// readers may all decide to evict the same key; eviction re-checks the entry
/// and removing an absent key is a no-op.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    clock: Arc<dyn TimeSource>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Creates an empty cache on the monotonic clock.
    pub fn new() -> Self {
        Self::with_time_source(Arc::new(MonotonicClock))
    }

    /// Creates an empty cache reading time from `clock`.
    pub fn with_time_source(clock: Arc<dyn TimeSource>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Gets a live value by key.
    ///
    /// Returns None if absent or expired; an expired entry is evicted.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired_at(now) => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        // A writer may have refreshed the entry between the two locks.
        if entries.get(key).is_some_and(|e| e.is_expired_at(now)) {
            entries.remove(key);
        }
        None
    }

    /// Inserts or fully overwrites `key`, restarting its TTL.
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            written_at: self.clock.now(),
            ttl,
        };
        self.entries.write().insert(key, entry);
    }

    /// Removes an entry. Returns true if one was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.write().remove(key).is_some()
    }

    /// Removes every listed key under one lock. Returns how many were present.
    pub fn remove_many<'a, Q, I>(&self, keys: I) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized + 'a,
        I: IntoIterator<Item = &'a Q>,
    {
        let mut entries = self.entries.write();
        keys.into_iter()
            .filter(|key| entries.remove(*key).is_some())
            .count()
    }

    /// Clears all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Removes all expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired_at(now));
        before - entries.len()
    }

    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns cache statistics without evicting anything.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.entries.read();
        let expired = entries.values().filter(|e| e.is_expired_at(now)).count();
        CacheStats {
            total_entries: entries.len(),
            expired_entries: expired,
            valid_entries: entries.len().saturating_sub(expired),
        }
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Stored entries, expired ones included
    pub total_entries: usize,
    /// Entries past their TTL that no read has evicted yet
    pub expired_entries: usize,
    /// Live entries
    pub valid_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::thread;

    use proptest::prelude::*;

    use crate::clock::ManualClock;

    const MINUTE: Duration = Duration::from_secs(60);

    fn manual_cache<V: Clone>() -> (Arc<ManualClock>, TtlCache<String, V>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_time_source(clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_cache_put_get() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.put("S1".into(), 7, MINUTE);
        assert_eq!(cache.get("S1"), Some(7));
    }

    #[test]
    fn test_cache_miss() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        assert!(cache.get("nonexistent").is_none());
    }

    #[test]
    fn test_put_overwrites_whole_entry() {
        let (_, cache) = manual_cache::<Vec<&str>>();
        cache.put("S1".into(), vec!["A"], MINUTE);
        cache.put("S1".into(), vec!["B"], MINUTE);
        assert_eq!(cache.get("S1"), Some(vec!["B"]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_read_evicts() {
        let (clock, cache) = manual_cache::<u32>();
        cache.put("S1".into(), 1, 10 * MINUTE);

        clock.advance(10 * MINUTE);
        assert_eq!(cache.get("S1"), Some(1), "expiry is strictly after ttl");

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("S1").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_rewrite_resets_bucket_expiry() {
        let (clock, cache) = manual_cache::<HashMap<String, u32>>();

        let mut bucket = HashMap::new();
        bucket.insert("A".to_string(), 1);
        cache.put("S".into(), bucket.clone(), 10 * MINUTE);

        clock.advance(5 * MINUTE);
        bucket.insert("B".to_string(), 2);
        cache.put("S".into(), bucket, 10 * MINUTE);

        clock.advance(9 * MINUTE); // t = 14m
        let live = cache.get("S").expect("bucket still live");
        assert!(live.contains_key("A"));
        assert!(live.contains_key("B"));

        clock.advance(2 * MINUTE); // t = 16m
        assert!(cache.get("S").is_none());
    }

    #[test]
    fn test_cache_remove() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.put("S1".into(), 1, MINUTE);
        assert!(cache.remove("S1"));
        assert!(!cache.remove("S1"));
        assert!(cache.get("S1").is_none());
    }

    #[test]
    fn test_remove_many_leaves_others() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        for id in ["X", "Y", "Z"] {
            cache.put(id.into(), 1, MINUTE);
        }
        let removed = cache.remove_many(["X", "Y", "missing"]);
        assert_eq!(removed, 2);
        assert!(cache.get("X").is_none());
        assert!(cache.get("Y").is_none());
        assert_eq!(cache.get("Z"), Some(1));
    }

    #[test]
    fn test_cache_clear() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        cache.put("S1".into(), 1, MINUTE);
        cache.put("S2".into(), 2, MINUTE);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_and_purge() {
        let (clock, cache) = manual_cache::<u32>();
        cache.put("short".into(), 1, MINUTE);
        cache.put("long".into(), 2, 60 * MINUTE);
        clock.advance(2 * MINUTE);

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.valid_entries, 1);

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[test]
    fn test_concurrent_expired_reads_are_idempotent() {
        let (clock, cache) = manual_cache::<u32>();
        let cache = Arc::new(cache);
        cache.put("S1".into(), 1, MINUTE);
        cache.put("S2".into(), 2, 60 * MINUTE);
        clock.advance(2 * MINUTE);

        let readers: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.get("S1"))
            })
            .collect();

        for reader in readers {
            assert!(reader.join().unwrap().is_none());
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("S2"), Some(2));
    }

    #[test]
    fn test_zero_ttl_expires_once_time_moves() {
        let (clock, cache) = manual_cache::<u32>();
        cache.put("S1".into(), 1, Duration::ZERO);
        clock.advance(Duration::from_millis(1));
        assert!(cache.get("S1").is_none());
    }

    proptest! {
        #[test]
        fn prop_entry_lives_exactly_ttl(ttl_secs in 0u64..3600, probe_secs in 0u64..7200) {
            let (clock, cache) = manual_cache::<u8>();
            cache.put("k".into(), 1, Duration::from_secs(ttl_secs));
            clock.advance(Duration::from_secs(probe_secs));
            prop_assert_eq!(cache.get("k").is_some(), probe_secs <= ttl_secs);
        }
    }
}
