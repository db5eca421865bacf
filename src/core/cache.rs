//! Bounded in-process lookup caches.
//!
//! Used for the prefix <-> timestamp memo tables owned by the temporal
//! index and for the optional decoded-channel cache of the sample store.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Thread-safe cache holding at most `capacity` entries.
///
/// Uses `parking_lot::RwLock` for faster, non-poisoning locks. When full,
/// roughly half of the entries are dropped before inserting.
pub struct BoundedCache<K, V> {
    map: RwLock<HashMap<K, V>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries. Zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a cached value if it exists.
    #[inline]
    pub fn get(&self, key: &K) -> Option<V> {
        let found = self.map.read().get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Insert a value, evicting if the cache is full.
    pub fn insert(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        let mut map = self.map.write();
        if map.contains_key(&key) {
            return;
        }
        if map.len() >= self.capacity {
            let evict: Vec<K> = map.keys().take(map.len() / 2 + 1).cloned().collect();
            for k in evict {
                map.remove(&k);
            }
        }
        map.insert(key, value);
    }

    /// Return the cached value or compute, insert and return it.
    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(v) = self.get(&key) {
            return v;
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    /// Fallible variant of [`get_or_insert_with`](Self::get_or_insert_with).
    /// Errors are not cached.
    pub fn get_or_try_insert_with<E>(&self, key: K, compute: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if let Some(v) = self.get(&key) {
            return Ok(v);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Clear the entire cache.
    pub fn clear(&self) {
        self.map.write().clear();
    }

    /// Number of cached entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Check if cache is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_insert_get() {
        let cache = BoundedCache::new(16);
        cache.insert(1u32, "a".to_string());
        assert_eq!(cache.get(&1).as_deref(), Some("a"));
        assert!(cache.get(&2).is_none());
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_cache_bounded() {
        let cache = BoundedCache::new(10);
        for i in 0..100u32 {
            cache.insert(i, i * 2);
            assert!(cache.len() <= 10);
        }
        // the latest insert always survives
        assert_eq!(cache.get(&99), Some(198));
    }

    #[test]
    fn test_cache_disabled() {
        let cache = BoundedCache::new(0);
        cache.insert(1u32, 1u32);
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_insert_with(1, || 5), 5);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_try_insert_does_not_cache_errors() {
        let cache: BoundedCache<u32, u32> = BoundedCache::new(4);
        let r: Result<u32, &str> = cache.get_or_try_insert_with(1, || Err("boom"));
        assert!(r.is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_try_insert_with::<&str>(1, || Ok(3)), Ok(3));
        assert_eq!(cache.get(&1), Some(3));
    }
}
