//! Fixed-capacity, recency-evicted caches.
//!
//! [`BoundedCache`] wraps an [`LruCache`] in a mutex so concurrent readers and
//! writers cannot corrupt the map. Losing an entry to eviction is expected;
//! callers fall back to the store.

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

/// Thread-safe LRU cache with a fixed capacity.
pub struct BoundedCache<K: Hash + Eq, V: Clone> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Clone> BoundedCache<K, V> {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Insert unless the key is already present.
    ///
    /// Returns `true` if the key was already cached; the existing value is
    /// kept and promoted. Inserting may evict the least recently used entry.
    pub fn contains_or_add(&self, key: K, value: V) -> bool {
        let mut cache = self.inner.lock();
        if cache.get(&key).is_some() {
            return true;
        }
        cache.put(key, value);
        false
    }

    /// Look up and promote an entry.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    /// Look up without touching recency.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.inner.lock().peek(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().contains(key)
    }

    /// Remove an entry, returning it if present.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.lock().pop(key)
    }

    /// Snapshot of all values, least recently used first.
    pub fn values(&self) -> Vec<V> {
        let cache = self.inner.lock();
        cache.iter().rev().map(|(_, v)| v.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().cap().get()
    }
}
