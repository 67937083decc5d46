//! Race-tolerant keyed memoization
//!
//! Misses are computed outside any lock. Concurrent first accesses to one key
//! may compute redundantly; the first value stored wins and later results are
//! discarded, so every reader observes one value per key.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for cache performance monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of stored entries
    pub entry_count: usize,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that ran the compute function
    pub misses: u64,
    /// Computations that lost a race and were thrown away
    pub discarded: u64,
}

impl CacheStats {
    /// Fraction of lookups answered without computing
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Concurrent write-once map
///
/// The compute function passed to [`get_or_compute`](Self::get_or_compute)
/// must be deterministic for a given key; the cache does not enforce it.
#[derive(Debug)]
pub struct KeyedMemoCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, V>,
    hits: AtomicU64,
    misses: AtomicU64,
    discarded: AtomicU64,
}

impl<K, V> Default for KeyedMemoCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }
}

impl<K, V> KeyedMemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value for `key`, computing it on a miss
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce(&K) -> V,
    {
        if let Some(value) = self.lookup(&key) {
            return value;
        }
        let computed = compute(&key);
        self.store(key, computed)
    }

    /// Fallible variant of [`get_or_compute`](Self::get_or_compute)
    ///
    /// Nothing is stored when `compute` fails; a later call retries.
    ///
    /// # Errors
    /// Whatever `compute` returns
    pub fn try_get_or_compute<F, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }
        let computed = compute(&key)?;
        Ok(self.store(key, computed))
    }

    /// Stored value without computing
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    /// True if `key` has a stored value
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of stored entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let found = self.get(key);
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    // First writer wins; a losing racer returns the stored value.
    fn store(&self, key: K, computed: V) -> V {
        match self.entries.entry(key) {
            Entry::Occupied(existing) => {
                self.discarded.fetch_add(1, Ordering::Relaxed);
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                slot.insert(computed.clone());
                computed
            }
        }
    }
}
