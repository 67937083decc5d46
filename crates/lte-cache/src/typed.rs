//! Typed memo caches for per-model side products
//!
//! Both caches are keyed by [`ModelKey`]: the integer identity of a branch's
//! model plus an index within it (typically a rupture or section index).

use crate::memo::{CacheStats, KeyedMemoCache};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Composite `(model identity, sub-index)` cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    /// Identity of the model instance (stable for the run)
    pub model: u64,
    /// Index within the model
    pub sub_index: usize,
}

impl ModelKey {
    /// Create key
    #[inline]
    #[must_use]
    pub const fn new(model: u64, sub_index: usize) -> Self {
        Self { model, sub_index }
    }
}

impl Display for ModelKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "model {}/{}", self.model, self.sub_index)
    }
}

/// Memoized "is item X inside region R" tests
///
/// One cache per region; the region name only labels logs and stats.
#[derive(Debug)]
pub struct ContainmentCache {
    region: String,
    inner: KeyedMemoCache<ModelKey, bool>,
}

impl ContainmentCache {
    /// Create cache for `region`
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            inner: KeyedMemoCache::new(),
        }
    }

    /// Region label
    #[inline]
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Cached containment result, running `test` on a miss
    pub fn is_contained<F>(&self, key: ModelKey, test: F) -> bool
    where
        F: FnOnce(&ModelKey) -> bool,
    {
        self.inner.get_or_compute(key, test)
    }

    /// Cache counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

/// Share of one grid node touched by an item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeFraction {
    /// Grid node index
    pub node: usize,
    /// Area fraction in `[0, 1]`
    pub fraction: f64,
}

/// Memoized "which grid nodes does item X touch, and how much" lookups
///
/// Values are shared slices so readers never copy the node lists.
#[derive(Debug, Default)]
pub struct NodeFractionCache {
    inner: KeyedMemoCache<ModelKey, Arc<[NodeFraction]>>,
}

impl NodeFractionCache {
    /// Create empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached node fractions, running `compute` on a miss
    ///
    /// # Errors
    /// Whatever `compute` returns; nothing is cached on failure
    pub fn node_fractions<F, E>(&self, key: ModelKey, compute: F) -> Result<Arc<[NodeFraction]>, E>
    where
        F: FnOnce(&ModelKey) -> Result<Vec<NodeFraction>, E>,
    {
        self.inner
            .try_get_or_compute(key, |k| compute(k).map(Arc::from))
    }

    /// Stored fractions without computing
    #[must_use]
    pub fn get(&self, key: &ModelKey) -> Option<Arc<[NodeFraction]>> {
        self.inner.get(key)
    }

    /// Cache counters
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_is_memoized_per_key() {
        let cache = ContainmentCache::new("Bay Area");
        assert!(cache.is_contained(ModelKey::new(1, 4), |k| k.sub_index % 2 == 0));
        // A different test function must not be consulted for a cached key.
        assert!(cache.is_contained(ModelKey::new(1, 4), |_| false));
        assert!(!cache.is_contained(ModelKey::new(2, 4), |_| false));
        assert_eq!(cache.stats().entry_count, 2);
        assert_eq!(cache.region(), "Bay Area");
    }

    #[test]
    fn node_fractions_share_storage() {
        let cache = NodeFractionCache::new();
        let key = ModelKey::new(9, 0);
        let a = cache
            .node_fractions(key, |_| {
                Ok::<_, String>(vec![NodeFraction { node: 3, fraction: 0.25 }])
            })
            .unwrap();
        let b = cache.get(&key).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn node_fraction_errors_propagate() {
        let cache = NodeFractionCache::new();
        let r = cache.node_fractions(ModelKey::new(1, 1), |k| Err(format!("no geometry for {k}")));
        assert_eq!(r.unwrap_err(), "no geometry for model 1/1");
        assert!(cache.get(&ModelKey::new(1, 1)).is_none());
    }
}
