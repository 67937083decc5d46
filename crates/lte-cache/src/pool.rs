//! Per-owner checkout/return pool for expensive instances
//!
//! Each owning thread has a private stack of idle instances:
//! - checkout pops from the caller's stack, or builds a new instance
//! - return pushes back onto the owner's stack
//! - instances are never destroyed mid-run, only by [`ResourcePool::clear`]
//!
//! Stacks are keyed by [`ThreadId`], which is never reused. Instances idle on
//! the stack of a thread that has exited are unreachable for checkout and are
//! only released by `clear`, so a pool shared across dispatch passes (each
//! with fresh scoped threads) must be cleared between passes.

use crate::error::{BoxError, PoolError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use tracing::debug;

type Factory<T> = Box<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolStats {
    /// Total instances constructed
    pub total_created: usize,
    /// Currently checked out
    pub active_count: usize,
    /// Idle instances across all owners
    pub available_count: usize,
    /// Total successful checkouts
    pub total_checkouts: usize,
    /// Share of checkouts served without construction
    pub reuse_rate: f64,
}

/// Instance checked out of a [`ResourcePool`]
///
/// Carries the owner it was checked out by; it is returned to that owner's
/// stack regardless of which thread calls [`ResourcePool::checkin`].
#[derive(Debug)]
pub struct PooledResource<T> {
    owner: ThreadId,
    instance: T,
}

impl<T> PooledResource<T> {
    /// Owning thread
    #[inline]
    #[must_use]
    pub fn owner(&self) -> ThreadId {
        self.owner
    }
}

impl<T> Deref for PooledResource<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.instance
    }
}

impl<T> DerefMut for PooledResource<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.instance
    }
}

/// Lazily-populated per-thread object pool
pub struct ResourcePool<T> {
    name: String,
    factory: Factory<T>,
    idle: Mutex<HashMap<ThreadId, Vec<T>>>,
    created: AtomicUsize,
    checkouts: AtomicUsize,
    active: AtomicUsize,
}

impl<T: Send> fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<T: Send> ResourcePool<T> {
    /// Create pool building instances with `factory`
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Box::new(factory),
            idle: Mutex::new(HashMap::new()),
            created: AtomicUsize::new(0),
            checkouts: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
        }
    }

    /// Pool name used in logs
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take an instance for the calling thread
    ///
    /// Construction happens outside the pool lock.
    ///
    /// # Errors
    /// `PoolError::Construction` if the factory fails
    pub fn checkout(&self) -> Result<PooledResource<T>, PoolError> {
        let owner = thread::current().id();
        let reused = self.idle.lock().get_mut(&owner).and_then(Vec::pop);

        let instance = if let Some(instance) = reused {
            instance
        } else {
            let instance = (self.factory)().map_err(PoolError::Construction)?;
            let created = self.created.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(pool = %self.name, ?owner, created, "constructed pooled resource");
            instance
        };

        self.checkouts.fetch_add(1, Ordering::Relaxed);
        self.active.fetch_add(1, Ordering::Relaxed);
        Ok(PooledResource { owner, instance })
    }

    /// Return an instance to its owner's stack
    pub fn checkin(&self, resource: PooledResource<T>) {
        let PooledResource { owner, instance } = resource;
        self.idle.lock().entry(owner).or_default().push(instance);
        self.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Checkout that returns itself on drop
    ///
    /// # Errors
    /// `PoolError::Construction` if the factory fails
    pub fn guard(&self) -> Result<PoolGuard<'_, T>, PoolError> {
        Ok(PoolGuard {
            pool: self,
            resource: Some(self.checkout()?),
        })
    }

    /// Drop every idle instance, including those left by exited threads
    ///
    /// Checked-out instances are unaffected.
    pub fn clear(&self) {
        let dropped: usize = self.idle.lock().drain().map(|(_, v)| v.len()).sum();
        debug!(pool = %self.name, dropped, "cleared resource pool");
    }

    /// Current counters
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> PoolStats {
        let total_created = self.created.load(Ordering::Relaxed);
        let total_checkouts = self.checkouts.load(Ordering::Relaxed);
        let reuse_rate = if total_checkouts == 0 {
            0.0
        } else {
            total_checkouts.saturating_sub(total_created) as f64 / total_checkouts as f64
        };
        PoolStats {
            total_created,
            active_count: self.active.load(Ordering::Relaxed),
            available_count: self.idle.lock().values().map(Vec::len).sum(),
            total_checkouts,
            reuse_rate,
        }
    }
}

/// RAII checkout from [`ResourcePool::guard`]
pub struct PoolGuard<'a, T: Send> {
    pool: &'a ResourcePool<T>,
    resource: Option<PooledResource<T>>,
}

impl<T: Send> Deref for PoolGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `Drop` takes the resource out.
        match &self.resource {
            Some(r) => &r.instance,
            None => unreachable!("pool guard used after drop"),
        }
    }
}

impl<T: Send> DerefMut for PoolGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.resource {
            Some(r) => &mut r.instance,
            None => unreachable!("pool guard used after drop"),
        }
    }
}

impl<T: Send> Drop for PoolGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.checkin(resource);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn counting_pool() -> (ResourcePool<Vec<u32>>, Arc<AtomicUsize>) {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let pool = ResourcePool::new("test", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        });
        (pool, built)
    }

    #[test]
    fn sequential_checkouts_reuse_one_instance() {
        let (pool, built) = counting_pool();
        for i in 0..10 {
            let mut r = pool.checkout().unwrap();
            r.push(i);
            pool.checkin(r);
        }
        assert_eq!(built.load(Ordering::SeqCst), 1);

        let stats = pool.stats();
        assert_eq!(stats.total_checkouts, 10);
        assert_eq!(stats.available_count, 1);
        assert_eq!(stats.active_count, 0);
        assert!((stats.reuse_rate - 0.9).abs() < 1e-12);
    }

    #[test]
    fn nested_checkout_builds_second_instance() {
        let (pool, built) = counting_pool();
        let a = pool.checkout().unwrap();
        let b = pool.checkout().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
        pool.checkin(a);
        pool.checkin(b);
        assert_eq!(pool.stats().available_count, 2);
    }

    #[test]
    fn guard_returns_on_drop() {
        let (pool, _) = counting_pool();
        {
            let mut g = pool.guard().unwrap();
            g.push(1);
            assert_eq!(pool.stats().active_count, 1);
        }
        assert_eq!(pool.stats().active_count, 0);
        assert_eq!(pool.stats().available_count, 1);
    }

    #[test]
    fn clear_drops_idle_instances() {
        let (pool, built) = counting_pool();
        let r = pool.checkout().unwrap();
        pool.checkin(r);
        pool.clear();
        assert_eq!(pool.stats().available_count, 0);
        drop(pool.checkout().unwrap());
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn exited_threads_leave_stacks_until_clear() {
        let (pool, built) = counting_pool();
        for _ in 0..2 {
            thread::scope(|scope| {
                scope.spawn(|| {
                    let r = pool.checkout().unwrap();
                    pool.checkin(r);
                });
            });
        }
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(pool.stats().available_count, 2);

        drop(pool.guard().unwrap());
        assert_eq!(built.load(Ordering::SeqCst), 3);

        pool.clear();
        assert_eq!(pool.stats().available_count, 0);
    }

    #[test]
    fn factory_failure_is_reported() {
        let pool: ResourcePool<u8> = ResourcePool::new("broken", || Err("no reference model".into()));
        let err = pool.checkout().unwrap_err();
        assert!(err.to_string().contains("no reference model"));
        assert_eq!(pool.stats().active_count, 0);
    }
}
