//! LTE Cache - shared side products of branch computation
//!
//! - [`KeyedMemoCache`]: concurrent write-once map; racing misses may compute
//!   redundantly, the first stored value wins
//! - [`ContainmentCache`] / [`NodeFractionCache`]: typed caches keyed by
//!   [`ModelKey`]
//! - [`ResourcePool`]: per-thread checkout/return pool for expensive instances
//!
//! The cache and the pool lock independently, so contention on one never
//! serializes the other.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod memo;
mod pool;
mod typed;

pub use error::{BoxError, PoolError};
pub use memo::{CacheStats, KeyedMemoCache};
pub use pool::{PoolGuard, PoolStats, PooledResource, ResourcePool};
pub use typed::{ContainmentCache, ModelKey, NodeFraction, NodeFractionCache};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
