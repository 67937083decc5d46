//! Concrete accumulators
//!
//! All three keep one row per branch index behind a single lock and reduce
//! through the [`FractileEngine`](lte_stats::FractileEngine) on finalize:
//! - [`CurveEnsemble`]: grouped curves (optionally forecast based)
//! - [`ScalarEnsemble`]: named scalars with a fixed key set
//! - [`ComparisonEnsemble`]: comparison against a pooled reference model

mod comparison;
mod table;
mod curve;
mod scalar;

pub use comparison::ComparisonEnsemble;
pub use curve::CurveEnsemble;
pub use scalar::ScalarEnsemble;
