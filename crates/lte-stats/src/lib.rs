//! LTE Stats - weighted ensemble statistics
//!
//! Reduces a weighted set of sampled curves into summary curves:
//! - weighted mean
//! - pointwise min / max envelopes (weight ignored)
//! - weighted fractiles (stable sort, cumulative weight walk)
//!
//! # Example
//!
//! ```rust
//! use lte_stats::{reduce, Curve};
//!
//! let curves: Vec<Curve> = [1.0, 2.0, 3.0, 4.0]
//!     .into_iter()
//!     .map(|y| Curve::scalar(y).unwrap())
//!     .collect();
//! let summary = reduce(&curves, &[0.1, 0.2, 0.3, 0.4], "Total", &[0.5]).unwrap();
//!
//! assert!((summary.mean().ys()[0] - 3.0).abs() < 1e-12);
//! assert_eq!(summary.fractile(0.5).unwrap().ys()[0], 3.0);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod curve;
mod distribution;
mod error;
mod fractile;
mod summary;
mod tracker;

pub use curve::{Curve, WeightedCurveSet};
pub use distribution::WeightedDistribution;
pub use error::FractileError;
pub use fractile::{reduce, FractileEngine, DEFAULT_FRACTILES};
pub use summary::{LabeledCurve, StatKind, SummaryCurve};
pub use tracker::MinMaxAveTracker;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
