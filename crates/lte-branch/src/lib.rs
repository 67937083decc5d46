//! LTE Branch - weighted logic-tree branches
//!
//! A run evaluates a fixed list of scenarios ("branches"), each carrying a
//! relative weight:
//! - [`WeightedBranch`]: opaque identifier plus non-negative weight
//! - [`BranchSet`]: immutable, indexed branch list (index = position)
//! - [`BranchWeightProvider`]: pluggable weighting schemes
//! - [`BranchFilter`]: include/exclude selection by identifier pattern
//!
//! # Example
//!
//! ```rust
//! use lte_branch::{BranchSet, WeightedBranch};
//!
//! let set = BranchSet::new(vec![
//!     WeightedBranch::new("FM3_1_ZENGBB", 0.25).unwrap(),
//!     WeightedBranch::new("FM3_2_ZENGBB", 0.75).unwrap(),
//! ])
//! .unwrap();
//!
//! assert_eq!(set.len(), 2);
//! assert!((set.total_weight() - 1.0).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod branch;
mod error;
mod filter;
mod set;
mod weights;

pub use branch::{BranchId, WeightedBranch};
pub use error::BranchError;
pub use filter::BranchFilter;
pub use set::BranchSet;
pub use weights::{BranchWeightProvider, TableWeights, UniformWeights};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
