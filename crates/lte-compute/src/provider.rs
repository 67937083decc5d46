//! Branch materialization collaborator

use lte_branch::WeightedBranch;
use lte_cache::BoxError;

/// Produces the expensive per-branch artifact accumulators consume
///
/// Called concurrently for different branches; may block on I/O.
pub trait BranchProvider: Send + Sync {
    /// Materialized result type
    type Output: Send + Sync;

    /// Build the result for branch `index`
    ///
    /// # Errors
    /// Any failure; fatal to the run
    fn materialize(&self, index: usize, branch: &WeightedBranch) -> Result<Self::Output, BoxError>;
}

impl<P: BranchProvider + ?Sized> BranchProvider for &P {
    type Output = P::Output;

    fn materialize(&self, index: usize, branch: &WeightedBranch) -> Result<Self::Output, BoxError> {
        (**self).materialize(index, branch)
    }
}
