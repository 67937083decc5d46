//! Immutable indexed branch list

use crate::branch::WeightedBranch;
use crate::error::BranchError;
use crate::filter::BranchFilter;
use crate::weights::BranchWeightProvider;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Index;
use std::sync::Arc;

/// The fixed branch list of one run
///
/// Insertion order defines the branch index used throughout dispatch,
/// logging and merging. The list is shared (`Arc`) and never mutated after
/// construction; every transformation returns a new set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<WeightedBranch>", into = "Vec<WeightedBranch>")]
pub struct BranchSet {
    branches: Arc<[WeightedBranch]>,
}

impl BranchSet {
    /// Create set from branches in index order
    ///
    /// # Errors
    /// - `BranchError::EmptySet` if `branches` is empty
    /// - `BranchError::DuplicateId` if two branches share an identifier
    pub fn new(branches: Vec<WeightedBranch>) -> Result<Self, BranchError> {
        if branches.is_empty() {
            return Err(BranchError::EmptySet);
        }

        let mut seen = HashSet::with_capacity(branches.len());
        for branch in &branches {
            if !seen.insert(branch.id().as_str()) {
                return Err(BranchError::DuplicateId(branch.id().to_string()));
            }
        }

        Ok(Self {
            branches: branches.into(),
        })
    }

    /// Number of branches
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Always false for a constructed set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Branch at `index`
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&WeightedBranch> {
        self.branches.get(index)
    }

    /// Iterate `(index, branch)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &WeightedBranch)> {
        self.branches.iter().enumerate()
    }

    /// Branches as a slice
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[WeightedBranch] {
        &self.branches
    }

    /// Sum of all weights
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.branches.iter().map(WeightedBranch::weight).sum()
    }

    /// Weight of branch `index` divided by the total weight
    ///
    /// Returns `None` for an unknown index or a zero total weight.
    #[must_use]
    pub fn normalized_weight(&self, index: usize) -> Option<f64> {
        let total = self.total_weight();
        if total <= 0.0 {
            return None;
        }
        self.get(index).map(|b| b.weight() / total)
    }

    /// Keep only branches accepted by `filter`
    ///
    /// # Errors
    /// `BranchError::FilteredToEmpty` if nothing survives
    pub fn filtered(&self, filter: &BranchFilter) -> Result<Self, BranchError> {
        let kept: Vec<WeightedBranch> = self
            .branches
            .iter()
            .filter(|b| filter.accepts(b.id()))
            .cloned()
            .collect();

        if kept.is_empty() {
            return Err(BranchError::FilteredToEmpty {
                original: self.len(),
            });
        }
        Self::new(kept)
    }

    /// Replace every weight with the one assigned by `provider`
    ///
    /// # Errors
    /// `BranchError::InvalidWeight` if the provider yields an invalid weight
    pub fn reweighted(&self, provider: &dyn BranchWeightProvider) -> Result<Self, BranchError> {
        let branches = self
            .branches
            .iter()
            .map(|b| WeightedBranch::with_id(b.id().clone(), provider.weight(b.id())))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(branches)
    }

    /// Reproducible random subset of `count` branches
    ///
    /// Selected branches keep their relative order, so the same seed always
    /// yields the same indexed set.
    ///
    /// # Errors
    /// `BranchError::SampleTooLarge` if `count` exceeds the set size
    pub fn random_sample(&self, count: usize, seed: u64) -> Result<Self, BranchError> {
        if count > self.len() {
            return Err(BranchError::SampleTooLarge {
                requested: count,
                available: self.len(),
            });
        }
        if count == 0 {
            return Err(BranchError::EmptySet);
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut picked = rand::seq::index::sample(&mut rng, self.len(), count).into_vec();
        picked.sort_unstable();

        Self::new(picked.into_iter().map(|i| self.branches[i].clone()).collect())
    }
}

impl Index<usize> for BranchSet {
    type Output = WeightedBranch;

    fn index(&self, index: usize) -> &Self::Output {
        &self.branches[index]
    }
}

impl TryFrom<Vec<WeightedBranch>> for BranchSet {
    type Error = BranchError;

    fn try_from(branches: Vec<WeightedBranch>) -> Result<Self, Self::Error> {
        Self::new(branches)
    }
}

impl From<BranchSet> for Vec<WeightedBranch> {
    fn from(set: BranchSet) -> Self {
        set.branches.to_vec()
    }
}
