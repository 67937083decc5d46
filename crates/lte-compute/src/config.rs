//! Run configuration
//!
//! Resolved by the launcher (usually from a TOML file) and handed to the
//! dispatcher as plain values.

use crate::context::WorkerTopology;
use lte_branch::{BranchError, BranchFilter, BranchSet, UniformWeights};
use lte_stats::{FractileEngine, FractileError, DEFAULT_FRACTILES};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::thread;

/// Which branches of the full set take part in a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchSelection {
    /// Identifier patterns that must all match
    pub include: Vec<String>,
    /// Identifier patterns that exclude a branch
    pub exclude: Vec<String>,
    /// Reproducible random subset size
    pub sample: Option<usize>,
    /// Seed for `sample`
    pub seed: u64,
    /// Replace every weight with 1
    pub uniform_weights: bool,
}

impl BranchSelection {
    /// Apply filters, then sampling, then reweighting
    ///
    /// # Errors
    /// Invalid patterns, empty results or oversized samples
    pub fn apply(&self, branches: &BranchSet) -> Result<BranchSet, BranchError> {
        let mut filter = BranchFilter::new();
        for pattern in &self.include {
            filter = filter.include(pattern)?;
        }
        for pattern in &self.exclude {
            filter = filter.exclude(pattern)?;
        }

        let mut selected = if filter.is_empty() {
            branches.clone()
        } else {
            branches.filtered(&filter)?
        };
        if let Some(count) = self.sample {
            selected = selected.random_sample(count, self.seed)?;
        }
        if self.uniform_weights {
            selected = selected.reweighted(&UniformWeights)?;
        }
        Ok(selected)
    }
}

/// Resolved run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Worker threads per process (`None` = half the hardware threads)
    pub threads: Option<usize>,
    /// Fractiles reported by every accumulator, as fractions in `[0, 1]`
    pub fractiles: Vec<f64>,
    /// This process's place among distributed workers
    pub topology: WorkerTopology,
    /// Branch selection
    pub selection: BranchSelection,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            threads: None,
            fractiles: DEFAULT_FRACTILES.to_vec(),
            topology: WorkerTopology::SINGLE,
            selection: BranchSelection::default(),
        }
    }
}

impl RunConfig {
    /// With explicit thread count
    #[inline]
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// With fractiles
    #[inline]
    #[must_use]
    pub fn with_fractiles(mut self, fractiles: Vec<f64>) -> Self {
        self.fractiles = fractiles;
        self
    }

    /// With worker topology
    #[inline]
    #[must_use]
    pub fn with_topology(mut self, topology: WorkerTopology) -> Self {
        self.topology = topology;
        self
    }

    /// With branch selection
    #[inline]
    #[must_use]
    pub fn with_selection(mut self, selection: BranchSelection) -> Self {
        self.selection = selection;
        self
    }

    /// Thread count after applying the default
    #[must_use]
    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(default_threads)
    }

    /// Fractile engine for the configured fractiles
    ///
    /// # Errors
    /// `FractileError::InvalidFraction` for a fraction outside `[0, 1]`
    pub fn fractile_engine(&self) -> Result<FractileEngine, FractileError> {
        FractileEngine::new(self.fractiles.clone())
    }
}

/// Half the available hardware parallelism, at least 1
#[must_use]
pub fn default_threads() -> usize {
    let available = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    (available / 2).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lte_branch::WeightedBranch;

    fn branches() -> BranchSet {
        BranchSet::new(
            ["FM3_1_ABM", "FM3_1_GEOL", "FM3_2_ABM", "FM3_2_GEOL"]
                .iter()
                .map(|id| WeightedBranch::new(id, 0.25).unwrap())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn default_threads_at_least_one() {
        assert!(default_threads() >= 1);
        assert_eq!(RunConfig::default().with_threads(3).effective_threads(), 3);
    }

    #[test]
    fn selection_filters_samples_and_reweights() {
        let selection = BranchSelection {
            include: vec!["FM3_1".into()],
            uniform_weights: true,
            ..BranchSelection::default()
        };
        let selected = selection.apply(&branches()).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected.total_weight(), 2.0);

        let sampled = BranchSelection {
            sample: Some(3),
            seed: 7,
            ..BranchSelection::default()
        }
        .apply(&branches())
        .unwrap();
        assert_eq!(sampled.len(), 3);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: RunConfig = serde_json::from_str(
            r#"{"threads":4,"fractiles":[0.5],"topology":{"rank":1,"size":2}}"#,
        )
        .unwrap();
        assert_eq!(config.threads, Some(4));
        assert_eq!(config.fractiles, vec![0.5]);
        assert_eq!(config.topology, WorkerTopology { rank: 1, size: 2 });
        assert!(config.fractile_engine().is_ok());
        assert_eq!(config.selection, BranchSelection::default());
    }
}
