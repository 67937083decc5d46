//! Branch weighting schemes

use crate::branch::BranchId;
use std::collections::HashMap;

/// Assigns a relative weight to a branch
///
/// Implementations must be deterministic: the same identifier always maps
/// to the same weight for the duration of a run.
pub trait BranchWeightProvider: Send + Sync {
    /// Weight for `branch`
    fn weight(&self, branch: &BranchId) -> f64;
}

/// Every branch gets weight 1
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformWeights;

impl BranchWeightProvider for UniformWeights {
    fn weight(&self, _branch: &BranchId) -> f64 {
        1.0
    }
}

/// Explicit identifier → weight table with a fallback
#[derive(Debug, Clone, Default)]
pub struct TableWeights {
    table: HashMap<String, f64>,
    default_weight: f64,
}

impl TableWeights {
    /// Create empty table; unknown branches get `default_weight`
    #[inline]
    #[must_use]
    pub fn new(default_weight: f64) -> Self {
        Self {
            table: HashMap::new(),
            default_weight,
        }
    }

    /// With weight for one identifier
    #[must_use]
    pub fn with(mut self, id: impl Into<String>, weight: f64) -> Self {
        self.table.insert(id.into(), weight);
        self
    }

    /// Number of explicit entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True if no explicit entries exist
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl BranchWeightProvider for TableWeights {
    fn weight(&self, branch: &BranchId) -> f64 {
        self.table
            .get(branch.as_str())
            .copied()
            .unwrap_or(self.default_weight)
    }
}
