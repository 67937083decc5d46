//! Accumulator plugin contract
//!
//! Lifecycle of one accumulator instance:
//! 1. `consume` once per branch, concurrently, in no particular order
//! 2. `flush` once after the local dispatch pass
//! 3. `combine_with` zero or more times (distributed tier only)
//! 4. `finalize` exactly once
//!
//! Accumulation must be commutative and associative so that partial results
//! from independent workers merge into the same state a single pass over the
//! union of their branches would produce.

use crate::error::{AccumulatorError, MergeError};
use crate::forecast::ForecastOptions;
use lte_branch::WeightedBranch;
use lte_stats::SummaryCurve;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything an accumulator sees for one branch
#[derive(Debug)]
pub struct BranchInput<'a, R, F = ()> {
    /// Branch index within the run's branch set
    pub index: usize,
    /// Branch identity and weight
    pub branch: &'a WeightedBranch,
    /// Materialized result
    pub result: &'a R,
    /// Derived forecast, present only if the accumulator requested one
    pub forecast: Option<&'a F>,
}

/// Serializable accumulator state exchanged between workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEnvelope {
    /// Accumulator name
    pub accumulator: String,
    /// Accumulator kind (state layout)
    pub kind: String,
    /// Branch indices carried, ascending
    pub branches: Vec<usize>,
    /// Weight of each carried branch, parallel to `branches`
    pub weights: Vec<f64>,
    /// Plugin-defined payload
    pub state: serde_json::Value,
}

impl StateEnvelope {
    /// True if the envelope carries no branches
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

/// Finalized accumulator output: one summary per group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorOutput {
    /// Accumulator name
    pub accumulator: String,
    /// Number of branches reduced
    pub branch_count: usize,
    /// Summary per group key (e.g. region, fault model, statistic)
    pub summaries: BTreeMap<String, SummaryCurve>,
}

impl AccumulatorOutput {
    /// Summary for one group
    #[inline]
    #[must_use]
    pub fn summary(&self, group: &str) -> Option<&SummaryCurve> {
        self.summaries.get(group)
    }
}

/// Unit of work fed every branch of a run
///
/// Implementations guard their state internally (a single coarse lock is
/// enough); all methods take `&self` so one instance can be shared by every
/// worker thread.
pub trait Accumulator<R, F = ()>: Send + Sync {
    /// Unique name within a run (used in logs, timings and envelopes)
    fn name(&self) -> &str;

    /// Forecast configuration, if this accumulator needs a derived forecast
    fn forecast_options(&self) -> Option<ForecastOptions> {
        None
    }

    /// Fold one branch into the state
    ///
    /// # Errors
    /// Any failure; fatal to the run
    fn consume(&self, input: &BranchInput<'_, R, F>) -> Result<(), AccumulatorError>;

    /// Release resources held for the dispatch pass
    fn flush(&self) {}

    /// Snapshot state for transfer to a coordinator
    ///
    /// # Errors
    /// `AccumulatorError::Serialization` if the state does not serialize
    fn export_state(&self) -> Result<StateEnvelope, AccumulatorError>;

    /// Merge partial results from other instances
    ///
    /// Either every envelope is merged or the state is left unchanged.
    ///
    /// # Errors
    /// Any [`MergeError`]; fatal to the run
    fn combine_with(&self, others: &[StateEnvelope]) -> Result<(), MergeError>;

    /// Run every check `combine_with` would run, without changing state
    ///
    /// # Errors
    /// The [`MergeError`] `combine_with` would return
    fn check_combine(&self, others: &[StateEnvelope]) -> Result<(), MergeError>;

    /// Reduce accumulated state to the final output
    ///
    /// # Errors
    /// Reduction failures or a second call
    fn finalize(&self) -> Result<(), AccumulatorError>;

    /// True once `finalize` succeeded
    fn is_finalized(&self) -> bool;

    /// Branch indices consumed or merged so far, ascending
    fn branches_consumed(&self) -> Vec<usize>;

    /// Output, available after `finalize`
    fn output(&self) -> Option<AccumulatorOutput>;
}
