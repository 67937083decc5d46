//! Per-branch comparison against an expensive reference model

use super::table::EnsembleCore;
use crate::accumulator::{Accumulator, AccumulatorOutput, BranchInput, StateEnvelope};
use crate::error::{AccumulatorError, MergeError};
use lte_cache::{BoxError, ResourcePool};
use lte_stats::{Curve, FractileEngine};
use std::collections::BTreeMap;
use tracing::info;

type Comparator<R, F, M> =
    Box<dyn Fn(&BranchInput<'_, R, F>, &mut M) -> Result<f64, BoxError> + Send + Sync>;

/// Compares every branch with a pooled reference model
///
/// The reference model `M` is costly to build, so each worker thread checks
/// one out of a [`ResourcePool`], uses it for a single comparison and returns
/// it. The comparator may mutate the model (e.g. to reset internal buffers);
/// no two threads ever hold the same instance.
///
/// Finalize reduces the per-branch comparison values into one summary
/// labelled with the accumulator name.
pub struct ComparisonEnsemble<R, F, M> {
    core: EnsembleCore<f64>,
    engine: FractileEngine,
    pool: ResourcePool<M>,
    compare: Comparator<R, F, M>,
}

impl<R, F, M: Send> ComparisonEnsemble<R, F, M> {
    /// State layout identifier
    pub const KIND: &'static str = "comparison_ensemble";

    /// Create accumulator comparing branches against models from `pool`
    pub fn new<C>(name: impl Into<String>, engine: FractileEngine, pool: ResourcePool<M>, compare: C) -> Self
    where
        C: Fn(&BranchInput<'_, R, F>, &mut M) -> Result<f64, BoxError> + Send + Sync + 'static,
    {
        Self {
            core: EnsembleCore::new(name.into(), Self::KIND),
            engine,
            pool,
            compare: Box::new(compare),
        }
    }

    /// Reference model pool
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &ResourcePool<M> {
        &self.pool
    }
}

impl<R, F, M: Send> std::fmt::Debug for ComparisonEnsemble<R, F, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComparisonEnsemble")
            .field("name", &self.core.name())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl<R, F, M> Accumulator<R, F> for ComparisonEnsemble<R, F, M>
where
    R: Send + Sync,
    F: Send + Sync,
    M: Send,
{
    fn name(&self) -> &str {
        self.core.name()
    }

    fn consume(&self, input: &BranchInput<'_, R, F>) -> Result<(), AccumulatorError> {
        let name = self.core.name();
        let mut model = self.pool.checkout().map_err(|source| AccumulatorError::Pool {
            accumulator: name.to_string(),
            source,
        })?;
        let compared = (self.compare)(input, &mut *model);
        // Returned on both paths; a failed comparison leaves the model usable.
        self.pool.checkin(model);

        let value = compared.map_err(|source| AccumulatorError::Extraction {
            accumulator: name.to_string(),
            branch_index: input.index,
            source,
        })?;
        self.core
            .record(input.index, input.branch.weight(), value, |_, _| Ok(()))
    }

    fn flush(&self) {
        let stats = self.pool.stats();
        info!(
            accumulator = self.core.name(),
            created = stats.total_created,
            reuse_rate = stats.reuse_rate,
            "releasing reference models"
        );
        self.pool.clear();
    }

    fn export_state(&self) -> Result<StateEnvelope, AccumulatorError> {
        self.core.export()
    }

    fn combine_with(&self, others: &[StateEnvelope]) -> Result<(), MergeError> {
        self.core.absorb(others, |_, _| Ok(()))
    }

    fn check_combine(&self, others: &[StateEnvelope]) -> Result<(), MergeError> {
        self.core.check_absorb(others, |_, _| Ok(()))
    }

    fn finalize(&self) -> Result<(), AccumulatorError> {
        self.core.finalize_with(|name, table| {
            let mut summaries = BTreeMap::new();
            if table.is_empty() {
                return Ok(summaries);
            }
            let reduction = |source| AccumulatorError::Reduction {
                accumulator: name.to_string(),
                group: name.to_string(),
                source,
            };
            let curves = table
                .values()
                .map(|row| Curve::scalar(row.value))
                .collect::<Result<Vec<_>, _>>()
                .map_err(reduction)?;
            let weights: Vec<f64> = table.values().map(|row| row.weight).collect();
            let summary = self
                .engine
                .reduce(&curves, &weights, name)
                .map_err(reduction)?;
            summaries.insert(name.to_string(), summary);
            Ok(summaries)
        })
    }

    fn is_finalized(&self) -> bool {
        self.core.is_finalized()
    }

    fn branches_consumed(&self) -> Vec<usize> {
        self.core.branches()
    }

    fn output(&self) -> Option<AccumulatorOutput> {
        self.core.output()
    }
}
