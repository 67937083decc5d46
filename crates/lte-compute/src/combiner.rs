//! Fan-in of partial accumulator states from distributed workers
//!
//! Runs once on the coordinating worker after every worker finished its own
//! dispatch pass over a disjoint branch subset. Workers that processed no
//! branches contribute empty envelopes, which are skipped.

use crate::accumulator::{Accumulator, AccumulatorOutput, StateEnvelope};
use crate::context::RunContext;
use crate::dispatcher::AccumulatorSet;
use crate::error::{DispatchError, EnsembleError, MergeError};
use crate::timing::TimesSnapshot;
use tracing::{debug, error, info};

/// Merges remote partial results into local accumulator instances
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributedCombiner;

impl DistributedCombiner {
    /// Create combiner
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Merge `remotes` into `local` and hand `local` back as the merged instance
    ///
    /// # Errors
    /// Any [`MergeError`]; `local` is left unchanged on failure
    pub fn combine<'a, R, F>(
        &self,
        local: &'a dyn Accumulator<R, F>,
        remotes: &[StateEnvelope],
    ) -> Result<&'a dyn Accumulator<R, F>, MergeError> {
        let non_empty: Vec<StateEnvelope> = remotes.iter().filter(|e| !e.is_empty()).cloned().collect();
        debug!(
            accumulator = local.name(),
            remotes = remotes.len(),
            skipped = remotes.len() - non_empty.len(),
            "combining partial states"
        );
        if !non_empty.is_empty() {
            local.combine_with(&non_empty).map_err(|err| {
                error!(accumulator = local.name(), "merge failed: {err}");
                err
            })?;
        }
        Ok(local)
    }

    /// Merge live instances (same process) into `local`
    ///
    /// # Errors
    /// Export or merge failures
    pub fn combine_instances<'a, R, F>(
        &self,
        local: &'a dyn Accumulator<R, F>,
        remotes: &[&dyn Accumulator<R, F>],
    ) -> Result<&'a dyn Accumulator<R, F>, EnsembleError> {
        let envelopes = remotes
            .iter()
            .map(|remote| remote.export_state())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.combine(local, &envelopes)?)
    }

    /// Merge one envelope list per remote worker into the matching local accumulators
    ///
    /// Each remote list must name the local accumulators in order. A worker
    /// that processed nothing may send an empty list. Every column is checked
    /// before the first one is merged, so on error no local has changed.
    ///
    /// # Errors
    /// `CountMismatch` / `NameMismatch`, then any per-accumulator [`MergeError`]
    pub fn combine_all<R, F>(
        &self,
        locals: &AccumulatorSet<R, F>,
        remotes: &[Vec<StateEnvelope>],
    ) -> Result<(), MergeError> {
        let contributing: Vec<&Vec<StateEnvelope>> = remotes.iter().filter(|set| !set.is_empty()).collect();
        for set in &contributing {
            if set.len() != locals.len() {
                return Err(MergeError::CountMismatch {
                    local: locals.len(),
                    remote: set.len(),
                });
            }
            for (local, envelope) in locals.iter().zip(set.iter()) {
                if envelope.accumulator != local.name() {
                    return Err(MergeError::NameMismatch {
                        expected: local.name().to_string(),
                        found: envelope.accumulator.clone(),
                    });
                }
            }
        }

        let columns: Vec<Vec<StateEnvelope>> = (0..locals.len())
            .map(|i| {
                contributing
                    .iter()
                    .map(|set| set[i].clone())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .collect();
        for (local, column) in locals.iter().zip(&columns) {
            local.check_combine(column).map_err(|err| {
                error!(accumulator = local.name(), "merge rejected: {err}");
                err
            })?;
        }
        for (local, column) in locals.iter().zip(&columns) {
            self.combine(local.as_ref(), column)?;
        }
        info!(
            accumulators = locals.len(),
            workers = contributing.len() + 1,
            "combined distributed results"
        );
        Ok(())
    }

    /// Fold remote compute times into `ctx`, then finalize every local accumulator once
    ///
    /// # Errors
    /// The first finalize failure
    pub fn finalize_all<R, F>(
        &self,
        locals: &AccumulatorSet<R, F>,
        remote_times: &[TimesSnapshot],
        ctx: &RunContext,
    ) -> Result<Vec<AccumulatorOutput>, EnsembleError> {
        for times in remote_times {
            ctx.times().merge(times);
        }

        let mut outputs = Vec::with_capacity(locals.len());
        for acc in locals {
            acc.finalize().map_err(|source| DispatchError::Finalize {
                accumulator: acc.name().to_string(),
                source,
            })?;
            if let Some(output) = acc.output() {
                outputs.push(output);
            }
        }
        info!("compute times:\n{}", ctx.times().snapshot().render());
        Ok(outputs)
    }

    /// [`Self::combine_all`] followed by [`Self::finalize_all`]
    ///
    /// # Errors
    /// Merge or finalize failures
    pub fn combine_and_finalize<R, F>(
        &self,
        locals: &AccumulatorSet<R, F>,
        remotes: &[Vec<StateEnvelope>],
        remote_times: &[TimesSnapshot],
        ctx: &RunContext,
    ) -> Result<Vec<AccumulatorOutput>, EnsembleError> {
        self.combine_all(locals, remotes)?;
        self.finalize_all(locals, remote_times, ctx)
    }
}
