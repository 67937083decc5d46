//! Serializable result of one worker's dispatch pass

use crate::error::ClusterError;
use chrono::{DateTime, Utc};
use lte_compute::{AccumulatorSet, RunContext, StateEnvelope, TimesSnapshot};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Everything the coordinator needs from one worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Run the worker took part in
    pub run_id: Ulid,
    /// Worker rank
    pub rank: usize,
    /// Worker count the run was launched with
    pub size: usize,
    /// Branch indices processed, ascending
    pub branches: Vec<usize>,
    /// One envelope per accumulator, in registration order; empty for an idle worker
    pub envelopes: Vec<StateEnvelope>,
    /// Compute times on this worker
    pub times: TimesSnapshot,
    /// When the report was collected
    pub completed_at: DateTime<Utc>,
}

impl WorkerReport {
    /// Export the state of every accumulator after a dispatch pass over `branches`
    ///
    /// # Errors
    /// `ClusterError::Export` if an accumulator cannot serialize its state
    pub fn collect<R, F>(
        ctx: &RunContext,
        branches: &[usize],
        accumulators: &AccumulatorSet<R, F>,
    ) -> Result<Self, ClusterError> {
        let envelopes = if branches.is_empty() {
            Vec::new()
        } else {
            accumulators
                .iter()
                .map(|acc| acc.export_state())
                .collect::<Result<Vec<_>, _>>()?
        };
        let mut branches = branches.to_vec();
        branches.sort_unstable();

        let worker = ctx.worker();
        Ok(Self {
            run_id: ctx.run_id(),
            rank: worker.rank,
            size: worker.size,
            branches,
            envelopes,
            times: ctx.times().snapshot(),
            completed_at: Utc::now(),
        })
    }

    /// True if the worker processed nothing
    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.branches.is_empty()
    }

    /// Accumulator names in envelope order
    #[must_use]
    pub fn accumulator_names(&self) -> Vec<String> {
        self.envelopes.iter().map(|e| e.accumulator.clone()).collect()
    }
}
