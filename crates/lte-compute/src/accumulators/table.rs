//! Branch-indexed state shared by the concrete accumulators
//!
//! Rows are keyed by branch index, so the accumulated state is identical for
//! any completion order, thread count or worker split.

use crate::accumulator::{AccumulatorOutput, StateEnvelope};
use crate::error::{AccumulatorError, MergeError};
use lte_stats::SummaryCurve;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One branch's contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct BranchRow<T> {
    pub(crate) weight: f64,
    pub(crate) value: T,
}

pub(crate) type BranchTable<T> = BTreeMap<usize, BranchRow<T>>;

#[derive(Debug)]
struct CoreState<T> {
    table: BranchTable<T>,
    output: Option<AccumulatorOutput>,
}

/// Coarse-locked branch table plus finalize-once output slot
#[derive(Debug)]
pub(crate) struct EnsembleCore<T> {
    name: String,
    kind: &'static str,
    state: Mutex<CoreState<T>>,
}

impl<T> EnsembleCore<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    pub(crate) fn new(name: String, kind: &'static str) -> Self {
        Self {
            name,
            kind,
            state: Mutex::new(CoreState {
                table: BTreeMap::new(),
                output: None,
            }),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Insert one row after `check` approved it against the current table
    pub(crate) fn record<C>(
        &self,
        index: usize,
        weight: f64,
        value: T,
        check: C,
    ) -> Result<(), AccumulatorError>
    where
        C: FnOnce(&BranchTable<T>, &T) -> Result<(), AccumulatorError>,
    {
        let mut state = self.state.lock();
        if state.output.is_some() {
            return Err(AccumulatorError::AlreadyFinalized {
                accumulator: self.name.clone(),
            });
        }
        if state.table.contains_key(&index) {
            return Err(AccumulatorError::DuplicateBranch {
                accumulator: self.name.clone(),
                branch_index: index,
            });
        }
        check(&state.table, &value)?;
        state.table.insert(index, BranchRow { weight, value });
        Ok(())
    }

    pub(crate) fn export(&self) -> Result<StateEnvelope, AccumulatorError> {
        let state = self.state.lock();
        let payload =
            serde_json::to_value(&state.table).map_err(|source| AccumulatorError::Serialization {
                accumulator: self.name.clone(),
                source,
            })?;
        Ok(StateEnvelope {
            accumulator: self.name.clone(),
            kind: self.kind.to_string(),
            branches: state.table.keys().copied().collect(),
            weights: state.table.values().map(|row| row.weight).collect(),
            state: payload,
        })
    }

    /// Merge envelopes into a copy of the table, then swap it in
    ///
    /// `check` sees the merged table and may reject inconsistent layouts.
    pub(crate) fn absorb<C>(&self, others: &[StateEnvelope], check: C) -> Result<(), MergeError>
    where
        C: Fn(&str, &BranchTable<T>) -> Result<(), MergeError>,
    {
        let mut state = self.state.lock();
        let merged = self.merged(&state, others, check)?;
        state.table = merged;
        Ok(())
    }

    /// Everything [`Self::absorb`] checks, leaving the table untouched
    pub(crate) fn check_absorb<C>(&self, others: &[StateEnvelope], check: C) -> Result<(), MergeError>
    where
        C: Fn(&str, &BranchTable<T>) -> Result<(), MergeError>,
    {
        let state = self.state.lock();
        self.merged(&state, others, check).map(|_| ())
    }

    fn merged<C>(&self, state: &CoreState<T>, others: &[StateEnvelope], check: C) -> Result<BranchTable<T>, MergeError>
    where
        C: Fn(&str, &BranchTable<T>) -> Result<(), MergeError>,
    {
        if state.output.is_some() {
            return Err(MergeError::AlreadyFinalized {
                accumulator: self.name.clone(),
            });
        }

        let mut merged = state.table.clone();
        for envelope in others {
            for (index, row) in self.decode(envelope)? {
                if merged.insert(index, row).is_some() {
                    return Err(MergeError::DuplicateBranch {
                        accumulator: self.name.clone(),
                        branch_index: index,
                    });
                }
            }
        }
        check(&self.name, &merged)?;
        Ok(merged)
    }

    /// Run `reduce` over the table once and store its summaries
    pub(crate) fn finalize_with<F>(&self, reduce: F) -> Result<(), AccumulatorError>
    where
        F: FnOnce(&str, &BranchTable<T>) -> Result<BTreeMap<String, SummaryCurve>, AccumulatorError>,
    {
        let mut state = self.state.lock();
        if state.output.is_some() {
            return Err(AccumulatorError::AlreadyFinalized {
                accumulator: self.name.clone(),
            });
        }
        let summaries = reduce(&self.name, &state.table)?;
        state.output = Some(AccumulatorOutput {
            accumulator: self.name.clone(),
            branch_count: state.table.len(),
            summaries,
        });
        Ok(())
    }

    pub(crate) fn is_finalized(&self) -> bool {
        self.state.lock().output.is_some()
    }

    pub(crate) fn branches(&self) -> Vec<usize> {
        self.state.lock().table.keys().copied().collect()
    }

    pub(crate) fn output(&self) -> Option<AccumulatorOutput> {
        self.state.lock().output.clone()
    }

    fn decode(&self, envelope: &StateEnvelope) -> Result<BranchTable<T>, MergeError> {
        if envelope.accumulator != self.name {
            return Err(MergeError::NameMismatch {
                expected: self.name.clone(),
                found: envelope.accumulator.clone(),
            });
        }
        if envelope.kind != self.kind {
            return Err(MergeError::KindMismatch {
                accumulator: self.name.clone(),
                expected: self.kind.to_string(),
                found: envelope.kind.clone(),
            });
        }
        let table: BranchTable<T> = serde_json::from_value(envelope.state.clone()).map_err(|source| {
            MergeError::MalformedState {
                accumulator: self.name.clone(),
                source,
            }
        })?;
        if table.len() != envelope.branches.len()
            || !envelope.branches.iter().all(|i| table.contains_key(i))
        {
            return Err(MergeError::BranchListMismatch {
                accumulator: self.name.clone(),
                listed: envelope.branches.len(),
                carried: table.len(),
            });
        }
        if envelope.weights.len() != envelope.branches.len() {
            return Err(MergeError::BranchListMismatch {
                accumulator: self.name.clone(),
                listed: envelope.branches.len(),
                carried: envelope.weights.len(),
            });
        }
        let differing = envelope
            .branches
            .iter()
            .zip(&envelope.weights)
            .find(|(i, w)| table.get(*i).is_some_and(|row| row.weight.to_bits() != w.to_bits()));
        if let Some((&branch_index, _)) = differing {
            return Err(MergeError::WeightMismatch {
                accumulator: self.name.clone(),
                branch_index,
            });
        }
        Ok(table)
    }
}
