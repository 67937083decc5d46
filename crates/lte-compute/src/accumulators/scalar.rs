//! Keyed scalar metrics (misfit tables, paleo rates, ...)

use super::table::{BranchTable, EnsembleCore};
use crate::accumulator::{Accumulator, AccumulatorOutput, BranchInput, StateEnvelope};
use crate::error::{AccumulatorError, MergeError};
use lte_cache::BoxError;
use lte_stats::{Curve, FractileEngine, SummaryCurve};
use std::collections::BTreeMap;

type ScalarExtractor<R, F> =
    Box<dyn Fn(&BranchInput<'_, R, F>) -> Result<BTreeMap<String, f64>, BoxError> + Send + Sync>;

/// Collects a fixed set of named scalars per branch
///
/// Every branch must report exactly the same keys; a branch or partial
/// result with a different key set is rejected with the first differing key.
pub struct ScalarEnsemble<R, F = ()> {
    core: EnsembleCore<BTreeMap<String, f64>>,
    engine: FractileEngine,
    extract: ScalarExtractor<R, F>,
}

impl<R, F> ScalarEnsemble<R, F> {
    /// State layout identifier
    pub const KIND: &'static str = "scalar_ensemble";

    /// Create accumulator; `extract` maps a branch to its named values
    pub fn new<E>(name: impl Into<String>, engine: FractileEngine, extract: E) -> Self
    where
        E: Fn(&BranchInput<'_, R, F>) -> Result<BTreeMap<String, f64>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            core: EnsembleCore::new(name.into(), Self::KIND),
            engine,
            extract: Box::new(extract),
        }
    }
}

impl<R, F> std::fmt::Debug for ScalarEnsemble<R, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarEnsemble")
            .field("name", &self.core.name())
            .finish_non_exhaustive()
    }
}

/// First key present in exactly one of the two maps
fn first_key_difference<'a>(
    a: &'a BTreeMap<String, f64>,
    b: &'a BTreeMap<String, f64>,
) -> Option<&'a str> {
    a.keys()
        .find(|k| !b.contains_key(*k))
        .or_else(|| b.keys().find(|k| !a.contains_key(*k)))
        .map(String::as_str)
}

fn check_table(name: &str, table: &BranchTable<BTreeMap<String, f64>>) -> Result<(), MergeError> {
    let mut rows = table.values();
    let Some(first) = rows.next() else {
        return Ok(());
    };
    for row in rows {
        if let Some(key) = first_key_difference(&first.value, &row.value) {
            return Err(MergeError::KeySetMismatch {
                accumulator: name.to_string(),
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

impl<R, F> Accumulator<R, F> for ScalarEnsemble<R, F>
where
    R: Send + Sync,
    F: Send + Sync,
{
    fn name(&self) -> &str {
        self.core.name()
    }

    fn consume(&self, input: &BranchInput<'_, R, F>) -> Result<(), AccumulatorError> {
        let name = self.core.name();
        let values = (self.extract)(input).map_err(|source| AccumulatorError::Extraction {
            accumulator: name.to_string(),
            branch_index: input.index,
            source,
        })?;

        self.core
            .record(input.index, input.branch.weight(), values, |table, values| {
                let Some(reference) = table.values().next() else {
                    return Ok(());
                };
                match first_key_difference(&reference.value, values) {
                    Some(key) => Err(AccumulatorError::KeySetMismatch {
                        accumulator: name.to_string(),
                        branch_index: input.index,
                        key: key.to_string(),
                    }),
                    None => Ok(()),
                }
            })
    }

    fn export_state(&self) -> Result<StateEnvelope, AccumulatorError> {
        self.core.export()
    }

    fn combine_with(&self, others: &[StateEnvelope]) -> Result<(), MergeError> {
        self.core.absorb(others, check_table)
    }

    fn check_combine(&self, others: &[StateEnvelope]) -> Result<(), MergeError> {
        self.core.check_absorb(others, check_table)
    }

    fn finalize(&self) -> Result<(), AccumulatorError> {
        self.core.finalize_with(|name, table| {
            let mut per_key: BTreeMap<&str, (Vec<Curve>, Vec<f64>)> = BTreeMap::new();
            for row in table.values() {
                for (key, value) in &row.value {
                    let reduction = |source| AccumulatorError::Reduction {
                        accumulator: name.to_string(),
                        group: key.clone(),
                        source,
                    };
                    let entry = per_key.entry(key.as_str()).or_default();
                    entry.0.push(Curve::scalar(*value).map_err(reduction)?);
                    entry.1.push(row.weight);
                }
            }

            per_key
                .into_iter()
                .map(|(key, (curves, weights))| {
                    self.engine
                        .reduce(&curves, &weights, key)
                        .map(|summary| (key.to_string(), summary))
                        .map_err(|source| AccumulatorError::Reduction {
                            accumulator: name.to_string(),
                            group: key.to_string(),
                            source,
                        })
                })
                .collect::<Result<BTreeMap<String, SummaryCurve>, _>>()
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
