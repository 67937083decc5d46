//! Grouped curve ensembles (regional MFDs, participation curves, ...)

use super::table::{BranchTable, EnsembleCore};
use crate::accumulator::{Accumulator, AccumulatorOutput, BranchInput, StateEnvelope};
use crate::error::{AccumulatorError, MergeError};
use crate::forecast::ForecastOptions;
use lte_cache::BoxError;
use lte_stats::{Curve, FractileEngine, SummaryCurve, WeightedCurveSet};
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

type CurveExtractor<R, F> =
    Box<dyn Fn(&BranchInput<'_, R, F>) -> Result<BTreeMap<String, Curve>, BoxError> + Send + Sync>;

/// Collects one curve per group per branch, reduced to fractiles per group
///
/// A branch may omit a group; that group's ensemble then has fewer members.
pub struct CurveEnsemble<R, F = ()> {
    core: EnsembleCore<BTreeMap<String, Curve>>,
    engine: FractileEngine,
    forecast: Option<ForecastOptions>,
    extract: CurveExtractor<R, F>,
}

impl<R, F> CurveEnsemble<R, F> {
    /// State layout identifier
    pub const KIND: &'static str = "curve_ensemble";

    /// Create accumulator; `extract` maps a branch to its curves per group
    pub fn new<E>(name: impl Into<String>, engine: FractileEngine, extract: E) -> Self
    where
        E: Fn(&BranchInput<'_, R, F>) -> Result<BTreeMap<String, Curve>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            core: EnsembleCore::new(name.into(), Self::KIND),
            engine,
            forecast: None,
            extract: Box::new(extract),
        }
    }

    /// Request a derived forecast configured with `options`
    #[must_use]
    pub fn with_forecast(mut self, options: ForecastOptions) -> Self {
        self.forecast = Some(options);
        self
    }
}

impl<R, F> std::fmt::Debug for CurveEnsemble<R, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurveEnsemble")
            .field("name", &self.core.name())
            .field("forecast", &self.forecast)
            .finish_non_exhaustive()
    }
}

impl<R, F> Accumulator<R, F> for CurveEnsemble<R, F>
where
    R: Send + Sync,
    F: Send + Sync,
{
    fn name(&self) -> &str {
        self.core.name()
    }

    fn forecast_options(&self) -> Option<ForecastOptions> {
        self.forecast
    }

    fn consume(&self, input: &BranchInput<'_, R, F>) -> Result<(), AccumulatorError> {
        // Extraction runs before the state lock is taken.
        let curves = (self.extract)(input).map_err(|source| AccumulatorError::Extraction {
            accumulator: self.core.name().to_string(),
            branch_index: input.index,
            source,
        })?;
        self.core
            .record(input.index, input.branch.weight(), curves, |_, _| Ok(()))
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
        let engine = &self.engine;
        self.core
            .finalize_with(|name, table| reduce_groups(name, engine, table))
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

/// Gather each group's curves in branch order and reduce groups in parallel
fn reduce_groups(
    name: &str,
    engine: &FractileEngine,
    table: &BranchTable<BTreeMap<String, Curve>>,
) -> Result<BTreeMap<String, SummaryCurve>, AccumulatorError> {
    let mut groups: BTreeMap<&str, WeightedCurveSet> = BTreeMap::new();
    for row in table.values() {
        for (group, curve) in &row.value {
            groups
                .entry(group.as_str())
                .or_default()
                .push(curve.clone(), row.weight)
                .map_err(|source| AccumulatorError::Reduction {
                    accumulator: name.to_string(),
                    group: group.clone(),
                    source,
                })?;
        }
    }
    debug!(accumulator = name, groups = groups.len(), branches = table.len(), "reducing curve groups");

    let reduced: Vec<(&str, Result<SummaryCurve, _>)> = groups
        .par_iter()
        .map(|(group, set)| (*group, engine.reduce_set(set, group)))
        .collect();

    reduced
        .into_iter()
        .map(|(group, result)| {
            result
                .map(|summary| (group.to_string(), summary))
                .map_err(|source| AccumulatorError::Reduction {
                    accumulator: name.to_string(),
                    group: group.to_string(),
                    source,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lte_branch::WeightedBranch;

    fn ensemble() -> CurveEnsemble<Vec<f64>> {
        CurveEnsemble::new("Regional MFDs", FractileEngine::new(vec![0.5]).unwrap(), |input: &BranchInput<'_, Vec<f64>>| {
            let mut out = BTreeMap::new();
            out.insert("All".to_string(), Curve::new(vec![6.0, 7.0], input.result.clone())?);
            Ok(out)
        })
    }

    fn feed(acc: &CurveEnsemble<Vec<f64>>, index: usize, weight: f64, ys: Vec<f64>) {
        let branch = WeightedBranch::new(format!("b{index}"), weight).unwrap();
        acc.consume(&BranchInput {
            index,
            branch: &branch,
            result: &ys,
            forecast: None,
        })
        .unwrap();
    }

    #[test]
    fn reduces_each_group() {
        let acc = ensemble();
        feed(&acc, 1, 3.0, vec![2.0, 0.2]);
        feed(&acc, 0, 1.0, vec![1.0, 0.1]);
        acc.finalize().unwrap();

        let output = acc.output().unwrap();
        assert_eq!(output.branch_count, 2);
        let all = output.summary("All").unwrap();
        assert_eq!(all.min().ys(), &[1.0, 0.1]);
        assert_eq!(all.fractile(0.5).unwrap().ys(), &[2.0, 0.2]);
        assert!((all.mean().ys()[0] - 1.75).abs() < 1e-12);
    }

    #[test]
    fn extraction_error_names_branch() {
        let acc = ensemble();
        let branch = WeightedBranch::new("bad", 1.0).unwrap();
        let err = acc
            .consume(&BranchInput {
                index: 4,
                branch: &branch,
                result: &vec![1.0],
                forecast: None,
            })
            .unwrap_err();
        assert!(matches!(err, AccumulatorError::Extraction { branch_index: 4, .. }));
    }

    #[test]
    fn empty_ensemble_finalizes_to_nothing() {
        let acc = ensemble();
        acc.finalize().unwrap();
        assert!(acc.output().unwrap().summaries.is_empty());
    }
}
