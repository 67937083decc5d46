//! Accumulators built from [`AccumulatorSpec`] entries

use crate::config::AccumulatorSpec;
use crate::provider::{BranchData, RateForecast};
use lte_cache::{BoxError, ResourcePool};
use lte_compute::{Accumulator, ComparisonEnsemble, CurveEnsemble, ScalarEnsemble};
use lte_stats::{Curve, FractileEngine};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Accumulator over configured branch data
pub type RunnerAccumulator = Box<dyn Accumulator<Arc<BranchData>, RateForecast>>;

/// Reference curve plus a scratch buffer reused across comparisons
#[derive(Debug)]
struct ReferenceModel {
    reference: Curve,
    scratch: Vec<f64>,
}

impl ReferenceModel {
    fn mean_abs_difference(&mut self, curve: &Curve) -> Result<f64, BoxError> {
        if !curve.same_domain(&self.reference) {
            return Err("curve and reference differ in domain".into());
        }
        self.scratch.clear();
        self.scratch
            .extend(curve.ys().iter().zip(self.reference.ys()).map(|(a, b)| (a - b).abs()));
        #[allow(clippy::cast_precision_loss)]
        let mean = self.scratch.iter().sum::<f64>() / self.scratch.len().max(1) as f64;
        Ok(mean)
    }
}

/// Build one accumulator per entry, in order
#[must_use]
pub fn build_accumulators(specs: &[AccumulatorSpec], engine: &FractileEngine) -> Vec<RunnerAccumulator> {
    specs.iter().map(|spec| build_one(spec, engine.clone())).collect()
}

fn build_one(spec: &AccumulatorSpec, engine: FractileEngine) -> RunnerAccumulator {
    match spec {
        AccumulatorSpec::Curves { name } => Box::new(
            CurveEnsemble::<Arc<BranchData>, RateForecast>::new(name.as_str(), engine, |input| {
                Ok(input.result.curves.clone())
            }),
        ),
        AccumulatorSpec::Scalars { name } => Box::new(
            ScalarEnsemble::<Arc<BranchData>, RateForecast>::new(name.as_str(), engine, |input| {
                Ok(input.result.scalars.clone())
            }),
        ),
        AccumulatorSpec::Probabilities { name, forecast } => Box::new(
            CurveEnsemble::<Arc<BranchData>, RateForecast>::new(name.as_str(), engine, |input| {
                let forecast = input.forecast.ok_or("forecast missing")?;
                let model = forecast.options().probability_model;
                forecast
                    .curve_names()
                    .map(|curve| -> Result<(String, Curve), BoxError> {
                        Ok((format!("{curve} {model}"), forecast.probabilities(curve)?))
                    })
                    .collect()
            })
            .with_forecast(*forecast),
        ),
        AccumulatorSpec::Comparison { name, curve, reference } => {
            let reference = reference.clone();
            let pool = ResourcePool::new(format!("{name} references"), move || {
                Ok(ReferenceModel {
                    reference: reference.clone(),
                    scratch: Vec::new(),
                })
            });
            let curve = curve.clone();
            Box::new(ComparisonEnsemble::<Arc<BranchData>, RateForecast, ReferenceModel>::new(
                name.as_str(),
                engine,
                pool,
                move |input, model: &mut ReferenceModel| {
                    let branch_curve = input
                        .result
                        .curves
                        .get(&curve)
                        .ok_or_else(|| format!("no curve '{curve}'"))?;
                    model.mean_abs_difference(branch_curve)
                },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lte_branch::WeightedBranch;
    use lte_compute::{BranchInput, ForecastBuilder, ForecastOptions};
    use crate::provider::RateForecastBuilder;

    fn data() -> Arc<BranchData> {
        Arc::new(BranchData {
            scalars: BTreeMap::from([("slip".to_string(), 1.5)]),
            curves: BTreeMap::from([("mfd".to_string(), Curve::new(vec![6.0, 7.0], vec![0.2, 0.1]).unwrap())]),
        })
    }

    #[test]
    fn comparison_measures_mean_distance() {
        let spec = AccumulatorSpec::Comparison {
            name: "Misfit".into(),
            curve: "mfd".into(),
            reference: Curve::new(vec![6.0, 7.0], vec![0.1, 0.1]).unwrap(),
        };
        let accs = build_accumulators(&[spec], &FractileEngine::new(vec![0.5]).unwrap());
        let branch = WeightedBranch::new("b0", 1.0).unwrap();
        let result = data();
        accs[0]
            .consume(&BranchInput {
                index: 0,
                branch: &branch,
                result: &result,
                forecast: None,
            })
            .unwrap();
        accs[0].finalize().unwrap();
        let output = accs[0].output().unwrap();
        let summary = output.summary("Misfit").unwrap();
        assert!((summary.mean().ys()[0] - 0.05).abs() < 1e-12);
    }

    #[test]
    fn probabilities_group_by_curve_and_model() {
        let options = ForecastOptions::default().with_duration_years(1.0);
        let spec = AccumulatorSpec::Probabilities {
            name: "Probabilities".into(),
            forecast: options,
        };
        let accs = build_accumulators(&[spec], &FractileEngine::default());
        assert_eq!(accs[0].forecast_options(), Some(options));

        let branch = WeightedBranch::new("b0", 1.0).unwrap();
        let result = data();
        let forecast = RateForecastBuilder.build(&result, &options).unwrap();
        accs[0]
            .consume(&BranchInput {
                index: 0,
                branch: &branch,
                result: &result,
                forecast: Some(&forecast),
            })
            .unwrap();
        accs[0].finalize().unwrap();
        assert!(accs[0].output().unwrap().summary("mfd poisson").is_some());
    }

    #[test]
    fn missing_forecast_is_rejected() {
        let spec = AccumulatorSpec::Probabilities {
            name: "Probabilities".into(),
            forecast: ForecastOptions::default(),
        };
        let accs = build_accumulators(&[spec], &FractileEngine::default());
        let branch = WeightedBranch::new("b0", 1.0).unwrap();
        let result = data();
        let err = accs[0]
            .consume(&BranchInput {
                index: 0,
                branch: &branch,
                result: &result,
                forecast: None,
            })
            .unwrap_err();
        assert!(err.to_string().contains("forecast missing"));
    }
}
