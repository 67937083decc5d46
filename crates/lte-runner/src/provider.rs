//! Branch results and forecasts backed by the run configuration

use crate::config::BranchSpec;
use lte_branch::WeightedBranch;
use lte_cache::BoxError;
use lte_compute::{BranchProvider, ForecastBuilder, ForecastOptions};
use lte_stats::Curve;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Materialized results of one branch
#[derive(Debug, Clone, PartialEq)]
pub struct BranchData {
    /// Named scalars
    pub scalars: BTreeMap<String, f64>,
    /// Named curves
    pub curves: BTreeMap<String, Curve>,
}

/// Looks branch results up by branch id
#[derive(Debug, Default)]
pub struct TableProvider {
    by_id: HashMap<String, Arc<BranchData>>,
}

impl TableProvider {
    /// Index the configured branches
    #[must_use]
    pub fn new(branches: &[BranchSpec]) -> Self {
        let by_id = branches
            .iter()
            .map(|b| {
                let data = BranchData {
                    scalars: b.scalars.clone(),
                    curves: b.curves.clone(),
                };
                (b.id.trim().to_string(), Arc::new(data))
            })
            .collect();
        Self { by_id }
    }
}

impl BranchProvider for TableProvider {
    type Output = Arc<BranchData>;

    fn materialize(&self, _index: usize, branch: &WeightedBranch) -> Result<Arc<BranchData>, BoxError> {
        self.by_id
            .get(branch.id().as_str())
            .cloned()
            .ok_or_else(|| format!("no results configured for branch {}", branch.id()).into())
    }
}

/// Rate curves of one branch, viewed under a forecast configuration
#[derive(Debug, Clone)]
pub struct RateForecast {
    data: Arc<BranchData>,
    options: ForecastOptions,
}

impl RateForecast {
    /// Current configuration
    #[must_use]
    pub fn options(&self) -> &ForecastOptions {
        &self.options
    }

    /// Poisson probability of one or more events over the forecast duration, per curve point
    ///
    /// # Errors
    /// Unknown curve or invalid rates
    pub fn probabilities(&self, curve: &str) -> Result<Curve, BoxError> {
        let rates = self
            .data
            .curves
            .get(curve)
            .ok_or_else(|| format!("no rate curve '{curve}'"))?;
        let years = self.options.duration_years;
        let ys = rates.ys().iter().map(|rate| 1.0 - (-rate * years).exp()).collect();
        Ok(Curve::with_domain_of(rates, ys)?)
    }

    /// Curve names available for probabilities
    pub fn curve_names(&self) -> impl Iterator<Item = &str> {
        self.data.curves.keys().map(String::as_str)
    }
}

/// Wraps materialized rates in a [`RateForecast`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RateForecastBuilder;

impl ForecastBuilder<Arc<BranchData>> for RateForecastBuilder {
    type Forecast = RateForecast;

    fn build(&self, result: &Arc<BranchData>, options: &ForecastOptions) -> Result<RateForecast, BoxError> {
        if options.duration_years < 0.0 || !options.duration_years.is_finite() {
            return Err(format!("invalid forecast duration {}", options.duration_years).into());
        }
        Ok(RateForecast {
            data: Arc::clone(result),
            options: *options,
        })
    }

    fn configure(&self, forecast: &mut RateForecast, options: &ForecastOptions) -> Result<(), BoxError> {
        forecast.options = *options;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lte_compute::ProbabilityModel;

    fn spec() -> BranchSpec {
        BranchSpec {
            id: "FM3_1".into(),
            weight: 1.0,
            scalars: BTreeMap::new(),
            curves: BTreeMap::from([("mfd".to_string(), Curve::new(vec![6.0, 7.0], vec![0.1, 0.0]).unwrap())]),
        }
    }

    #[test]
    fn unknown_branch_is_an_error() {
        let provider = TableProvider::new(&[spec()]);
        let known = WeightedBranch::new("FM3_1", 1.0).unwrap();
        let unknown = WeightedBranch::new("FM3_2", 1.0).unwrap();
        assert!(provider.materialize(0, &known).is_ok());
        assert!(provider.materialize(1, &unknown).is_err());
    }

    #[test]
    fn reconfigure_changes_probabilities() {
        let data = Arc::new(BranchData {
            scalars: BTreeMap::new(),
            curves: spec().curves,
        });
        let builder = RateForecastBuilder;
        let mut forecast = builder.build(&data, &ForecastOptions::default()).unwrap();
        let thirty = forecast.probabilities("mfd").unwrap();
        assert!((thirty.ys()[0] - (1.0 - (-3.0f64).exp())).abs() < 1e-12);
        assert_eq!(thirty.ys()[1], 0.0);

        let renewal = ForecastOptions::default()
            .with_probability_model(ProbabilityModel::Bpt)
            .with_duration_years(5.0);
        builder.configure(&mut forecast, &renewal).unwrap();
        assert_eq!(forecast.options().probability_model, ProbabilityModel::Bpt);
        assert!(forecast.probabilities("mfd").unwrap().ys()[0] < thirty.ys()[0]);
        assert!(forecast.probabilities("missing").is_err());
    }
}
