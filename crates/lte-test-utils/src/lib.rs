//! Testing utilities for LTE workspace
//!
//! Synthetic branch providers, a counting forecast builder and ready-made
//! accumulators over the synthetic result type.

#![allow(missing_docs)]

use lte_branch::{BranchSet, WeightedBranch};
use lte_cache::{BoxError, ResourcePool};
use lte_compute::{
    Accumulator, AccumulatorOutput, BranchProvider, ComparisonEnsemble, CurveEnsemble, ForecastBuilder,
    ForecastOptions, ScalarEnsemble,
};
use lte_stats::{Curve, FractileEngine};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Magnitude bins shared by every synthetic MFD
pub const MAG_BINS: [f64; 4] = [6.0, 6.5, 7.0, 7.5];

/// Materialized result of one synthetic branch
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticResult {
    pub index: usize,
    /// Total event rate
    pub rate: f64,
    /// Incremental MFD over [`MAG_BINS`]
    pub mfd: Curve,
}

/// Provider deriving a deterministic result from each branch
#[derive(Debug)]
pub struct SyntheticProvider {
    rates: Vec<f64>,
    fail_at: Option<usize>,
    delay: Option<Duration>,
    materialized: AtomicUsize,
}

impl SyntheticProvider {
    /// Branch `i` gets rate `rates[i]`
    pub fn new(rates: Vec<f64>) -> Self {
        Self {
            rates,
            fail_at: None,
            delay: None,
            materialized: AtomicUsize::new(0),
        }
    }

    /// Rates 1, 2, .., n
    pub fn linear(n: usize) -> Self {
        Self::new((1..=n).map(|i| i as f64).collect())
    }

    /// Materializing branch `index` fails
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Sleep before every materialization
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Successful materializations so far
    pub fn materialized(&self) -> usize {
        self.materialized.load(Ordering::SeqCst)
    }
}

impl BranchProvider for SyntheticProvider {
    type Output = SyntheticResult;

    fn materialize(&self, index: usize, branch: &WeightedBranch) -> Result<SyntheticResult, BoxError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_at == Some(index) {
            return Err(format!("synthetic failure for {}", branch.id()).into());
        }
        let rate = *self
            .rates
            .get(index)
            .ok_or_else(|| format!("no synthetic rate for branch {index}"))?;
        let ys = (0..MAG_BINS.len())
            .map(|bin| rate / 10f64.powi(bin as i32))
            .collect();
        let mfd = Curve::new(MAG_BINS.to_vec(), ys)?;
        self.materialized.fetch_add(1, Ordering::SeqCst);
        Ok(SyntheticResult { index, rate, mfd })
    }
}

/// Forecast derived from a [`SyntheticResult`]
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticForecast {
    pub rate: f64,
    pub options: ForecastOptions,
}

impl SyntheticForecast {
    /// Poisson probability of at least one event over the configured duration
    pub fn probability(&self) -> f64 {
        1.0 - (-self.rate * self.options.duration_years).exp()
    }
}

/// Builder counting how often it builds and reconfigures
#[derive(Debug, Default)]
pub struct CountingForecastBuilder {
    builds: AtomicUsize,
    configures: AtomicUsize,
}

impl CountingForecastBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn configures(&self) -> usize {
        self.configures.load(Ordering::SeqCst)
    }
}

impl ForecastBuilder<SyntheticResult> for CountingForecastBuilder {
    type Forecast = SyntheticForecast;

    fn build(&self, result: &SyntheticResult, options: &ForecastOptions) -> Result<SyntheticForecast, BoxError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(SyntheticForecast {
            rate: result.rate,
            options: *options,
        })
    }

    fn configure(&self, forecast: &mut SyntheticForecast, options: &ForecastOptions) -> Result<(), BoxError> {
        self.configures.fetch_add(1, Ordering::SeqCst);
        forecast.options = *options;
        Ok(())
    }
}

pub type SyntheticAccumulator = Box<dyn Accumulator<SyntheticResult, SyntheticForecast>>;

/// Branches `b0..b{n-1}`, all weight 1
pub fn uniform_branches(n: usize) -> BranchSet {
    weighted_branches(&vec![1.0; n])
}

/// Branches `b0..` with the given weights
pub fn weighted_branches(weights: &[f64]) -> BranchSet {
    BranchSet::new(
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| WeightedBranch::new(format!("b{i}"), *w).unwrap())
            .collect(),
    )
    .unwrap()
}

/// Four branches weighted 0.1, 0.2, 0.3, 0.4 with rates 1, 2, 3, 4
pub fn four_branch_fixture() -> (BranchSet, SyntheticProvider) {
    (
        weighted_branches(&[0.1, 0.2, 0.3, 0.4]),
        SyntheticProvider::linear(4),
    )
}

/// Engine at the median only
pub fn median_engine() -> FractileEngine {
    FractileEngine::new(vec![0.5]).unwrap()
}

/// Scalar "rate" per branch
pub fn rate_ensemble(name: &str) -> SyntheticAccumulator {
    Box::new(ScalarEnsemble::<SyntheticResult, SyntheticForecast>::new(name, FractileEngine::default(), |input| {
        Ok(BTreeMap::from([
            ("rate".to_string(), input.result.rate),
            ("log_rate".to_string(), input.result.rate.ln()),
        ]))
    }))
}

/// MFD curve per branch, grouped by even/odd index
pub fn mfd_ensemble(name: &str) -> SyntheticAccumulator {
    Box::new(CurveEnsemble::<SyntheticResult, SyntheticForecast>::new(name, FractileEngine::default(), |input| {
        let parity = if input.index % 2 == 0 { "even" } else { "odd" };
        Ok(BTreeMap::from([
            ("All".to_string(), input.result.mfd.clone()),
            (parity.to_string(), input.result.mfd.clone()),
        ]))
    }))
}

/// Forecast probability per branch
pub fn probability_ensemble(name: &str, options: ForecastOptions) -> SyntheticAccumulator {
    Box::new(
        CurveEnsemble::<SyntheticResult, SyntheticForecast>::new(name, FractileEngine::default(), |input| {
            let forecast = input.forecast.ok_or("forecast missing")?;
            Ok(BTreeMap::from([(
                forecast.options.probability_model.to_string(),
                Curve::scalar(forecast.probability())?,
            )]))
        })
        .with_forecast(options),
    )
}

/// Distance from a pooled reference rate
pub fn misfit_ensemble(name: &str, reference_rate: f64) -> SyntheticAccumulator {
    let pool = ResourcePool::new(format!("{name} references"), move || Ok(reference_rate));
    Box::new(ComparisonEnsemble::<SyntheticResult, SyntheticForecast, f64>::new(
        name,
        FractileEngine::default(),
        pool,
        |input, reference: &mut f64| Ok((input.result.rate - *reference).abs()),
    ))
}

/// The standard accumulator mix used by end-to-end tests
pub fn standard_accumulators() -> Vec<SyntheticAccumulator> {
    vec![
        rate_ensemble("Rates"),
        mfd_ensemble("MFDs"),
        probability_ensemble("Probabilities", ForecastOptions::default()),
        misfit_ensemble("Misfits", 2.5),
    ]
}

/// Finalized outputs in registration order
pub fn outputs(accumulators: &[SyntheticAccumulator]) -> Vec<AccumulatorOutput> {
    accumulators.iter().map(|a| a.output().unwrap()).collect()
}
