//! Derived-forecast collaborators
//!
//! Some accumulators need a forecast derived from the materialized branch
//! result. The dispatcher builds it at most once per task and reconfigures it
//! with each accumulator's [`ForecastOptions`] right before that accumulator
//! consumes the branch.

use lte_cache::BoxError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Rupture probability model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityModel {
    /// Time-independent
    #[default]
    Poisson,
    /// Brownian passage time renewal
    Bpt,
    /// Preferred weighted blend of renewal models
    PreferredBlend,
}

impl Display for ProbabilityModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Poisson => "poisson",
            Self::Bpt => "bpt",
            Self::PreferredBlend => "preferred_blend",
        })
    }
}

/// Named toggles applied to a forecast before an accumulator uses it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastOptions {
    /// Probability model
    pub probability_model: ProbabilityModel,
    /// Forecast duration in years
    pub duration_years: f64,
    /// Open interval since the historic catalog start (time-dependent models only)
    pub historic_open_interval_years: Option<f64>,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            probability_model: ProbabilityModel::Poisson,
            duration_years: 30.0,
            historic_open_interval_years: None,
        }
    }
}

impl ForecastOptions {
    /// With probability model
    #[inline]
    #[must_use]
    pub fn with_probability_model(mut self, model: ProbabilityModel) -> Self {
        self.probability_model = model;
        self
    }

    /// With duration
    #[inline]
    #[must_use]
    pub fn with_duration_years(mut self, years: f64) -> Self {
        self.duration_years = years;
        self
    }

    /// With historic open interval
    #[inline]
    #[must_use]
    pub fn with_historic_open_interval(mut self, years: f64) -> Self {
        self.historic_open_interval_years = Some(years);
        self
    }

    /// True for every model except Poisson
    #[inline]
    #[must_use]
    pub fn is_time_dependent(&self) -> bool {
        self.probability_model != ProbabilityModel::Poisson
    }
}

/// Builds and reconfigures the forecast derived from a materialized result
pub trait ForecastBuilder<R>: Send + Sync {
    /// Forecast type handed to accumulators
    type Forecast: Send;

    /// Build a forecast for `result` configured with `options`
    ///
    /// # Errors
    /// Any builder failure; fatal to the run
    fn build(&self, result: &R, options: &ForecastOptions) -> Result<Self::Forecast, BoxError>;

    /// Apply `options` to an existing forecast
    ///
    /// # Errors
    /// Any builder failure; fatal to the run
    fn configure(&self, forecast: &mut Self::Forecast, options: &ForecastOptions)
        -> Result<(), BoxError>;
}

impl<R, B: ForecastBuilder<R> + ?Sized> ForecastBuilder<R> for &B {
    type Forecast = B::Forecast;

    fn build(&self, result: &R, options: &ForecastOptions) -> Result<Self::Forecast, BoxError> {
        (**self).build(result, options)
    }

    fn configure(&self, forecast: &mut Self::Forecast, options: &ForecastOptions) -> Result<(), BoxError> {
        (**self).configure(forecast, options)
    }
}

/// Builder for runs where no accumulator needs a forecast
#[derive(Debug, Clone, Copy, Default)]
pub struct NoForecast;

impl<R> ForecastBuilder<R> for NoForecast {
    type Forecast = ();

    fn build(&self, _result: &R, _options: &ForecastOptions) -> Result<(), BoxError> {
        Ok(())
    }

    fn configure(&self, _forecast: &mut (), _options: &ForecastOptions) -> Result<(), BoxError> {
        Ok(())
    }
}
