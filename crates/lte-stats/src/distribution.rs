//! Weighted empirical distribution of a single quantity

use crate::error::FractileError;

/// Slack when comparing cumulative weight against a target fraction
const CUMULATIVE_TOLERANCE: f64 = 1e-12;

/// Samples with relative weights, sorted by value
///
/// Sorting is stable, so equal values keep their insertion order and the
/// fractile lookup is deterministic.
#[derive(Debug, Clone)]
pub struct WeightedDistribution {
    /// `(value, weight)` ordered by value
    samples: Vec<(f64, f64)>,
    total_weight: f64,
}

impl WeightedDistribution {
    /// Build distribution from `(value, weight)` pairs
    ///
    /// # Errors
    /// - `FractileError::Empty` for no samples
    /// - `FractileError::InvalidWeight` for negative or non-finite weights
    /// - `FractileError::ZeroTotalWeight` if every weight is zero
    /// - `FractileError::NonFiniteTotalWeight` if the weights sum to infinity
    pub fn new(samples: impl IntoIterator<Item = (f64, f64)>) -> Result<Self, FractileError> {
        let mut samples: Vec<(f64, f64)> = samples.into_iter().collect();
        if samples.is_empty() {
            return Err(FractileError::Empty);
        }

        let mut total_weight = 0.0;
        for (index, &(_, weight)) in samples.iter().enumerate() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(FractileError::InvalidWeight { index, weight });
            }
            total_weight += weight;
        }
        if total_weight <= 0.0 {
            return Err(FractileError::ZeroTotalWeight);
        }
        if !total_weight.is_finite() {
            return Err(FractileError::NonFiniteTotalWeight(total_weight));
        }

        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self {
            samples,
            total_weight,
        })
    }

    /// Number of samples
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a constructed distribution
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sum of weights (always > 0)
    #[inline]
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Smallest value, ignoring weight
    #[inline]
    #[must_use]
    pub fn min(&self) -> f64 {
        self.samples[0].0
    }

    /// Largest value, ignoring weight
    #[inline]
    #[must_use]
    pub fn max(&self) -> f64 {
        self.samples[self.samples.len() - 1].0
    }

    /// Weight-normalized mean
    #[must_use]
    pub fn mean(&self) -> f64 {
        let weighted: f64 = self.samples.iter().map(|(v, w)| v * w).sum();
        weighted / self.total_weight
    }

    /// Value at cumulative weight fraction `fraction`
    ///
    /// Walks the sorted samples accumulating normalized weight and returns the
    /// first value whose cumulative fraction reaches `fraction`. Fractions 0
    /// and 1 return [`min`](Self::min) and [`max`](Self::max).
    ///
    /// # Errors
    /// `FractileError::InvalidFraction` outside `[0, 1]`
    pub fn fractile(&self, fraction: f64) -> Result<f64, FractileError> {
        if !(0.0..=1.0).contains(&fraction) {
            return Err(FractileError::InvalidFraction(fraction));
        }
        if fraction == 0.0 {
            return Ok(self.min());
        }
        if fraction == 1.0 {
            return Ok(self.max());
        }

        let mut cumulative = 0.0;
        for &(value, weight) in &self.samples {
            cumulative += weight / self.total_weight;
            if cumulative + CUMULATIVE_TOLERANCE >= fraction {
                return Ok(value);
            }
        }
        Ok(self.max())
    }
}
